// crates/cg_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `CgError` 枚举和 `CgResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分类
//!
//! - [`CgError::Backend`]: 可选后端（网格生成器 / 椭圆求解器）不可用。
//!   非致命，几何构建调用返回缺席结果而不是报错。
//! - [`CgError::Conversion`]: 网格块缺失或损坏，当次转换致命。
//! - [`CgError::Solver`]: 边界条件不适定或迭代不收敛，整个分布式
//!   运行致命，不重试。
//! - [`CgError::DimensionMismatch`]: 标量/向量函数空间不兼容，
//!   属于前置条件违反，在分布式工作开始前检查。
//!
//! # 示例
//!
//! ```
//! use cg_foundation::error::{CgError, CgResult};
//!
//! fn load_mesh() -> CgResult<()> {
//!     Err(CgError::conversion("volumetric block is empty"))
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type CgResult<T> = Result<T, CgError>;

/// CardioGeom 错误类型
///
/// 核心错误类型，用于整个项目。各层的局部错误在各自 crate 中定义并
/// 转换到本类型。
#[derive(Error, Debug)]
pub enum CgError {
    // ========================================================================
    // 领域错误
    // ========================================================================
    /// 可选后端不可用（能力缺口，非致命）
    #[error("后端不可用: {backend}, {reason}")]
    Backend {
        /// 后端名称
        backend: &'static str,
        /// 缺失原因说明
        reason: String,
    },

    /// 网格转换失败
    #[error("网格转换失败: {message}")]
    Conversion {
        /// 具体错误信息
        message: String,
    },

    /// 椭圆求解失败（不适定边界条件或不收敛）
    #[error("求解失败: {message}")]
    Solver {
        /// 具体错误信息
        message: String,
    },

    /// 函数空间不兼容
    #[error("函数空间不匹配: {message}")]
    DimensionMismatch {
        /// 不匹配的具体说明
        message: String,
    },

    /// 集合通信失败（某个分区出错后传播到所有分区）
    #[error("集合通信失败: rank {rank}: {message}")]
    Collective {
        /// 首先出错的分区号
        rank: usize,
        /// 错误信息
        message: String,
    },

    // ========================================================================
    // 通用错误
    // ========================================================================
    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        /// 可选的底层 IO 错误
        #[source]
        source: Option<std::io::Error>,
    },

    /// 文件不存在
    #[error("文件不存在: {path}")]
    FileNotFound {
        /// 未找到的路径
        path: PathBuf,
    },

    /// 文件解析错误
    #[error("文件解析错误: {file} 第{line}行: {message}")]
    Parse {
        /// 文件路径
        file: PathBuf,
        /// 行号
        line: usize,
        /// 错误信息
        message: String,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl CgError {
    /// 后端不可用
    pub fn backend(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            reason: reason.into(),
        }
    }

    /// 网格转换失败
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// 求解失败
    pub fn solver(message: impl Into<String>) -> Self {
        Self::Solver {
            message: message.into(),
        }
    }

    /// 函数空间不匹配
    pub fn dimension_mismatch(message: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            message: message.into(),
        }
    }

    /// 集合通信失败
    pub fn collective(rank: usize, message: impl Into<String>) -> Self {
        Self::Collective {
            rank,
            message: message.into(),
        }
    }

    /// 从IO错误创建
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 从IO错误创建（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 文件不存在
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 解析错误
    pub fn parse(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 是否为能力缺口（后端缺失）而非计算失败
    pub fn is_capability_gap(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl CgError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> CgResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> CgResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for CgError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

// ========================================================================
// 测试
// ========================================================================
