// crates/cg_foundation/src/tolerance.rs

//! 数值容差常量
//!
//! 集中定义整个项目使用的容差，避免在各处散落魔法数字。

/// 正交归一容差
///
/// 纤维三元组的单位长度与两两正交性按此容差验证。
pub const ORTHONORMAL_TOL: f64 = 1e-9;

/// 序列化往返容差
///
/// 持久化后重新加载的浮点场与原值的最大允许偏差。
/// 当前格式按 little-endian f64 原样存储，往返是精确的，
/// 该容差为格式演化预留。
pub const SERIALIZATION_TOL: f64 = 1e-12;

/// 几何退化容差
///
/// 四面体体积小于该值视为退化单元。
pub const DEGENERATE_VOLUME_TOL: f64 = 1e-14;

/// 归一化下限
///
/// 向量范数低于该值时不做归一化（避免除零）。
pub const NORMALIZE_EPS: f64 = 1e-30;
