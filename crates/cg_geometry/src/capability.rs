// crates/cg_geometry/src/capability.rs

//! 能力标志与后端注入
//!
//! 可选后端在启动时解析一次，作为能力标志注入工厂；业务逻辑内部
//! 不做任何 ad-hoc 探测。缺失后端是能力缺口（[`CgError::Backend`]，
//! 非致命），与计算失败严格区分。

use cg_foundation::{CgError, CgResult};
use cg_mesh::generation::{MeshGenerator, StructuredMeshGenerator};
use cg_solver::{ConjugateGradient, EllipticSolver};
use std::sync::Arc;

/// 已解析的后端集合
#[derive(Clone)]
pub struct Backends {
    mesher: Option<Arc<dyn MeshGenerator>>,
    solver: Option<Arc<dyn EllipticSolver>>,
}

impl Backends {
    /// 解析内置后端（结构化生成器 + CG 求解器）
    pub fn detect() -> Self {
        Self {
            mesher: Some(Arc::new(StructuredMeshGenerator)),
            solver: Some(Arc::new(ConjugateGradient::default())),
        }
    }

    /// 空后端集合（测试能力缺口路径）
    pub fn none() -> Self {
        Self {
            mesher: None,
            solver: None,
        }
    }

    /// 替换网格生成后端
    pub fn with_mesher(mut self, mesher: Arc<dyn MeshGenerator>) -> Self {
        self.mesher = Some(mesher);
        self
    }

    /// 替换椭圆求解后端
    pub fn with_solver(mut self, solver: Arc<dyn EllipticSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    /// 移除网格生成后端
    pub fn without_mesher(mut self) -> Self {
        self.mesher = None;
        self
    }

    /// 移除椭圆求解后端
    pub fn without_solver(mut self) -> Self {
        self.solver = None;
        self
    }

    /// 是否有网格生成后端
    pub fn has_mesher(&self) -> bool {
        self.mesher.is_some()
    }

    /// 是否有椭圆求解后端
    pub fn has_solver(&self) -> bool {
        self.solver.is_some()
    }

    /// 网格生成后端（缺失 ⇒ 能力缺口错误）
    pub fn mesher(&self) -> CgResult<&dyn MeshGenerator> {
        self.mesher
            .as_deref()
            .ok_or_else(|| CgError::backend("mesher", "no mesh generator backend configured"))
    }

    /// 椭圆求解后端（缺失 ⇒ 能力缺口错误）
    pub fn solver(&self) -> CgResult<&dyn EllipticSolver> {
        self.solver
            .as_deref()
            .ok_or_else(|| CgError::backend("solver", "no elliptic solver backend configured"))
    }

    /// 前端用的前置检查：一次性报告全部能力缺口
    pub fn require_all(&self) -> CgResult<()> {
        self.mesher()?;
        self.solver()?;
        Ok(())
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self::detect()
    }
}

// ============================================================================
// 测试
// ============================================================================
