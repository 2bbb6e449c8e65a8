// crates/cg_fibers/src/transmural.rs

//! 跨壁标量场
//!
//! 把面片标记转成 Dirichlet 边界条件，委托椭圆求解后端得到逐自由度
//! 的 t，0 ≤ t ≤ 1 由最大值原理保证（不截断）。按需把 P1 解插值到
//! 更高次的元素空间。
//!
//! 求解是全体分区共同参与的阻塞集合操作；这里的内置后端以冗余方式
//! 在每个分区上对同一全局问题求解，确定性算法保证各分区结果一致，
//! 分布式后端可以作为 [`EllipticSolver`] 的另一实现接入。

use cg_foundation::{CgError, CgResult};
use cg_mesh::markers::MarkerFunction;
use cg_mesh::mesh::DomainMesh;
use cg_solver::laplace::{interpolate_p1_to_p2, LaplaceProblem};
use cg_solver::space::{FiberSpace, FunctionSpace};
use cg_solver::EllipticSolver;
use tracing::info;

/// 跨壁标量场（全局自由度序：节点在前，P2 时边中点在后）
#[derive(Debug, Clone)]
pub struct TransmuralField {
    element: FiberSpace,
    values: Vec<f64>,
}

impl TransmuralField {
    /// 求解跨壁场
    ///
    /// `endo_tags` 面片上 t=0，`epi_tags` 上 t=1，其余零通量。
    pub fn solve(
        mesh: &DomainMesh,
        ffun: &MarkerFunction,
        endo_tags: &[u32],
        epi_tags: &[u32],
        element: FiberSpace,
        solver: &dyn EllipticSolver,
    ) -> CgResult<Self> {
        let problem = LaplaceProblem::new(mesh, ffun)?;
        let t_nodes = problem.solve(endo_tags, epi_tags, solver)?;

        let values = match element {
            FiberSpace::P1 => t_nodes,
            FiberSpace::P2 => interpolate_p1_to_p2(mesh, &t_nodes)?,
        };

        info!(
            element = %element,
            n_dofs = values.len(),
            "transmural field computed"
        );
        Ok(Self { element, values })
    }

    /// 从已有逐自由度值构建（测试与重载路径）
    pub fn from_values(element: FiberSpace, values: Vec<f64>) -> Self {
        Self { element, values }
    }

    /// 元素族
    #[inline]
    pub fn element(&self) -> FiberSpace {
        self.element
    }

    /// 全局自由度数量
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 全部值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 按全局自由度编号取值
    #[inline]
    pub fn global(&self, g: u64) -> f64 {
        self.values[g as usize]
    }

    /// 限制到分区标量空间（按其局部点序）
    pub fn restrict(&self, space: &FunctionSpace) -> CgResult<Vec<f64>> {
        if space.element() != self.element {
            return Err(CgError::dimension_mismatch(format!(
                "transmural field is {}, scalar space is {}",
                self.element,
                space.element()
            )));
        }
        let layout = space.layout();
        let mut out = Vec::with_capacity(layout.n_points());
        for l in 0..layout.n_points() {
            let g = layout.global_of(l) as usize;
            if g >= self.values.len() {
                return Err(CgError::index_out_of_bounds(
                    "transmural dof",
                    g,
                    self.values.len(),
                ));
            }
            out.push(self.values[g]);
        }
        Ok(out)
    }
}

// ============================================================================
// 测试
// ============================================================================
