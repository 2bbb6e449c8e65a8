// crates/cg_fibers/src/frame.rs

//! 逐自由度正交归一三元组构建
//!
//! `n0 = normalize(f0 × s0)` 补全右手正交三元组。难点在分布式一致性：
//! 标量空间（t 与 angle(t) 所在）与向量空间（三元组所在，x/y/z 逐点
//! 交错）的局部编号互不对齐，且各分区同时持有 owned 与 ghost 自由度。
//! 构建步骤：
//!
//! (a) 只在本分区 owned 的标量自由度上求值，避免重复/冲突计算；
//! (b) 经全局编号把每个 owned 标量自由度映射到向量空间局部编号的
//!     三个交错分量槽位；
//! (c) 写入分布式存储后执行阻塞 "insert" 集合同步，使共享自由度的
//!     各副本收敛到 owner 的权威值。
//!
//! 标量/向量空间元素族或几何维度不兼容时报
//! [`CgError::DimensionMismatch`]，在任何分布式工作开始前检查。

use crate::angle::{raw_directions, AngleParams};
use crate::basis::FiberBasis;
use cg_foundation::{CgError, CgResult};
use cg_solver::space::FunctionSpace;
use cg_solver::vector::DistributedVector;
use cg_solver::world::Communicator;
use glam::DVec3;
use rayon::prelude::*;

/// 三元组：fiber / sheet / sheet-normal
#[derive(Debug, Clone)]
pub struct Triad {
    /// 纤维方向场
    pub f0: DistributedVector,
    /// 薄片方向场
    pub s0: DistributedVector,
    /// 薄片法向场
    pub n0: DistributedVector,
}

/// 局部标架构建器
#[derive(Debug)]
pub struct LocalFrameBuilder<'a> {
    scalar: &'a FunctionSpace,
    vector: &'a FunctionSpace,
}

impl<'a> LocalFrameBuilder<'a> {
    /// 创建构建器；空间配对在此检查（分布式工作开始前）
    pub fn new(scalar: &'a FunctionSpace, vector: &'a FunctionSpace) -> CgResult<Self> {
        FunctionSpace::check_compatible(scalar, vector)?;
        Ok(Self { scalar, vector })
    }

    /// 构建并同步三元组
    ///
    /// `t_local` 按标量空间局部点序给出跨壁值。
    pub fn build<C: Communicator>(
        &self,
        t_local: &[f64],
        angles: &AngleParams,
        basis: &FiberBasis,
        comm: &C,
    ) -> CgResult<Triad> {
        let s_layout = self.scalar.layout();
        CgError::check_size("transmural values", s_layout.n_points(), t_local.len())?;

        // (a) 限制到 owned 标量自由度；逐自由度纯局部，数据并行
        let owned: Vec<usize> = s_layout.owned_points().collect();
        let computed: Vec<(u64, DVec3, DVec3, DVec3)> = owned
            .par_iter()
            .map(|&ls| {
                let g = s_layout.global_of(ls);
                let t = t_local[ls];
                let alpha = angles.angle_rad(t);
                let (e_c, e_l, e_r) = basis.local_frame(g, self.scalar.points()[ls], t);
                let (f0, s0) = raw_directions(alpha, e_c, e_l, e_r);
                let n0 = f0.cross(s0).normalize();
                (g, f0, s0, n0)
            })
            .collect();

        // (b)+(c) 经全局编号散布到向量空间的交错槽位
        let mut f = DistributedVector::zeros(self.vector);
        let mut s = DistributedVector::zeros(self.vector);
        let mut n = DistributedVector::zeros(self.vector);
        let v_layout = self.vector.layout();

        for (g, f0, s0, n0) in computed {
            let Some(lv) = v_layout.local_of_global(g) else {
                return Err(comm.bail(format!(
                    "scalar dof {} has no counterpart in the vector space",
                    g
                )));
            };
            f.set_point(lv, &f0.to_array());
            s.set_point(lv, &s0.to_array());
            n.set_point(lv, &n0.to_array());
        }

        // 阻塞 insert 同步：owner 权威值推送到所有副本
        f.sync_insert(v_layout, comm)?;
        s.sync_insert(v_layout, comm)?;
        n.sync_insert(v_layout, comm)?;

        Ok(Triad { f0: f, s0: s, n0: n })
    }
}

// ============================================================================
// 测试
// ============================================================================
