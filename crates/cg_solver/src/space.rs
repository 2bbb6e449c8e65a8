// crates/cg_solver/src/space.rs

//! 函数空间与自由度布局
//!
//! [`FiberSpace`] 是支持的元素族的闭合枚举，在配置边界解析一次，
//! 之后不再做运行时字符串分派。[`FunctionSpace`] 把元素族、
//! 块大小（标量 1 / 向量 3）和 [`DofLayout`] 绑在一起。
//!
//! # 自由度布局
//!
//! 每个分区持有 owned 和 ghost 两类点自由度。标量空间按局部网格
//! 实体顺序编号（P1: 节点；P2: 节点后接边中点）；向量空间对同一
//! 点集采用独立编号（owned 点按全局序在前，ghost 点按全局序在后），
//! 每点 3 个 x/y/z 交错分量。两个空间的局部编号因此互不对齐，
//! 标量→向量的散布必须经过显式的全局↔局部查询，而不是同序假设。

use crate::partition::MeshPartition;
use cg_foundation::{CgError, CgResult};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// 元素族
// ============================================================================

/// 支持的元素族（闭合集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FiberSpace {
    /// 一次拉格朗日（节点自由度）
    #[default]
    P1,
    /// 二次拉格朗日（节点 + 边中点自由度）
    P2,
}

impl FiberSpace {
    /// 多项式次数
    pub fn degree(&self) -> u32 {
        match self {
            Self::P1 => 1,
            Self::P2 => 2,
        }
    }
}

impl FromStr for FiberSpace {
    type Err = CgError;

    /// 接受 `P_1` 与 `P1` 两种拼写
    fn from_str(s: &str) -> CgResult<Self> {
        match s {
            "P_1" | "P1" => Ok(Self::P1),
            "P_2" | "P2" => Ok(Self::P2),
            other => Err(CgError::invalid_config(
                "fiber_space",
                other,
                "supported spaces are P_1 and P_2",
            )),
        }
    }
}

impl fmt::Display for FiberSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P1 => write!(f, "P_1"),
            Self::P2 => write!(f, "P_2"),
        }
    }
}

// ============================================================================
// 自由度布局
// ============================================================================

/// 分区局部的点自由度布局
///
/// 显式记录每个局部点自由度的全局编号、拥有者和共享标志，
/// 并提供全局→局部反查。不依赖任何全局可变状态。
#[derive(Debug, Clone)]
pub struct DofLayout {
    my_rank: usize,
    local_to_global: Vec<u64>,
    owner: Vec<usize>,
    shared: Vec<bool>,
    global_to_local: HashMap<u64, u32>,
}

impl DofLayout {
    /// 构建布局
    pub fn new(
        my_rank: usize,
        local_to_global: Vec<u64>,
        owner: Vec<usize>,
        shared: Vec<bool>,
    ) -> Self {
        let global_to_local = local_to_global
            .iter()
            .enumerate()
            .map(|(l, &g)| (g, l as u32))
            .collect();
        Self {
            my_rank,
            local_to_global,
            owner,
            shared,
            global_to_local,
        }
    }

    /// 本分区 rank
    #[inline]
    pub fn rank(&self) -> usize {
        self.my_rank
    }

    /// 局部点自由度数量（owned + ghost）
    #[inline]
    pub fn n_points(&self) -> usize {
        self.local_to_global.len()
    }

    /// owned 点数量
    pub fn n_owned(&self) -> usize {
        self.owner.iter().filter(|&&o| o == self.my_rank).count()
    }

    /// 点是否归本分区所有
    #[inline]
    pub fn is_owned(&self, local: usize) -> bool {
        self.owner[local] == self.my_rank
    }

    /// 点是否被多个分区共享
    #[inline]
    pub fn is_shared(&self, local: usize) -> bool {
        self.shared[local]
    }

    /// 局部 → 全局
    #[inline]
    pub fn global_of(&self, local: usize) -> u64 {
        self.local_to_global[local]
    }

    /// 全局 → 局部
    #[inline]
    pub fn local_of_global(&self, global: u64) -> Option<usize> {
        self.global_to_local.get(&global).map(|&l| l as usize)
    }

    /// owned 点的局部索引迭代器
    pub fn owned_points(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_points()).filter(move |&l| self.is_owned(l))
    }

    /// ghost 点的全局编号列表
    pub fn ghost_globals(&self) -> Vec<u64> {
        (0..self.n_points())
            .filter(|&l| !self.is_owned(l))
            .map(|l| self.global_of(l))
            .collect()
    }
}

// ============================================================================
// 函数空间
// ============================================================================

/// 函数空间：元素族 + 块大小 + 自由度布局 + 点坐标
#[derive(Debug, Clone)]
pub struct FunctionSpace {
    element: FiberSpace,
    block_size: usize,
    gdim: usize,
    layout: DofLayout,
    points: Vec<DVec3>,
}

impl FunctionSpace {
    /// 标量空间：局部实体顺序编号
    pub fn scalar(partition: &MeshPartition, element: FiberSpace) -> Self {
        let (globals, owners, shareds, points) = Self::point_dofs_entity_order(partition, element);
        Self {
            element,
            block_size: 1,
            gdim: 3,
            layout: DofLayout::new(partition.rank, globals, owners, shareds),
            points,
        }
    }

    /// 向量空间：同一点集，独立编号（owned 按全局序在前，ghost 在后），
    /// 每点 3 个交错分量
    pub fn vector(partition: &MeshPartition, element: FiberSpace) -> Self {
        let (globals, owners, shareds, points) = Self::point_dofs_entity_order(partition, element);

        let mut order: Vec<usize> = (0..globals.len()).collect();
        let rank = partition.rank;
        order.sort_by_key(|&i| (owners[i] != rank, globals[i]));

        let globals_v: Vec<u64> = order.iter().map(|&i| globals[i]).collect();
        let owners_v: Vec<usize> = order.iter().map(|&i| owners[i]).collect();
        let shareds_v: Vec<bool> = order.iter().map(|&i| shareds[i]).collect();
        let points_v: Vec<DVec3> = order.iter().map(|&i| points[i]).collect();

        Self {
            element,
            block_size: 3,
            gdim: 3,
            layout: DofLayout::new(rank, globals_v, owners_v, shareds_v),
            points: points_v,
        }
    }

    /// 按局部实体顺序列出点自由度
    ///
    /// P1: 节点；P2: 节点后接边中点。边自由度的全局编号偏移
    /// `n_global_nodes`，与节点编号不冲突。
    fn point_dofs_entity_order(
        partition: &MeshPartition,
        element: FiberSpace,
    ) -> (Vec<u64>, Vec<usize>, Vec<bool>, Vec<DVec3>) {
        let mesh = &partition.mesh;
        let mut globals: Vec<u64> = partition.node_global.clone();
        let mut owners: Vec<usize> = partition.node_owner.clone();
        let mut shareds: Vec<bool> = partition.node_shared.clone();
        let mut points: Vec<DVec3> = mesh.node_coords().to_vec();

        if element == FiberSpace::P2 {
            for (e, _) in mesh.edges().iter().enumerate() {
                globals.push(partition.n_global_nodes + partition.edge_global[e]);
                owners.push(partition.edge_owner[e]);
                shareds.push(partition.edge_shared[e]);
                points.push(mesh.edge_midpoint(e));
            }
        }
        (globals, owners, shareds, points)
    }

    /// 元素族
    #[inline]
    pub fn element(&self) -> FiberSpace {
        self.element
    }

    /// 块大小（标量 1，向量 3）
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 几何维度
    #[inline]
    pub fn gdim(&self) -> usize {
        self.gdim
    }

    /// 自由度布局
    #[inline]
    pub fn layout(&self) -> &DofLayout {
        &self.layout
    }

    /// 点自由度坐标
    #[inline]
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// 标量/向量空间配对检查
    ///
    /// 元素族、次数和几何维度必须一致，否则标量→向量散布无意义。
    pub fn check_compatible(scalar: &Self, vector: &Self) -> CgResult<()> {
        if scalar.element != vector.element {
            return Err(CgError::dimension_mismatch(format!(
                "scalar space is {}, vector space is {}",
                scalar.element, vector.element
            )));
        }
        if scalar.gdim != vector.gdim {
            return Err(CgError::dimension_mismatch(format!(
                "geometric dimensions differ: {} vs {}",
                scalar.gdim, vector.gdim
            )));
        }
        if scalar.block_size != 1 || vector.block_size != 3 {
            return Err(CgError::dimension_mismatch(format!(
                "expected scalar (block 1) and vector (block 3) spaces, got {} and {}",
                scalar.block_size, vector.block_size
            )));
        }
        if scalar.layout.n_points() != vector.layout.n_points() {
            return Err(CgError::dimension_mismatch(format!(
                "point dof counts differ: {} vs {}",
                scalar.layout.n_points(),
                vector.layout.n_points()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cg_mesh::mesh::DomainMesh;
    use crate::partition::partition_by_cells;

    fn two_tet_mesh() -> DomainMesh {
        let nodes = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(1.0, 1.0, 1.0),
        ];
        DomainMesh::from_tets(nodes, vec![[0, 1, 2, 3], [1, 2, 3, 4]]).unwrap()
    }

    #[test]
    fn test_fiber_space_parse() {
        assert_eq!("P_1".parse::<FiberSpace>().unwrap(), FiberSpace::P1);
        assert_eq!("P2".parse::<FiberSpace>().unwrap(), FiberSpace::P2);
        assert!("Q_2".parse::<FiberSpace>().is_err());
        assert_eq!(FiberSpace::P1.to_string(), "P_1");
    }

    #[test]
    fn test_scalar_space_p1_counts() {
        let mesh = two_tet_mesh();
        let p = MeshPartition::serial(&mesh);
        let space = FunctionSpace::scalar(&p, FiberSpace::P1);
        assert_eq!(space.layout().n_points(), 5);
        assert_eq!(space.layout().n_owned(), 5);
        assert_eq!(space.block_size(), 1);
    }

    #[test]
    fn test_scalar_space_p2_includes_edges() {
        let mesh = two_tet_mesh();
        let p = MeshPartition::serial(&mesh);
        let space = FunctionSpace::scalar(&p, FiberSpace::P2);
        assert_eq!(space.layout().n_points(), 5 + mesh.n_edges());

        // 边自由度坐标是边中点
        let e0 = mesh.edges()[0];
        let mid = (mesh.node(e0[0] as usize) + mesh.node(e0[1] as usize)) * 0.5;
        assert!((space.points()[5] - mid).length() < 1e-14);
    }

    #[test]
    fn test_vector_space_numbering_not_aligned_with_scalar() {
        let mesh = two_tet_mesh();
        let parts = partition_by_cells(&mesh, 2).unwrap();

        // rank 1 的标量空间按实体序（幽灵节点先出现），
        // 向量空间把 owned 排在前面，两者编号必然不同
        let scalar = FunctionSpace::scalar(&parts[1], FiberSpace::P1);
        let vector = FunctionSpace::vector(&parts[1], FiberSpace::P1);

        let aligned = (0..scalar.layout().n_points())
            .all(|l| scalar.layout().global_of(l) == vector.layout().global_of(l));
        assert!(!aligned, "vector numbering should differ from scalar");

        // 但同一全局点都能互查
        for l in 0..scalar.layout().n_points() {
            let g = scalar.layout().global_of(l);
            assert!(vector.layout().local_of_global(g).is_some());
        }
    }

    #[test]
    fn test_vector_space_owned_first() {
        let mesh = two_tet_mesh();
        let parts = partition_by_cells(&mesh, 2).unwrap();
        let vector = FunctionSpace::vector(&parts[1], FiberSpace::P1);

        let layout = vector.layout();
        let n_owned = layout.n_owned();
        for l in 0..layout.n_points() {
            assert_eq!(layout.is_owned(l), l < n_owned);
        }
    }

    #[test]
    fn test_compatible_spaces() {
        let mesh = two_tet_mesh();
        let p = MeshPartition::serial(&mesh);
        let scalar = FunctionSpace::scalar(&p, FiberSpace::P1);
        let vector = FunctionSpace::vector(&p, FiberSpace::P1);
        assert!(FunctionSpace::check_compatible(&scalar, &vector).is_ok());
    }

    #[test]
    fn test_incompatible_degree_rejected() {
        let mesh = two_tet_mesh();
        let p = MeshPartition::serial(&mesh);
        let scalar = FunctionSpace::scalar(&p, FiberSpace::P1);
        let vector = FunctionSpace::vector(&p, FiberSpace::P2);
        let err = FunctionSpace::check_compatible(&scalar, &vector).unwrap_err();
        assert!(matches!(err, CgError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_ghost_globals() {
        let mesh = two_tet_mesh();
        let parts = partition_by_cells(&mesh, 2).unwrap();
        let scalar = FunctionSpace::scalar(&parts[1], FiberSpace::P1);
        let ghosts = scalar.layout().ghost_globals();
        assert_eq!(ghosts.len(), 3);
        for g in ghosts {
            assert!([1u64, 2, 3].contains(&g));
        }
    }
}
