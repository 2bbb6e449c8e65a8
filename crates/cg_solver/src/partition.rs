// crates/cg_solver/src/partition.rs

//! 网格分区
//!
//! SPMD 执行模型中每个进程持有的子域：局部子网格 + 全局编号 +
//! 所有权信息。共享实体（被多个分区触及）在恰好一个分区上为
//! "owned"，在其余分区上为 "ghost" 副本。
//!
//! 分区在网格分发阶段集中构建（[`partition_by_cells`]），所有权
//! 规则是"触及该实体的最小 rank"，因此所有分区对每个共享实体的
//! 归属判断一致。串行情形（[`MeshPartition::serial`]）是 1 个
//! 分区、零幽灵的退化形式。

use cg_foundation::{CgError, CgResult};
use cg_mesh::mesh::{edge_key, DomainMesh};
use std::collections::HashMap;

/// 网格分区：局部子网格 + 全局编号 + 所有权
#[derive(Debug, Clone)]
pub struct MeshPartition {
    /// 本分区序号
    pub rank: usize,
    /// 分区总数
    pub n_ranks: usize,
    /// 局部子网格（局部节点编号）
    pub mesh: DomainMesh,
    /// 局部节点 → 全局节点编号
    pub node_global: Vec<u64>,
    /// 局部节点的拥有者 rank
    pub node_owner: Vec<usize>,
    /// 局部节点是否被多个分区共享
    pub node_shared: Vec<bool>,
    /// 局部边 → 全局边编号
    pub edge_global: Vec<u64>,
    /// 局部边的拥有者 rank
    pub edge_owner: Vec<usize>,
    /// 局部边是否被多个分区共享
    pub edge_shared: Vec<bool>,
    /// 全局节点总数
    pub n_global_nodes: u64,
    /// 全局边总数
    pub n_global_edges: u64,
}

impl MeshPartition {
    /// 串行分区：整个网格归单一 rank，无幽灵实体
    pub fn serial(mesh: &DomainMesh) -> Self {
        let n_nodes = mesh.n_nodes();
        let n_edges = mesh.n_edges();
        Self {
            rank: 0,
            n_ranks: 1,
            mesh: mesh.clone(),
            node_global: (0..n_nodes as u64).collect(),
            node_owner: vec![0; n_nodes],
            node_shared: vec![false; n_nodes],
            edge_global: (0..n_edges as u64).collect(),
            edge_owner: vec![0; n_edges],
            edge_shared: vec![false; n_edges],
            n_global_nodes: n_nodes as u64,
            n_global_edges: n_edges as u64,
        }
    }

    /// 本分区的局部节点中 ghost 的数量
    pub fn n_ghost_nodes(&self) -> usize {
        self.node_owner.iter().filter(|&&o| o != self.rank).count()
    }
}

/// 按单元区间把网格切成 `n_ranks` 个分区
///
/// 单元按序号块状划分；节点/边的拥有者是触及它的最小 rank。
/// 返回的分区向量覆盖整个网格，共享实体在所有相关分区中都出现。
pub fn partition_by_cells(mesh: &DomainMesh, n_ranks: usize) -> CgResult<Vec<MeshPartition>> {
    if n_ranks == 0 {
        return Err(CgError::config("partition count must be at least 1"));
    }
    if n_ranks == 1 {
        return Ok(vec![MeshPartition::serial(mesh)]);
    }
    let n_cells = mesh.n_cells();
    if n_ranks > n_cells {
        return Err(CgError::config(format!(
            "cannot split {} cells across {} partitions",
            n_cells, n_ranks
        )));
    }

    // 单元区间
    let cells_of_rank = |r: usize| -> std::ops::Range<usize> {
        let per = n_cells / n_ranks;
        let rem = n_cells % n_ranks;
        let start = r * per + r.min(rem);
        let len = per + usize::from(r < rem);
        start..start + len
    };

    // 全局实体 → 触及它的 rank 集（最小 rank 即拥有者）
    let mut node_ranks: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut edge_ranks: HashMap<u64, Vec<usize>> = HashMap::new();
    for r in 0..n_ranks {
        for c in cells_of_rank(r) {
            let tet = mesh.tets()[c];
            for &n in &tet {
                let e = node_ranks.entry(n as u64).or_default();
                if e.last() != Some(&r) {
                    e.push(r);
                }
            }
            for pair in [
                [tet[0], tet[1]],
                [tet[0], tet[2]],
                [tet[0], tet[3]],
                [tet[1], tet[2]],
                [tet[1], tet[3]],
                [tet[2], tet[3]],
            ] {
                let ge = mesh
                    .find_edge(&pair)
                    .ok_or_else(|| CgError::conversion("cell edge missing from edge table"))?;
                let e = edge_ranks.entry(ge.as_usize() as u64).or_default();
                if e.last() != Some(&r) {
                    e.push(r);
                }
            }
        }
    }

    let mut partitions = Vec::with_capacity(n_ranks);
    for r in 0..n_ranks {
        // 局部节点：按在局部单元中首次出现的顺序编号
        let mut local_of_global: HashMap<u32, u32> = HashMap::new();
        let mut node_global: Vec<u64> = Vec::new();
        let mut local_coords = Vec::new();
        let mut local_tets = Vec::new();

        for c in cells_of_rank(r) {
            let tet = mesh.tets()[c];
            let mut local_tet = [0u32; 4];
            for (slot, &n) in tet.iter().enumerate() {
                let local = *local_of_global.entry(n).or_insert_with(|| {
                    node_global.push(n as u64);
                    local_coords.push(mesh.node(n as usize));
                    (node_global.len() - 1) as u32
                });
                local_tet[slot] = local;
            }
            local_tets.push(local_tet);
        }

        let local_mesh = DomainMesh::from_tets(local_coords, local_tets)?;

        let node_owner: Vec<usize> = node_global
            .iter()
            .map(|g| node_ranks[g][0])
            .collect();
        let node_shared: Vec<bool> = node_global
            .iter()
            .map(|g| node_ranks[g].len() > 1)
            .collect();

        // 局部边 → 全局边
        let mut edge_global = Vec::with_capacity(local_mesh.n_edges());
        let mut edge_owner = Vec::with_capacity(local_mesh.n_edges());
        let mut edge_shared = Vec::with_capacity(local_mesh.n_edges());
        for le in local_mesh.edges() {
            let ga = node_global[le[0] as usize] as u32;
            let gb = node_global[le[1] as usize] as u32;
            let key = edge_key(ga, gb);
            let ge = mesh
                .find_edge(&key)
                .ok_or_else(|| CgError::conversion("partition edge missing from global mesh"))?
                .as_usize() as u64;
            edge_global.push(ge);
            edge_owner.push(edge_ranks[&ge][0]);
            edge_shared.push(edge_ranks[&ge].len() > 1);
        }

        partitions.push(MeshPartition {
            rank: r,
            n_ranks,
            mesh: local_mesh,
            node_global,
            node_owner,
            node_shared,
            edge_global,
            edge_owner,
            edge_shared,
            n_global_nodes: mesh.n_nodes() as u64,
            n_global_edges: mesh.n_edges() as u64,
        });
    }

    Ok(partitions)
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

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
    fn test_serial_partition_all_owned() {
        let mesh = two_tet_mesh();
        let p = MeshPartition::serial(&mesh);
        assert_eq!(p.n_ranks, 1);
        assert_eq!(p.n_ghost_nodes(), 0);
        assert!(p.node_shared.iter().all(|&s| !s));
    }

    #[test]
    fn test_two_partitions_cover_mesh() {
        let mesh = two_tet_mesh();
        let parts = partition_by_cells(&mesh, 2).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].mesh.n_cells() + parts[1].mesh.n_cells(), 2);
    }

    #[test]
    fn test_shared_nodes_have_consistent_owner() {
        let mesh = two_tet_mesh();
        let parts = partition_by_cells(&mesh, 2).unwrap();

        // 节点 1,2,3 被两个分区共享，拥有者必须都是 rank 0
        for p in &parts {
            for (i, &g) in p.node_global.iter().enumerate() {
                if [1u64, 2, 3].contains(&g) {
                    assert!(p.node_shared[i]);
                    assert_eq!(p.node_owner[i], 0);
                }
            }
        }

        // rank 1 上共享节点是幽灵
        assert_eq!(parts[1].n_ghost_nodes(), 3);
        // rank 0 拥有自己的全部节点
        assert_eq!(parts[0].n_ghost_nodes(), 0);
    }

    #[test]
    fn test_every_owned_entity_has_exactly_one_owner() {
        let mesh = two_tet_mesh();
        let parts = partition_by_cells(&mesh, 2).unwrap();

        let mut owned_count: HashMap<u64, usize> = HashMap::new();
        for p in &parts {
            for (i, &g) in p.node_global.iter().enumerate() {
                if p.node_owner[i] == p.rank {
                    *owned_count.entry(g).or_insert(0) += 1;
                }
            }
        }
        assert_eq!(owned_count.len(), mesh.n_nodes());
        assert!(owned_count.values().all(|&c| c == 1));
    }

    #[test]
    fn test_edge_ownership_consistent() {
        let mesh = two_tet_mesh();
        let parts = partition_by_cells(&mesh, 2).unwrap();

        let mut owner_of: HashMap<u64, usize> = HashMap::new();
        for p in &parts {
            for (i, &g) in p.edge_global.iter().enumerate() {
                if let Some(&prev) = owner_of.get(&g) {
                    assert_eq!(prev, p.edge_owner[i], "edge {} owner disagrees", g);
                } else {
                    owner_of.insert(g, p.edge_owner[i]);
                }
            }
        }
    }

    #[test]
    fn test_too_many_partitions_rejected() {
        let mesh = two_tet_mesh();
        assert!(partition_by_cells(&mesh, 10).is_err());
        assert!(partition_by_cells(&mesh, 0).is_err());
    }
}
