// crates/cg_mesh/src/mesh.rs

//! 体网格与实体拓扑
//!
//! [`RawTaggedMesh`] 是生成器（或 .msh 文件）产出的原始表示：节点坐标
//! 加按拓扑维度分块的单元，每块带整数物理区域标签。
//!
//! [`DomainMesh`] 是转换后的只读四面体网格，SoA 布局，并为 0/1/2 维
//! 实体（节点/边/面片）建立唯一实体表。实体编号由四面体列表按首次
//! 出现顺序确定性导出，持久化后重建得到相同编号。

use cg_foundation::{CgError, CgResult, EdgeIndex, FacetIndex};
use glam::DVec3;
use std::collections::HashMap;

// ============================================================================
// 原始带标签网格
// ============================================================================

/// 单一拓扑维度的单元块
///
/// 每个单元携带一个整数物理区域标签。
#[derive(Debug, Clone, PartialEq)]
pub struct CellBlock {
    /// 拓扑维度 (0=vertex, 1=line, 2=triangle, 3=tetrahedron)
    pub dim: u8,
    /// 单元节点索引列表
    pub cells: Vec<Vec<u32>>,
    /// 每个单元的物理区域标签
    pub tags: Vec<u32>,
}

impl CellBlock {
    /// 创建空块
    pub fn empty(dim: u8) -> Self {
        Self {
            dim,
            cells: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// 块中单元数量
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 追加一个带标签单元
    pub fn push(&mut self, nodes: Vec<u32>, tag: u32) {
        self.cells.push(nodes);
        self.tags.push(tag);
    }

    /// 维度对应的节点数 (vertex=1, line=2, triangle=3, tetra=4)
    pub fn nodes_per_cell(dim: u8) -> usize {
        dim as usize + 1
    }
}

/// 生成器输出的带标签原始网格
///
/// 节点坐标 + 按维度分块的带标签单元 + 物理区域名称表。
/// 作为不透明输入消费：本 crate 不假设其来源。
#[derive(Debug, Clone, PartialEq)]
pub struct RawTaggedMesh {
    /// 节点坐标
    pub nodes: Vec<DVec3>,
    /// 按维度分块的单元（同一维度可能出现多块）
    pub blocks: Vec<CellBlock>,
    /// 物理区域名称 → (标签, 维度)
    pub region_names: Vec<(String, u32, u8)>,
}

impl RawTaggedMesh {
    /// 创建空网格
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            blocks: Vec::new(),
            region_names: Vec::new(),
        }
    }

    /// 节点数量
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// 指定维度的全部单元与标签（多块合并，按块序拼接）
    pub fn cells_of_dim(&self, dim: u8) -> (Vec<&[u32]>, Vec<u32>) {
        let mut cells = Vec::new();
        let mut tags = Vec::new();
        for block in self.blocks.iter().filter(|b| b.dim == dim) {
            for (c, &t) in block.cells.iter().zip(block.tags.iter()) {
                cells.push(c.as_slice());
                tags.push(t);
            }
        }
        (cells, tags)
    }

    /// 指定维度是否存在非空块
    pub fn has_dim(&self, dim: u8) -> bool {
        self.blocks.iter().any(|b| b.dim == dim && !b.is_empty())
    }
}

impl Default for RawTaggedMesh {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 体网格
// ============================================================================

/// 只读四面体体网格
///
/// SoA 布局。除四面体本身外还维护 1/2 维唯一实体表（边、面片），
/// 供标记匹配与高阶自由度布局使用。构建后不可变。
#[derive(Debug, Clone)]
pub struct DomainMesh {
    /// 节点坐标
    node_coords: Vec<DVec3>,
    /// 四面体节点索引
    tets: Vec<[u32; 4]>,
    /// 唯一边表（节点按升序存储）
    edges: Vec<[u32; 2]>,
    /// 唯一面片表（节点按升序存储）
    facets: Vec<[u32; 3]>,
    /// 规范键 → 边索引
    edge_lookup: HashMap<[u32; 2], u32>,
    /// 规范键 → 面片索引
    facet_lookup: HashMap<[u32; 3], u32>,
    /// 每个面片相邻的四面体数量（1 = 边界面片）
    facet_tet_count: Vec<u8>,
}

/// 四面体的 4 个面片（局部节点组合）
const TET_FACETS: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

/// 四面体的 6 条边（局部节点组合）
const TET_EDGES: [[usize; 2]; 6] = [[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];

/// 面片规范键：节点升序
#[inline]
pub fn facet_key(a: u32, b: u32, c: u32) -> [u32; 3] {
    let mut k = [a, b, c];
    k.sort_unstable();
    k
}

/// 边规范键：节点升序
#[inline]
pub fn edge_key(a: u32, b: u32) -> [u32; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

impl DomainMesh {
    /// 从节点坐标与四面体列表构建
    ///
    /// 实体表按四面体顺序首次出现的次序编号，因此对同一输入完全确定。
    pub fn from_tets(node_coords: Vec<DVec3>, tets: Vec<[u32; 4]>) -> CgResult<Self> {
        if tets.is_empty() {
            return Err(CgError::conversion("volumetric cell list is empty"));
        }
        let n_nodes = node_coords.len() as u32;
        for (i, tet) in tets.iter().enumerate() {
            for &n in tet {
                if n >= n_nodes {
                    return Err(CgError::conversion(format!(
                        "tetrahedron {} references node {} (mesh has {} nodes)",
                        i, n, n_nodes
                    )));
                }
            }
        }

        let mut edges = Vec::new();
        let mut facets = Vec::new();
        let mut edge_lookup: HashMap<[u32; 2], u32> = HashMap::new();
        let mut facet_lookup: HashMap<[u32; 3], u32> = HashMap::new();
        let mut facet_tet_count: Vec<u8> = Vec::new();

        for tet in &tets {
            for local in TET_EDGES {
                let key = edge_key(tet[local[0]], tet[local[1]]);
                edge_lookup.entry(key).or_insert_with(|| {
                    edges.push(key);
                    (edges.len() - 1) as u32
                });
            }
            for local in TET_FACETS {
                let key = facet_key(tet[local[0]], tet[local[1]], tet[local[2]]);
                match facet_lookup.get(&key) {
                    Some(&idx) => {
                        facet_tet_count[idx as usize] =
                            facet_tet_count[idx as usize].saturating_add(1);
                    }
                    None => {
                        facets.push(key);
                        facet_tet_count.push(1);
                        facet_lookup.insert(key, (facets.len() - 1) as u32);
                    }
                }
            }
        }

        Ok(Self {
            node_coords,
            tets,
            edges,
            facets,
            edge_lookup,
            facet_lookup,
            facet_tet_count,
        })
    }

    // =========================================================================
    // 基本统计
    // =========================================================================

    /// 节点数量
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.node_coords.len()
    }

    /// 边数量
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// 面片数量
    #[inline]
    pub fn n_facets(&self) -> usize {
        self.facets.len()
    }

    /// 四面体数量
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.tets.len()
    }

    /// 指定维度的实体数量
    pub fn n_entities(&self, dim: u8) -> usize {
        match dim {
            0 => self.n_nodes(),
            1 => self.n_edges(),
            2 => self.n_facets(),
            3 => self.n_cells(),
            _ => 0,
        }
    }

    // =========================================================================
    // 实体访问
    // =========================================================================

    /// 节点坐标
    #[inline]
    pub fn node(&self, idx: usize) -> DVec3 {
        self.node_coords[idx]
    }

    /// 全部节点坐标
    #[inline]
    pub fn node_coords(&self) -> &[DVec3] {
        &self.node_coords
    }

    /// 全部四面体
    #[inline]
    pub fn tets(&self) -> &[[u32; 4]] {
        &self.tets
    }

    /// 全部边（规范顺序）
    #[inline]
    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }

    /// 全部面片（规范顺序）
    #[inline]
    pub fn facets(&self) -> &[[u32; 3]] {
        &self.facets
    }

    /// 按规范键查找面片索引
    pub fn find_facet(&self, nodes: &[u32]) -> Option<FacetIndex> {
        if nodes.len() != 3 {
            return None;
        }
        self.facet_lookup
            .get(&facet_key(nodes[0], nodes[1], nodes[2]))
            .map(|&i| FacetIndex::new(i))
    }

    /// 按规范键查找边索引
    pub fn find_edge(&self, nodes: &[u32]) -> Option<EdgeIndex> {
        if nodes.len() != 2 {
            return None;
        }
        self.edge_lookup
            .get(&edge_key(nodes[0], nodes[1]))
            .map(|&i| EdgeIndex::new(i))
    }

    /// 面片是否位于网格边界（只属于一个四面体）
    #[inline]
    pub fn facet_is_boundary(&self, idx: usize) -> bool {
        self.facet_tet_count[idx] == 1
    }

    /// 面片中点
    pub fn facet_midpoint(&self, idx: usize) -> DVec3 {
        let [a, b, c] = self.facets[idx];
        (self.node_coords[a as usize] + self.node_coords[b as usize]
            + self.node_coords[c as usize])
            / 3.0
    }

    /// 边中点
    pub fn edge_midpoint(&self, idx: usize) -> DVec3 {
        let [a, b] = self.edges[idx];
        (self.node_coords[a as usize] + self.node_coords[b as usize]) * 0.5
    }

    /// 四面体带符号体积
    pub fn cell_volume(&self, idx: usize) -> f64 {
        let [a, b, c, d] = self.tets[idx];
        let pa = self.node_coords[a as usize];
        let pb = self.node_coords[b as usize];
        let pc = self.node_coords[c as usize];
        let pd = self.node_coords[d as usize];
        (pb - pa).cross(pc - pa).dot(pd - pa) / 6.0
    }
}

// ============================================================================
// 测试
// ============================================================================
