// crates/cg_mesh/src/converter.rs

//! 网格转换管线
//!
//! 把生成器产出的带标签原始网格转换为体网格加四个按维度的标记函数：
//!
//! 1. 提取最高维（四面体）块构成 [`DomainMesh`]，其标签直接成为
//!    单元标记函数（不做哨兵重置）；
//! 2. 对每个低维度 (0/1/2)，把该维度的块经由块文件往返一次（实现
//!    必要性，块数据经过同一条文件读写路径；临时文件由 `TempDir`
//!    作用域管理，成功与失败路径都确定性清理）；
//! 3. 把块中每个带标签单元与网格实体按规范节点键匹配并赋标签，
//!    未命中实体填 [`UNSET_TAG`]，随后施加哨兵重置
//!    （见 [`markers`](crate::markers) 模块的策略说明）；
//! 4. 从物理名称表建立 [`MarkerSet`]。

use crate::io::msh::{MshReader, MshWriter};
use crate::markers::{MarkerFunction, MarkerSet};
use crate::mesh::{CellBlock, DomainMesh, RawTaggedMesh};
use cg_foundation::{CgError, CgResult};
use tracing::{debug, info};

/// 转换结果：体网格 + 标记集 + 四个标记函数
#[derive(Debug, Clone)]
pub struct ConvertedGeometry {
    /// 体网格
    pub mesh: DomainMesh,
    /// 区域名称 → (标签, 维度)
    pub markers: MarkerSet,
    /// 顶点标记函数（维度 0）
    pub vfun: MarkerFunction,
    /// 边标记函数（维度 1）
    pub efun: MarkerFunction,
    /// 面片标记函数（维度 2）
    pub ffun: MarkerFunction,
    /// 单元标记函数（维度 3）
    pub cfun: MarkerFunction,
}

impl ConvertedGeometry {
    /// 按维度取标记函数
    pub fn marker_function(&self, dim: u8) -> Option<&MarkerFunction> {
        match dim {
            0 => Some(&self.vfun),
            1 => Some(&self.efun),
            2 => Some(&self.ffun),
            3 => Some(&self.cfun),
            _ => None,
        }
    }
}

/// 网格转换器
pub struct MeshConverter;

impl MeshConverter {
    /// 转换原始网格
    pub fn convert(raw: &RawTaggedMesh) -> CgResult<ConvertedGeometry> {
        // 体网格块
        let (tet_cells, tet_tags) = raw.cells_of_dim(3);
        if tet_cells.is_empty() {
            return Err(CgError::conversion(
                "raw mesh has no volumetric (tetrahedron) block",
            ));
        }
        let mut tets = Vec::with_capacity(tet_cells.len());
        for cell in &tet_cells {
            if cell.len() != 4 {
                return Err(CgError::conversion(format!(
                    "volumetric cell has {} nodes, expected 4",
                    cell.len()
                )));
            }
            tets.push([cell[0], cell[1], cell[2], cell[3]]);
        }
        let mesh = DomainMesh::from_tets(raw.nodes.clone(), tets)?;
        let cfun = MarkerFunction::from_values(3, tet_tags);

        // 低维块经由块文件往返后匹配。TempDir 的 RAII 保证两条路径
        // 上的清理。
        let tmpdir = tempfile::tempdir()
            .map_err(|e| CgError::io_with_source("cannot create block file directory", e))?;

        let mut funs = Vec::with_capacity(3);
        for dim in 0u8..3 {
            let block = Self::roundtrip_block(raw, dim, tmpdir.path())?;
            let fun = Self::match_block(&mesh, dim, &block);
            debug!(
                dim,
                n_cells = block.len(),
                n_entities = mesh.n_entities(dim),
                "matched marker block"
            );
            funs.push(fun);
        }

        let markers = MarkerSet::from_regions(&raw.region_names)?;

        info!(
            n_nodes = mesh.n_nodes(),
            n_cells = mesh.n_cells(),
            n_facets = mesh.n_facets(),
            n_regions = markers.len(),
            "converted raw mesh"
        );

        let mut it = funs.into_iter();
        Ok(ConvertedGeometry {
            mesh,
            markers,
            vfun: it.next().unwrap(),
            efun: it.next().unwrap(),
            ffun: it.next().unwrap(),
            cfun,
        })
    }

    /// 把单一维度的块写入块文件再读回
    fn roundtrip_block(
        raw: &RawTaggedMesh,
        dim: u8,
        tmpdir: &std::path::Path,
    ) -> CgResult<CellBlock> {
        let (cells, tags) = raw.cells_of_dim(dim);
        let mut block = CellBlock::empty(dim);
        for (cell, tag) in cells.iter().zip(tags.iter()) {
            block.push(cell.to_vec(), *tag);
        }

        let path = tmpdir.join(format!("dim{}_block.msh", dim));
        let single = RawTaggedMesh {
            nodes: raw.nodes.clone(),
            blocks: vec![block],
            region_names: Vec::new(),
        };
        MshWriter::write(&path, &single)?;

        let reread = MshReader::load(&path)?;
        let mut out = CellBlock::empty(dim);
        let (cells, tags) = reread.cells_of_dim(dim);
        for (cell, tag) in cells.iter().zip(tags.iter()) {
            out.push(cell.to_vec(), *tag);
        }
        Ok(out)
    }

    /// 把块单元匹配到网格实体并赋标签，然后施加哨兵重置
    fn match_block(mesh: &DomainMesh, dim: u8, block: &CellBlock) -> MarkerFunction {
        let mut fun = MarkerFunction::unset(dim, mesh.n_entities(dim));

        for (cell, &tag) in block.cells.iter().zip(block.tags.iter()) {
            let entity = match dim {
                0 => cell
                    .first()
                    .map(|&n| n as usize)
                    .filter(|&n| n < mesh.n_nodes()),
                1 => mesh.find_edge(cell).map(|i| i.as_usize()),
                2 => mesh.find_facet(cell).map(|i| i.as_usize()),
                _ => None,
            };
            match entity {
                Some(idx) => fun.set(idx, tag),
                None => debug!(dim, ?cell, "tagged cell matches no mesh entity"),
            }
        }

        fun.apply_unmarked_sentinel();
        fun
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    /// 两个四面体 + 面片/边/顶点标签的手工原始网格
    fn tagged_raw_mesh() -> RawTaggedMesh {
        let nodes = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(1.0, 1.0, 1.0),
        ];

        let mut tet_block = CellBlock::empty(3);
        tet_block.push(vec![0, 1, 2, 3], 10);
        tet_block.push(vec![1, 2, 3, 4], 11);

        let mut facet_block = CellBlock::empty(2);
        facet_block.push(vec![0, 1, 2], 1);
        facet_block.push(vec![0, 1, 3], 2);

        let mut edge_block = CellBlock::empty(1);
        edge_block.push(vec![0, 1], 5);

        let mut vertex_block = CellBlock::empty(0);
        vertex_block.push(vec![4], 9);

        RawTaggedMesh {
            nodes,
            blocks: vec![tet_block, facet_block, edge_block, vertex_block],
            region_names: vec![
                ("F_A".into(), 1, 2),
                ("F_B".into(), 2, 2),
                ("EDGE".into(), 5, 1),
                ("APEX".into(), 9, 0),
            ],
        }
    }

    #[test]
    fn test_convert_basic() {
        let geo = MeshConverter::convert(&tagged_raw_mesh()).unwrap();
        assert_eq!(geo.mesh.n_cells(), 2);
        assert_eq!(geo.cfun.values(), &[10, 11]);
        assert_eq!(geo.markers.len(), 4);
    }

    #[test]
    fn test_tagged_facets_keep_tags_untagged_zero() {
        let geo = MeshConverter::convert(&tagged_raw_mesh()).unwrap();

        let fa = geo.mesh.find_facet(&[0, 1, 2]).unwrap().as_usize();
        let fb = geo.mesh.find_facet(&[0, 1, 3]).unwrap().as_usize();
        assert_eq!(geo.ffun.get(fa), 1);
        assert_eq!(geo.ffun.get(fb), 2);

        // 其余面片全部未标记
        for f in 0..geo.mesh.n_facets() {
            if f != fa && f != fb {
                assert_eq!(geo.ffun.get(f), 0, "facet {} should be unmarked", f);
            }
        }
    }

    #[test]
    fn test_edge_and_vertex_markers() {
        let geo = MeshConverter::convert(&tagged_raw_mesh()).unwrap();

        let e = geo.mesh.find_edge(&[0, 1]).unwrap().as_usize();
        assert_eq!(geo.efun.get(e), 5);
        assert_eq!(geo.efun.count_tag(5), 1);

        assert_eq!(geo.vfun.get(4), 9);
        assert_eq!(geo.vfun.count_tag(0), 4);
    }

    #[test]
    fn test_cell_markers_exempt_from_sentinel() {
        // 所有单元都带标签；若哨兵作用于单元维度，最大标签 11 会被清零
        let geo = MeshConverter::convert(&tagged_raw_mesh()).unwrap();
        assert_eq!(geo.cfun.count_tag(11), 1);
    }

    #[test]
    fn test_missing_volumetric_block() {
        let mut raw = tagged_raw_mesh();
        raw.blocks.retain(|b| b.dim != 3);
        let err = MeshConverter::convert(&raw).unwrap_err();
        assert!(matches!(err, CgError::Conversion { .. }));
    }

    #[test]
    fn test_empty_lower_dims_all_unmarked() {
        let mut raw = tagged_raw_mesh();
        raw.blocks.retain(|b| b.dim == 3);
        let geo = MeshConverter::convert(&raw).unwrap();

        assert!(geo.ffun.values().iter().all(|&v| v == 0));
        assert!(geo.efun.values().iter().all(|&v| v == 0));
        assert!(geo.vfun.values().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_marker_function_accessor() {
        let geo = MeshConverter::convert(&tagged_raw_mesh()).unwrap();
        assert_eq!(geo.marker_function(2).unwrap().dim(), 2);
        assert!(geo.marker_function(4).is_none());
    }
}
