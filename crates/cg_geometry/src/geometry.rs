// crates/cg_geometry/src/geometry.rs

//! Geometry 聚合与目录持久化
//!
//! 一个几何 = 体网格 + 标记集 + 四个标记函数 + 可选微结构 + 出处
//! 元数据。目录布局：
//!
//! ```text
//! outdir/
//!   info.json             出处元数据
//!   markers.json          区域名 → [标签, 维度]
//!   <type>.msh            生成器输出的原始带标签网格
//!   mesh.cgm              体网格 + 标记函数（二进制）
//!   microstructure.cgf    纤维三元组（可选，二进制）
//! ```
//!
//! 幂等性：`from_folder(save(G))` 与 G 在序列化容差内观测相等
//! （两种二进制格式按 little-endian f64 原样存储，场值往返精确）。

use crate::info::GeometryInfo;
use cg_fibers::Microstructure;
use cg_foundation::{CgError, CgResult};
use cg_mesh::converter::ConvertedGeometry;
use cg_mesh::io::cgm;
use cg_mesh::markers::MarkerSet;
use cg_mesh::mesh::DomainMesh;
use std::path::Path;
use tracing::info;

/// 聚合的几何
#[derive(Debug, Clone)]
pub struct Geometry {
    /// 体网格、标记集与标记函数
    pub converted: ConvertedGeometry,
    /// 纤维微结构（按需生成）
    pub microstructure: Option<Microstructure>,
    /// 出处元数据
    pub info: GeometryInfo,
}

impl Geometry {
    /// 体网格
    pub fn mesh(&self) -> &DomainMesh {
        &self.converted.mesh
    }

    /// 标记集
    pub fn markers(&self) -> &MarkerSet {
        &self.converted.markers
    }

    /// 持久化到目录
    pub fn save(&self, dir: &Path) -> CgResult<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| CgError::io_with_source("cannot create geometry directory", e))?;

        self.info.save(dir)?;

        let markers_json = serde_json::to_string_pretty(&self.converted.markers)
            .map_err(|e| CgError::serialization(e.to_string()))?;
        std::fs::write(dir.join("markers.json"), markers_json)
            .map_err(|e| CgError::io_with_source("cannot write markers.json", e))?;

        cgm::write_mesh(&dir.join("mesh.cgm"), &self.converted)?;

        if let Some(ms) = &self.microstructure {
            ms.save(&dir.join("microstructure.cgf"))?;
        }

        info!(dir = %dir.display(), "geometry saved");
        Ok(())
    }

    /// 从目录重建等价几何
    pub fn from_folder(dir: &Path) -> CgResult<Self> {
        let info = GeometryInfo::load(dir)?;

        let converted = cgm::read_mesh(&dir.join("mesh.cgm"))?;

        // markers.json 与 mesh.cgm 内嵌的标记集必须一致
        let markers_path = dir.join("markers.json");
        let markers_text = std::fs::read_to_string(&markers_path)
            .map_err(|_| CgError::file_not_found(markers_path))?;
        let markers: MarkerSet = serde_json::from_str(&markers_text)
            .map_err(|e| CgError::serialization(e.to_string()))?;
        if markers != converted.markers {
            return Err(CgError::serialization(
                "markers.json disagrees with mesh.cgm marker set",
            ));
        }

        let ms_path = dir.join("microstructure.cgf");
        let microstructure = if ms_path.exists() {
            Some(Microstructure::load(&ms_path)?)
        } else {
            None
        };

        Ok(Self {
            converted,
            microstructure,
            info,
        })
    }
}

// ============================================================================
// 测试
// ============================================================================
