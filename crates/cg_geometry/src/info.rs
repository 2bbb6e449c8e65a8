// crates/cg_geometry/src/info.rs

//! 几何出处元数据 (info.json)
//!
//! 记录生成参数、几何类型判别、软件版本和 ISO-8601 时间戳。
//! 在网格生成之前写出，中断的运行也留下出处记录。
//!
//! 角度在该文件中始终以度为单位（对外边界不暴露弧度）。

use cg_foundation::{CgError, CgResult};
use cg_mesh::generation::{BivEllipsoidParams, LvEllipsoidParams, SlabParams};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 几何类型判别 + 生成参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mesh_type", rename_all = "snake_case")]
pub enum GeometryParams {
    /// 矩形 slab
    Slab(SlabParams),
    /// 理想化 LV 椭球
    LvEllipsoid(LvEllipsoidParams),
    /// 理想化 BiV 椭球
    BivEllipsoid(BivEllipsoidParams),
}

impl GeometryParams {
    /// 几何类型名（与 mesh_type 判别一致）
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Slab(_) => "slab",
            Self::LvEllipsoid(_) => "lv_ellipsoid",
            Self::BivEllipsoid(_) => "biv_ellipsoid",
        }
    }

    /// 原始网格文件名
    pub fn mesh_file_name(&self) -> &'static str {
        match self {
            Self::Slab(_) => "slab.msh",
            Self::LvEllipsoid(_) => "lv_ellipsoid.msh",
            Self::BivEllipsoid(_) => "biv_ellipsoid.msh",
        }
    }
}

/// 几何出处元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryInfo {
    /// 生成参数（含几何类型判别）
    #[serde(flatten)]
    pub params: GeometryParams,
    /// 是否生成纤维
    pub create_fibers: bool,
    /// 内膜螺旋角 [度]
    pub fiber_angle_endo: f64,
    /// 外膜螺旋角 [度]
    pub fiber_angle_epi: f64,
    /// 纤维函数空间（P_1 / P_2 拼写）
    pub fiber_space: String,
    /// 软件版本
    pub cardiogeom_version: String,
    /// ISO-8601 时间戳
    pub timestamp: String,
}

impl GeometryInfo {
    /// 创建元数据（当前时刻、当前 crate 版本）
    pub fn new(
        params: GeometryParams,
        create_fibers: bool,
        fiber_angle_endo: f64,
        fiber_angle_epi: f64,
        fiber_space: String,
    ) -> Self {
        Self {
            params,
            create_fibers,
            fiber_angle_endo,
            fiber_angle_epi,
            fiber_space,
            cardiogeom_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// 写入 info.json
    pub fn save(&self, dir: &Path) -> CgResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CgError::serialization(e.to_string()))?;
        std::fs::write(dir.join("info.json"), json)
            .map_err(|e| CgError::io_with_source("cannot write info.json", e))?;
        Ok(())
    }

    /// 从 info.json 读取
    pub fn load(dir: &Path) -> CgResult<Self> {
        let path = dir.join("info.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|_| CgError::file_not_found(path))?;
        serde_json::from_str(&content).map_err(|e| CgError::serialization(e.to_string()))
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_json_roundtrip() {
        let info = GeometryInfo::new(
            GeometryParams::Slab(SlabParams::default()),
            true,
            -60.0,
            60.0,
            "P_1".to_string(),
        );

        let dir = tempfile::tempdir().unwrap();
        info.save(dir.path()).unwrap();
        let loaded = GeometryInfo::load(dir.path()).unwrap();

        assert_eq!(loaded.params.type_name(), "slab");
        assert_eq!(loaded.create_fibers, true);
        assert_eq!(loaded.fiber_angle_endo, -60.0);
        assert_eq!(loaded.fiber_space, "P_1");
        assert!(!loaded.timestamp.is_empty());
    }

    #[test]
    fn test_mesh_type_discriminator_in_json() {
        let info = GeometryInfo::new(
            GeometryParams::LvEllipsoid(LvEllipsoidParams::default()),
            false,
            -60.0,
            60.0,
            "P_1".to_string(),
        );
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"mesh_type\":\"lv_ellipsoid\""));
        assert!(json.contains("r_short_endo"));
    }

    #[test]
    fn test_mesh_file_names() {
        assert_eq!(
            GeometryParams::Slab(SlabParams::default()).mesh_file_name(),
            "slab.msh"
        );
        assert_eq!(
            GeometryParams::BivEllipsoid(BivEllipsoidParams::default()).mesh_file_name(),
            "biv_ellipsoid.msh"
        );
    }

    #[test]
    fn test_missing_info_json() {
        let dir = tempfile::tempdir().unwrap();
        let err = GeometryInfo::load(dir.path()).unwrap_err();
        assert!(matches!(err, CgError::FileNotFound { .. }));
    }
}
