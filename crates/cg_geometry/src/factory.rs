// crates/cg_geometry/src/factory.rs

//! 几何工厂
//!
//! 顶层编排，固定步骤：
//!
//! 1. 能力检查（任何分布式工作开始之前）
//! 2. 写 info.json（网格生成前，中断运行也留下出处）
//! 3. 生成器产出原始带标签网格，写 `<type>.msh`
//! 4. 转换为体网格 + 标记函数，写 markers.json
//! 5. 按需生成纤维微结构
//! 6. 持久化目录，再从目录重载返回（加载路径每次都被验证）
//!
//! 未给 outdir 时使用临时目录，返回前释放。缺失后端产生 `Ok(None)`
//! （缺席的几何），计算失败照常报错。"后端未安装"与"计算失败"
//! 是两类可观测结果。

use crate::capability::Backends;
use crate::geometry::Geometry;
use crate::info::{GeometryInfo, GeometryParams};
use cg_fibers::basis::ProlateRadii;
use cg_fibers::{
    create_biv_microstructure, create_lv_microstructure, create_slab_microstructure, AngleParams,
};
use cg_foundation::CgResult;
use cg_mesh::converter::{ConvertedGeometry, MeshConverter};
use cg_mesh::generation::{BivEllipsoidParams, LvEllipsoidParams, SlabParams};
use cg_mesh::io::msh::MshWriter;
use cg_mesh::mesh::RawTaggedMesh;
use cg_solver::space::FiberSpace;
use std::path::Path;
use tracing::{info, warn};

/// 纤维生成选项
#[derive(Debug, Clone, Copy)]
pub struct FiberOptions {
    /// 是否生成纤维
    pub create_fibers: bool,
    /// 螺旋角端点 [度]
    pub angles: AngleParams,
    /// 纤维函数空间
    pub fiber_space: FiberSpace,
}

impl Default for FiberOptions {
    fn default() -> Self {
        Self {
            create_fibers: false,
            angles: AngleParams::default(),
            fiber_space: FiberSpace::P1,
        }
    }
}

/// 几何工厂
pub struct GeometryFactory {
    backends: Backends,
}

impl GeometryFactory {
    /// 用注入的后端创建工厂
    pub fn new(backends: Backends) -> Self {
        Self { backends }
    }

    /// 用内置后端创建工厂
    pub fn with_defaults() -> Self {
        Self::new(Backends::detect())
    }

    /// 后端能力
    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// 创建 slab 几何
    pub fn create_slab(
        &self,
        outdir: Option<&Path>,
        params: &SlabParams,
        fibers: &FiberOptions,
    ) -> CgResult<Option<Geometry>> {
        self.create(
            outdir,
            GeometryParams::Slab(params.clone()),
            fibers,
            || self.backends.mesher()?.slab(params),
            |converted, fibers| {
                create_slab_microstructure(
                    converted,
                    &fibers.angles,
                    fibers.fiber_space,
                    self.backends.solver()?,
                )
            },
        )
    }

    /// 创建 LV 椭球几何
    pub fn create_lv_ellipsoid(
        &self,
        outdir: Option<&Path>,
        params: &LvEllipsoidParams,
        fibers: &FiberOptions,
    ) -> CgResult<Option<Geometry>> {
        let radii = ProlateRadii {
            r_short_endo: params.r_short_endo,
            r_short_epi: params.r_short_epi,
            r_long_endo: params.r_long_endo,
            r_long_epi: params.r_long_epi,
        };
        self.create(
            outdir,
            GeometryParams::LvEllipsoid(params.clone()),
            fibers,
            || self.backends.mesher()?.lv_ellipsoid(params),
            |converted, fibers| {
                create_lv_microstructure(
                    converted,
                    radii,
                    &fibers.angles,
                    fibers.fiber_space,
                    self.backends.solver()?,
                )
            },
        )
    }

    /// 创建 BiV 椭球几何
    pub fn create_biv_ellipsoid(
        &self,
        outdir: Option<&Path>,
        params: &BivEllipsoidParams,
        fibers: &FiberOptions,
    ) -> CgResult<Option<Geometry>> {
        self.create(
            outdir,
            GeometryParams::BivEllipsoid(params.clone()),
            fibers,
            || self.backends.mesher()?.biv_ellipsoid(params),
            |converted, fibers| {
                create_biv_microstructure(
                    converted,
                    &fibers.angles,
                    fibers.fiber_space,
                    self.backends.solver()?,
                )
            },
        )
    }

    /// 共用创建流程
    fn create(
        &self,
        outdir: Option<&Path>,
        geometry_params: GeometryParams,
        fibers: &FiberOptions,
        generate: impl FnOnce() -> CgResult<RawTaggedMesh>,
        make_fibers: impl FnOnce(&ConvertedGeometry, &FiberOptions) -> CgResult<cg_fibers::Microstructure>,
    ) -> CgResult<Option<Geometry>> {
        // 能力检查在任何工作之前
        if !self.backends.has_mesher() {
            warn!(
                geometry = geometry_params.type_name(),
                "mesh generator backend not installed, returning absent geometry"
            );
            return Ok(None);
        }

        // outdir 缺省 → 临时目录，返回前释放
        let tmpdir;
        let dir: &Path = match outdir {
            Some(d) => {
                std::fs::create_dir_all(d).map_err(|e| {
                    cg_foundation::CgError::io_with_source("cannot create output directory", e)
                })?;
                d
            }
            None => {
                tmpdir = tempfile::tempdir().map_err(|e| {
                    cg_foundation::CgError::io_with_source("cannot create temp directory", e)
                })?;
                tmpdir.path()
            }
        };

        // 出处元数据先落盘
        let geometry_info = GeometryInfo::new(
            geometry_params,
            fibers.create_fibers,
            fibers.angles.alpha_endo,
            fibers.angles.alpha_epi,
            fibers.fiber_space.to_string(),
        );
        geometry_info.save(dir)?;

        // 生成原始网格并写出
        let raw = generate()?;
        MshWriter::write(dir.join(geometry_info.params.mesh_file_name()), &raw)?;

        if !self.backends.has_solver() {
            warn!(
                geometry = geometry_info.params.type_name(),
                "elliptic solver backend not installed, mesh written, returning absent geometry"
            );
            return Ok(None);
        }

        // 转换与标记
        let converted = MeshConverter::convert(&raw)?;

        // 纤维按需生成
        let microstructure = if fibers.create_fibers {
            Some(make_fibers(&converted, fibers)?)
        } else {
            None
        };

        let geometry = Geometry {
            converted,
            microstructure,
            info: geometry_info,
        };
        geometry.save(dir)?;

        // 从目录重载返回，加载路径每次都被验证
        let reloaded = Geometry::from_folder(dir)?;
        info!(
            geometry = reloaded.info.params.type_name(),
            n_cells = reloaded.mesh().n_cells(),
            fibers = reloaded.microstructure.is_some(),
            "geometry created"
        );
        Ok(Some(reloaded))
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn small_slab() -> SlabParams {
        SlabParams {
            lx: 2.0,
            ly: 1.0,
            lz: 1.0,
            dx: 0.5,
        }
    }

    #[test]
    fn test_create_slab_with_fibers() {
        let factory = GeometryFactory::with_defaults();
        let dir = tempfile::tempdir().unwrap();
        let geo = factory
            .create_slab(
                Some(dir.path()),
                &small_slab(),
                &FiberOptions {
                    create_fibers: true,
                    ..FiberOptions::default()
                },
            )
            .unwrap()
            .expect("backends installed, geometry must be present");

        assert!(geo.microstructure.is_some());
        assert!(dir.path().join("info.json").exists());
        assert!(dir.path().join("markers.json").exists());
        assert!(dir.path().join("slab.msh").exists());
        assert!(dir.path().join("mesh.cgm").exists());
        assert!(dir.path().join("microstructure.cgf").exists());
    }

    #[test]
    fn test_create_slab_without_fibers() {
        let factory = GeometryFactory::with_defaults();
        let dir = tempfile::tempdir().unwrap();
        let geo = factory
            .create_slab(Some(dir.path()), &small_slab(), &FiberOptions::default())
            .unwrap()
            .unwrap();
        assert!(geo.microstructure.is_none());
        assert!(!dir.path().join("microstructure.cgf").exists());
    }

    #[test]
    fn test_no_mesher_absent_geometry() {
        let factory = GeometryFactory::new(Backends::none());
        let result = factory
            .create_slab(None, &small_slab(), &FiberOptions::default())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_no_solver_mesh_still_written() {
        let factory = GeometryFactory::new(Backends::detect().without_solver());
        let dir = tempfile::tempdir().unwrap();
        let result = factory
            .create_slab(Some(dir.path()), &small_slab(), &FiberOptions::default())
            .unwrap();

        assert!(result.is_none());
        // 网格与出处已写出（缺席结果 ≠ 没有产物）
        assert!(dir.path().join("info.json").exists());
        assert!(dir.path().join("slab.msh").exists());
    }

    #[test]
    fn test_temp_outdir_released() {
        let factory = GeometryFactory::with_defaults();
        let geo = factory
            .create_slab(None, &small_slab(), &FiberOptions::default())
            .unwrap();
        // 临时目录已释放，但几何在内存中完整
        assert!(geo.unwrap().mesh().n_cells() > 0);
    }

    #[test]
    fn test_create_lv_ellipsoid() {
        let factory = GeometryFactory::with_defaults();
        let geo = factory
            .create_lv_ellipsoid(
                None,
                &LvEllipsoidParams::default(),
                &FiberOptions {
                    create_fibers: true,
                    ..FiberOptions::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!(geo.microstructure.is_some());
        assert_eq!(geo.markers().get("ENDO"), Some((1, 2)));
    }
}
