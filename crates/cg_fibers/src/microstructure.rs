// crates/cg_fibers/src/microstructure.rs

//! 微结构聚合与持久化
//!
//! [`Microstructure`] 是按全局点序收拢的三元组（x/y/z 交错），
//! 加上元素族描述。持久化为 CGF 二进制文件，契约为一次写入、
//! 读回相等。
//!
//! `create_*` 驱动把各几何的完整管线串起来：标记 → 跨壁场 →
//! 局部基 → 三元组。[`compute_triad_on_partition`] 是分区版入口，
//! 同一代码在串行与多分区世界中运行。

use crate::angle::AngleParams;
use crate::basis::{FiberBasis, ProlateRadii};
use crate::frame::{LocalFrameBuilder, Triad};
use crate::transmural::TransmuralField;
use cg_foundation::{CgError, CgResult};
use cg_mesh::converter::ConvertedGeometry;
use cg_mesh::io::crc32;
use cg_solver::partition::MeshPartition;
use cg_solver::space::{FiberSpace, FunctionSpace};
use cg_solver::world::{Communicator, SerialComm};
use cg_solver::EllipticSolver;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

/// CGF 文件魔数
pub const CGF_MAGIC: &[u8; 4] = b"CGF1";

/// CGF 格式版本
pub const CGF_VERSION: u32 = 1;

/// 微结构：三个方向场（全局点序，x/y/z 交错）
#[derive(Debug, Clone, PartialEq)]
pub struct Microstructure {
    /// 元素族
    pub element: FiberSpace,
    /// 纤维方向
    pub f0: Vec<f64>,
    /// 薄片方向
    pub s0: Vec<f64>,
    /// 薄片法向
    pub n0: Vec<f64>,
}

impl Microstructure {
    /// 点自由度数量
    pub fn n_points(&self) -> usize {
        self.f0.len() / 3
    }

    /// 保存到 CGF 文件
    pub fn save(&self, path: &Path) -> CgResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CgError::io_with_source("cannot create output directory", e))?;
        }

        let mut data = Vec::new();
        data.extend_from_slice(CGF_MAGIC);
        data.extend_from_slice(&CGF_VERSION.to_le_bytes());
        data.extend_from_slice(&self.element.degree().to_le_bytes());
        data.extend_from_slice(&(self.n_points() as u64).to_le_bytes());
        for field in [&self.f0, &self.s0, &self.n0] {
            for &v in field.iter() {
                data.extend_from_slice(&v.to_le_bytes());
            }
        }
        let crc = crc32::compute(&data);

        let temp_path = path.with_extension("cgf.tmp");
        {
            let file = File::create(&temp_path)
                .map_err(|e| CgError::io_with_source("cannot create microstructure file", e))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&data)?;
            writer.write_all(&crc.to_le_bytes())?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, path)
            .map_err(|e| CgError::io_with_source("cannot finalize microstructure file", e))?;
        Ok(())
    }

    /// 从 CGF 文件加载
    pub fn load(path: &Path) -> CgResult<Self> {
        let mut file =
            File::open(path).map_err(|_| CgError::file_not_found(path.to_path_buf()))?;
        let mut all = Vec::new();
        file.read_to_end(&mut all)?;

        if all.len() < 4 + 4 + 4 + 8 + 4 {
            return Err(CgError::serialization("microstructure file too small"));
        }
        let crc_offset = all.len() - 4;
        let data = &all[..crc_offset];
        let stored = u32::from_le_bytes([
            all[crc_offset],
            all[crc_offset + 1],
            all[crc_offset + 2],
            all[crc_offset + 3],
        ]);
        if stored != crc32::compute(data) {
            return Err(CgError::serialization("microstructure file checksum mismatch"));
        }

        let mut offset = 0usize;
        let take = |offset: &mut usize, n: usize| -> CgResult<&[u8]> {
            if *offset + n > data.len() {
                return Err(CgError::serialization("microstructure file truncated"));
            }
            let s = &data[*offset..*offset + n];
            *offset += n;
            Ok(s)
        };

        if take(&mut offset, 4)? != CGF_MAGIC {
            return Err(CgError::serialization("not a CGF microstructure file"));
        }
        let version = u32::from_le_bytes(take(&mut offset, 4)?.try_into().unwrap());
        if version != CGF_VERSION {
            return Err(CgError::serialization(format!(
                "unsupported CGF version {}",
                version
            )));
        }
        let degree = u32::from_le_bytes(take(&mut offset, 4)?.try_into().unwrap());
        let element = match degree {
            1 => FiberSpace::P1,
            2 => FiberSpace::P2,
            d => {
                return Err(CgError::serialization(format!(
                    "unsupported element degree {}",
                    d
                )))
            }
        };
        let n_points = u64::from_le_bytes(take(&mut offset, 8)?.try_into().unwrap()) as usize;

        let mut fields = Vec::with_capacity(3);
        for _ in 0..3 {
            let mut field = Vec::with_capacity(3 * n_points);
            for _ in 0..3 * n_points {
                field.push(f64::from_le_bytes(take(&mut offset, 8)?.try_into().unwrap()));
            }
            fields.push(field);
        }
        let mut it = fields.into_iter();
        Ok(Self {
            element,
            f0: it.next().unwrap(),
            s0: it.next().unwrap(),
            n0: it.next().unwrap(),
        })
    }
}

// ============================================================================
// 分区驱动
// ============================================================================

/// 在一个分区上构建三元组（SPMD 入口）
///
/// 返回向量空间与同步后的三元组。串行情形传 [`SerialComm`]。
pub fn compute_triad_on_partition<C: Communicator>(
    partition: &MeshPartition,
    t: &TransmuralField,
    angles: &AngleParams,
    basis: &FiberBasis,
    comm: &C,
) -> CgResult<(FunctionSpace, Triad)> {
    let scalar = FunctionSpace::scalar(partition, t.element());
    let vector = FunctionSpace::vector(partition, t.element());
    let builder = LocalFrameBuilder::new(&scalar, &vector)?;
    let t_local = t.restrict(&scalar)?;
    let triad = builder.build(&t_local, angles, basis, comm)?;
    Ok((vector, triad))
}

/// 串行管线：跨壁场 + 基 → 全局点序微结构
fn create_microstructure(
    geo: &ConvertedGeometry,
    endo_tags: &[u32],
    epi_tags: &[u32],
    basis_for: impl FnOnce(&TransmuralField) -> CgResult<FiberBasis>,
    angles: &AngleParams,
    element: FiberSpace,
    solver: &dyn EllipticSolver,
) -> CgResult<Microstructure> {
    let t = TransmuralField::solve(&geo.mesh, &geo.ffun, endo_tags, epi_tags, element, solver)?;
    let basis = basis_for(&t)?;

    let partition = MeshPartition::serial(&geo.mesh);
    let (_, triad) = compute_triad_on_partition(&partition, &t, angles, &basis, &SerialComm)?;

    // 串行向量空间按全局升序排点，存储即全局点序
    info!(
        n_points = triad.f0.n_points(),
        element = %element,
        "microstructure computed"
    );
    Ok(Microstructure {
        element,
        f0: triad.f0.as_slice().to_vec(),
        s0: triad.s0.as_slice().to_vec(),
        n0: triad.n0.as_slice().to_vec(),
    })
}

/// slab 微结构：固定笛卡尔基，endo=Y0，epi=Y1
pub fn create_slab_microstructure(
    geo: &ConvertedGeometry,
    angles: &AngleParams,
    element: FiberSpace,
    solver: &dyn EllipticSolver,
) -> CgResult<Microstructure> {
    let (endo, endo_dim) = geo.markers.require("Y0")?;
    let (epi, epi_dim) = geo.markers.require("Y1")?;
    check_facet_dim(endo_dim, epi_dim)?;
    create_microstructure(
        geo,
        &[endo],
        &[epi],
        |_| Ok(FiberBasis::Slab),
        angles,
        element,
        solver,
    )
}

/// LV 微结构：解析长椭球基，endo=ENDO，epi=EPI
pub fn create_lv_microstructure(
    geo: &ConvertedGeometry,
    radii: ProlateRadii,
    angles: &AngleParams,
    element: FiberSpace,
    solver: &dyn EllipticSolver,
) -> CgResult<Microstructure> {
    let (endo, endo_dim) = geo.markers.require("ENDO")?;
    let (epi, epi_dim) = geo.markers.require("EPI")?;
    check_facet_dim(endo_dim, epi_dim)?;
    create_microstructure(
        geo,
        &[endo],
        &[epi],
        |_| Ok(FiberBasis::Prolate(radii)),
        angles,
        element,
        solver,
    )
}

/// BiV 微结构：梯度基，endo={ENDO_LV, ENDO_RV}，epi=EPI
pub fn create_biv_microstructure(
    geo: &ConvertedGeometry,
    angles: &AngleParams,
    element: FiberSpace,
    solver: &dyn EllipticSolver,
) -> CgResult<Microstructure> {
    let (endo_lv, d1) = geo.markers.require("ENDO_LV")?;
    let (endo_rv, d2) = geo.markers.require("ENDO_RV")?;
    let (epi, d3) = geo.markers.require("EPI")?;
    check_facet_dim(d1, d2)?;
    check_facet_dim(d2, d3)?;

    let n_nodes = geo.mesh.n_nodes();
    let mesh = &geo.mesh;
    create_microstructure(
        geo,
        &[endo_lv, endo_rv],
        &[epi],
        |t| FiberBasis::gradient_from_field(mesh, &t.values()[..n_nodes], t.element()),
        angles,
        element,
        solver,
    )
}

/// 边界标记必须是面片维度
fn check_facet_dim(a: u8, b: u8) -> CgResult<()> {
    if a != 2 || b != 2 {
        return Err(CgError::dimension_mismatch(format!(
            "boundary markers must have dimension 2, got {} and {}",
            a, b
        )));
    }
    Ok(())
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cg_foundation::tolerance::ORTHONORMAL_TOL;
    use cg_mesh::converter::MeshConverter;
    use cg_mesh::generation::{
        BivEllipsoidParams, LvEllipsoidParams, MeshGenerator, SlabParams,
        StructuredMeshGenerator,
    };
    use cg_solver::ConjugateGradient;
    use glam::DVec3;

    fn assert_triad_orthonormal(ms: &Microstructure) {
        for p in 0..ms.n_points() {
            let f0 = DVec3::from_slice(&ms.f0[3 * p..3 * p + 3]);
            let s0 = DVec3::from_slice(&ms.s0[3 * p..3 * p + 3]);
            let n0 = DVec3::from_slice(&ms.n0[3 * p..3 * p + 3]);
            assert!((f0.length() - 1.0).abs() < ORTHONORMAL_TOL);
            assert!((s0.length() - 1.0).abs() < ORTHONORMAL_TOL);
            assert!((n0.length() - 1.0).abs() < ORTHONORMAL_TOL);
            assert!(f0.dot(s0).abs() < ORTHONORMAL_TOL);
            assert!(f0.dot(n0).abs() < ORTHONORMAL_TOL);
            assert!(s0.dot(n0).abs() < ORTHONORMAL_TOL);
        }
    }

    #[test]
    fn test_slab_microstructure() {
        let raw = StructuredMeshGenerator
            .slab(&SlabParams {
                lx: 2.0,
                ly: 1.0,
                lz: 1.0,
                dx: 0.5,
            })
            .unwrap();
        let geo = MeshConverter::convert(&raw).unwrap();
        let ms = create_slab_microstructure(
            &geo,
            &AngleParams::default(),
            FiberSpace::P1,
            &ConjugateGradient::default(),
        )
        .unwrap();

        assert_eq!(ms.n_points(), geo.mesh.n_nodes());
        assert_triad_orthonormal(&ms);
    }

    #[test]
    fn test_lv_microstructure() {
        let params = LvEllipsoidParams::default();
        let raw = StructuredMeshGenerator.lv_ellipsoid(&params).unwrap();
        let geo = MeshConverter::convert(&raw).unwrap();
        let ms = create_lv_microstructure(
            &geo,
            ProlateRadii {
                r_short_endo: params.r_short_endo,
                r_short_epi: params.r_short_epi,
                r_long_endo: params.r_long_endo,
                r_long_epi: params.r_long_epi,
            },
            &AngleParams::default(),
            FiberSpace::P1,
            &ConjugateGradient::default(),
        )
        .unwrap();

        assert_triad_orthonormal(&ms);
    }

    #[test]
    fn test_biv_microstructure() {
        let raw = StructuredMeshGenerator
            .biv_ellipsoid(&BivEllipsoidParams::default())
            .unwrap();
        let geo = MeshConverter::convert(&raw).unwrap();
        let ms = create_biv_microstructure(
            &geo,
            &AngleParams::default(),
            FiberSpace::P1,
            &ConjugateGradient::default(),
        )
        .unwrap();

        assert_triad_orthonormal(&ms);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let raw = StructuredMeshGenerator
            .slab(&SlabParams {
                lx: 2.0,
                ly: 1.0,
                lz: 1.0,
                dx: 1.0,
            })
            .unwrap();
        let geo = MeshConverter::convert(&raw).unwrap();
        let ms = create_slab_microstructure(
            &geo,
            &AngleParams::default(),
            FiberSpace::P1,
            &ConjugateGradient::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("microstructure.cgf");
        ms.save(&path).unwrap();
        let loaded = Microstructure::load(&path).unwrap();
        assert_eq!(ms, loaded);
    }

    #[test]
    fn test_missing_marker_is_config_error() {
        let raw = StructuredMeshGenerator
            .slab(&SlabParams {
                lx: 1.0,
                ly: 1.0,
                lz: 1.0,
                dx: 1.0,
            })
            .unwrap();
        let geo = MeshConverter::convert(&raw).unwrap();
        // slab 几何上用 LV 驱动：缺 ENDO 标记
        let err = create_lv_microstructure(
            &geo,
            ProlateRadii {
                r_short_endo: 7.0,
                r_short_epi: 10.0,
                r_long_endo: 17.0,
                r_long_epi: 20.0,
            },
            &AngleParams::default(),
            FiberSpace::P1,
            &ConjugateGradient::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CgError::Config { .. }));
    }

    #[test]
    fn test_p2_microstructure_has_edge_dofs() {
        let raw = StructuredMeshGenerator
            .slab(&SlabParams {
                lx: 1.0,
                ly: 1.0,
                lz: 1.0,
                dx: 1.0,
            })
            .unwrap();
        let geo = MeshConverter::convert(&raw).unwrap();
        let ms = create_slab_microstructure(
            &geo,
            &AngleParams::default(),
            FiberSpace::P2,
            &ConjugateGradient::default(),
        )
        .unwrap();
        assert_eq!(ms.n_points(), geo.mesh.n_nodes() + geo.mesh.n_edges());
        assert_triad_orthonormal(&ms);
    }
}
