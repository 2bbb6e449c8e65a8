// crates/cg_fibers/src/basis.rs

//! 局部解剖基
//!
//! 螺旋角规则在每个自由度处的 (周向 e_c, 纵向 e_l, 径向 e_r) 基：
//!
//! - [`FiberBasis::Slab`]: 固定笛卡尔基 (x̂, ẑ, ŷ)，跨壁方向为 y
//! - [`FiberBasis::Prolate`]: LV 椭球的解析基，径向取经过该点的
//!   插值椭球面外法线
//! - [`FiberBasis::Gradient`]: 跨壁方向取 ∇t（每四面体常值梯度
//!   体积加权平均到自由度），用于无解析参数化的几何（BiV）
//!
//! 三种基都满足两两正交、单位长度；e_l = e_c × e_r。

use cg_foundation::tolerance::NORMALIZE_EPS;
use cg_foundation::{CgError, CgResult};
use cg_solver::space::FiberSpace;
use cg_mesh::mesh::DomainMesh;
use glam::{DMat3, DVec3};

/// 长轴方向（slab 的纤维平面与椭球几何的长轴都沿 x）
const LONG_AXIS: DVec3 = DVec3::X;

/// LV 解析基的椭球半径参数
#[derive(Debug, Clone, Copy)]
pub struct ProlateRadii {
    /// 内膜短半径
    pub r_short_endo: f64,
    /// 外膜短半径
    pub r_short_epi: f64,
    /// 内膜长半径
    pub r_long_endo: f64,
    /// 外膜长半径
    pub r_long_epi: f64,
}

/// 局部解剖基
pub enum FiberBasis {
    /// slab：固定笛卡尔基
    Slab,
    /// LV 椭球：解析长椭球基
    Prolate(ProlateRadii),
    /// 梯度基：逐全局自由度的跨壁方向
    Gradient(Vec<DVec3>),
}

impl FiberBasis {
    /// 由跨壁场构造梯度基
    ///
    /// 每个四面体上 P1 解的梯度为常值，体积加权平均到节点；
    /// P2 的边自由度取两端节点平均。
    pub fn gradient_from_field(
        mesh: &DomainMesh,
        t_nodes: &[f64],
        element: FiberSpace,
    ) -> CgResult<Self> {
        CgError::check_size("transmural nodes", mesh.n_nodes(), t_nodes.len())?;

        let mut acc = vec![DVec3::ZERO; mesh.n_nodes()];
        let mut weight = vec![0.0f64; mesh.n_nodes()];

        for tet in mesh.tets() {
            let p0 = mesh.node(tet[0] as usize);
            let p1 = mesh.node(tet[1] as usize);
            let p2 = mesh.node(tet[2] as usize);
            let p3 = mesh.node(tet[3] as usize);

            let jac = DMat3::from_cols(p1 - p0, p2 - p0, p3 - p0);
            let volume = jac.determinant().abs() / 6.0;
            let inv = jac.inverse();
            let g1 = inv.row(0);
            let g2 = inv.row(1);
            let g3 = inv.row(2);
            let g0 = -(g1 + g2 + g3);

            let grad = g0 * t_nodes[tet[0] as usize]
                + g1 * t_nodes[tet[1] as usize]
                + g2 * t_nodes[tet[2] as usize]
                + g3 * t_nodes[tet[3] as usize];

            for &n in tet {
                acc[n as usize] += grad * volume;
                weight[n as usize] += volume;
            }
        }

        let mut dirs: Vec<DVec3> = acc
            .iter()
            .zip(&weight)
            .map(|(g, &w)| if w > 0.0 { *g / w } else { DVec3::ZERO })
            .collect();

        if element == FiberSpace::P2 {
            for edge in mesh.edges() {
                let d = (dirs[edge[0] as usize] + dirs[edge[1] as usize]) * 0.5;
                dirs.push(d);
            }
        }

        Ok(Self::Gradient(dirs))
    }

    /// 自由度处的局部基 (e_c, e_l, e_r)
    ///
    /// `global_dof` 是该点自由度的全局编号，`point` 是其坐标，
    /// `t` 是跨壁值。
    pub fn local_frame(&self, global_dof: u64, point: DVec3, t: f64) -> (DVec3, DVec3, DVec3) {
        match self {
            Self::Slab => (DVec3::X, DVec3::Z, DVec3::Y),
            Self::Prolate(radii) => {
                // 经过该点的插值椭球面外法线
                let a = radii.r_long_endo + t * (radii.r_long_epi - radii.r_long_endo);
                let b = radii.r_short_endo + t * (radii.r_short_epi - radii.r_short_endo);
                let normal = DVec3::new(
                    point.x / (a * a),
                    point.y / (b * b),
                    point.z / (b * b),
                );
                orthonormal_frame(normal)
            }
            Self::Gradient(dirs) => orthonormal_frame(dirs[global_dof as usize]),
        }
    }
}

/// 由径向方向补全正交基
///
/// e_r = normalize(radial)，e_c = normalize(长轴 × e_r)，e_l = e_c × e_r。
/// 径向与长轴近平行（心尖）时退回以 ŷ 为辅助轴。
fn orthonormal_frame(radial: DVec3) -> (DVec3, DVec3, DVec3) {
    let e_r = if radial.length_squared() > NORMALIZE_EPS {
        radial.normalize()
    } else {
        DVec3::Y
    };
    let mut e_c = LONG_AXIS.cross(e_r);
    if e_c.length_squared() < 1e-12 {
        e_c = DVec3::Y.cross(e_r);
    }
    let e_c = e_c.normalize();
    let e_l = e_c.cross(e_r);
    (e_c, e_l, e_r)
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cg_foundation::tolerance::ORTHONORMAL_TOL;

    fn assert_orthonormal(e_c: DVec3, e_l: DVec3, e_r: DVec3) {
        for v in [e_c, e_l, e_r] {
            assert!((v.length() - 1.0).abs() < ORTHONORMAL_TOL);
        }
        assert!(e_c.dot(e_l).abs() < ORTHONORMAL_TOL);
        assert!(e_c.dot(e_r).abs() < ORTHONORMAL_TOL);
        assert!(e_l.dot(e_r).abs() < ORTHONORMAL_TOL);
    }

    #[test]
    fn test_slab_basis_fixed() {
        let basis = FiberBasis::Slab;
        let (e_c, e_l, e_r) = basis.local_frame(0, DVec3::new(1.0, 2.0, 3.0), 0.5);
        assert_eq!(e_c, DVec3::X);
        assert_eq!(e_l, DVec3::Z);
        assert_eq!(e_r, DVec3::Y);
        assert_orthonormal(e_c, e_l, e_r);
    }

    #[test]
    fn test_prolate_basis_orthonormal_on_equator() {
        let basis = FiberBasis::Prolate(ProlateRadii {
            r_short_endo: 7.0,
            r_short_epi: 10.0,
            r_long_endo: 17.0,
            r_long_epi: 20.0,
        });
        // 赤道上的内膜点 (0, 7, 0)
        let (e_c, e_l, e_r) = basis.local_frame(0, DVec3::new(0.0, 7.0, 0.0), 0.0);
        assert_orthonormal(e_c, e_l, e_r);
        // 径向指向 +y
        assert!((e_r - DVec3::Y).length() < 1e-12);
        // 周向与长轴垂直
        assert!(e_c.dot(DVec3::X).abs() < 1e-12);
    }

    #[test]
    fn test_prolate_basis_apex_fallback() {
        let basis = FiberBasis::Prolate(ProlateRadii {
            r_short_endo: 7.0,
            r_short_epi: 10.0,
            r_long_endo: 17.0,
            r_long_epi: 20.0,
        });
        // 心尖附近，法线几乎平行长轴
        let (e_c, e_l, e_r) = basis.local_frame(0, DVec3::new(-17.0, 1e-9, 0.0), 0.0);
        assert_orthonormal(e_c, e_l, e_r);
    }

    #[test]
    fn test_gradient_basis_linear_field() {
        use cg_mesh::converter::MeshConverter;
        use cg_mesh::generation::{MeshGenerator, SlabParams, StructuredMeshGenerator};

        let raw = StructuredMeshGenerator
            .slab(&SlabParams {
                lx: 2.0,
                ly: 1.0,
                lz: 1.0,
                dx: 0.5,
            })
            .unwrap();
        let geo = MeshConverter::convert(&raw).unwrap();

        // t = y：梯度处处 ŷ
        let t: Vec<f64> = geo.mesh.node_coords().iter().map(|p| p.y).collect();
        let basis =
            FiberBasis::gradient_from_field(&geo.mesh, &t, FiberSpace::P1).unwrap();

        for g in 0..geo.mesh.n_nodes() as u64 {
            let (e_c, e_l, e_r) = basis.local_frame(g, DVec3::ZERO, 0.5);
            assert_orthonormal(e_c, e_l, e_r);
            assert!((e_r - DVec3::Y).length() < 1e-9, "e_r = {:?}", e_r);
        }
    }

    #[test]
    fn test_gradient_basis_p2_edge_dofs() {
        use cg_mesh::converter::MeshConverter;
        use cg_mesh::generation::{MeshGenerator, SlabParams, StructuredMeshGenerator};

        let raw = StructuredMeshGenerator
            .slab(&SlabParams {
                lx: 1.0,
                ly: 1.0,
                lz: 1.0,
                dx: 1.0,
            })
            .unwrap();
        let geo = MeshConverter::convert(&raw).unwrap();
        let t: Vec<f64> = geo.mesh.node_coords().iter().map(|p| p.y).collect();

        let basis =
            FiberBasis::gradient_from_field(&geo.mesh, &t, FiberSpace::P2).unwrap();
        let FiberBasis::Gradient(dirs) = &basis else {
            panic!("expected gradient basis");
        };
        assert_eq!(dirs.len(), geo.mesh.n_nodes() + geo.mesh.n_edges());
    }
}
