// crates/cg_solver/src/laplace.rs

//! Laplace–Dirichlet 边值问题
//!
//! 在体网格上定义标量未知量 t：内膜面片上 t=0，外膜面片上 t=1，
//! 其余边界零通量。P1 刚度阵按四面体重心坐标梯度组装，Dirichlet
//! 条件对称消元后把线性系统交给 [`EllipticSolver`] 后端。
//!
//! 解满足最大值原理：0 ≤ t ≤ 1 由调和问题本身保证，不做截断。
//!
//! 边界标签匹配不到任何面片时问题不适定，在组装前报
//! [`CgError::Solver`]；不收敛同样致命，不重试。

use crate::cg::EllipticSolver;
use crate::csr::{CsrBuilder, CsrMatrix};
use cg_foundation::tolerance::DEGENERATE_VOLUME_TOL;
use cg_foundation::{CgError, CgResult};
use cg_mesh::markers::MarkerFunction;
use cg_mesh::mesh::DomainMesh;
use glam::DMat3;
use std::collections::HashSet;
use tracing::debug;

/// Laplace–Dirichlet 问题
#[derive(Debug)]
pub struct LaplaceProblem<'a> {
    mesh: &'a DomainMesh,
    ffun: &'a MarkerFunction,
}

impl<'a> LaplaceProblem<'a> {
    /// 创建问题
    pub fn new(mesh: &'a DomainMesh, ffun: &'a MarkerFunction) -> CgResult<Self> {
        if ffun.dim() != 2 {
            return Err(CgError::dimension_mismatch(format!(
                "facet marker function has dimension {}, expected 2",
                ffun.dim()
            )));
        }
        CgError::check_size("facet markers", mesh.n_facets(), ffun.len())?;
        Ok(Self { mesh, ffun })
    }

    /// 求解跨壁标量场
    ///
    /// `endo_tags` 上 t=0，`epi_tags` 上 t=1。返回逐节点的 t。
    pub fn solve(
        &self,
        endo_tags: &[u32],
        epi_tags: &[u32],
        solver: &dyn EllipticSolver,
    ) -> CgResult<Vec<f64>> {
        let endo_nodes = self.boundary_nodes(endo_tags)?;
        let epi_nodes = self.boundary_nodes(epi_tags)?;

        let n = self.mesh.n_nodes();
        let mut is_bc = vec![false; n];
        let mut bc_value = vec![0.0; n];
        // 施加顺序固定：endo 先，epi 后（重叠节点取 epi 值）
        for &node in &endo_nodes {
            is_bc[node as usize] = true;
            bc_value[node as usize] = 0.0;
        }
        for &node in &epi_nodes {
            is_bc[node as usize] = true;
            bc_value[node as usize] = 1.0;
        }

        let mut a = self.assemble()?;

        // 对称 Dirichlet 消元：先把已知值搬到右端项，再清行清列
        let mut b = vec![0.0; n];
        for i in 0..n {
            if is_bc[i] {
                continue;
            }
            for (j, v) in a.row(i) {
                if is_bc[j] {
                    b[i] -= v * bc_value[j];
                }
            }
        }
        a.zero_rows_and_columns(&is_bc);
        for i in 0..n {
            if is_bc[i] {
                b[i] = bc_value[i];
            }
        }

        let mut t = bc_value;
        let result = solver.solve(&a, &b, &mut t)?;
        debug!(
            backend = solver.name(),
            iterations = result.iterations,
            residual = result.residual_norm,
            "transmural solve finished"
        );
        Ok(t)
    }

    /// 带指定标签的面片上的全部节点
    ///
    /// 标签匹配不到任何面片 ⇒ 不适定边界条件。
    fn boundary_nodes(&self, tags: &[u32]) -> CgResult<HashSet<u32>> {
        let mut nodes = HashSet::new();
        for &tag in tags {
            let mut matched = 0usize;
            for f in self.ffun.entities_with_tag(tag) {
                matched += 1;
                for &node in &self.mesh.facets()[f] {
                    nodes.insert(node);
                }
            }
            if matched == 0 {
                return Err(CgError::solver(format!(
                    "boundary marker {} matches zero facets, Dirichlet problem is ill-posed",
                    tag
                )));
            }
        }
        Ok(nodes)
    }

    /// P1 刚度阵组装
    fn assemble(&self) -> CgResult<CsrMatrix> {
        let n = self.mesh.n_nodes();
        let mut builder = CsrBuilder::new(n, n);

        for (c, tet) in self.mesh.tets().iter().enumerate() {
            let p0 = self.mesh.node(tet[0] as usize);
            let p1 = self.mesh.node(tet[1] as usize);
            let p2 = self.mesh.node(tet[2] as usize);
            let p3 = self.mesh.node(tet[3] as usize);

            let jac = DMat3::from_cols(p1 - p0, p2 - p0, p3 - p0);
            let det = jac.determinant();
            let volume = det.abs() / 6.0;
            if volume < DEGENERATE_VOLUME_TOL {
                return Err(CgError::solver(format!(
                    "degenerate tetrahedron {} (volume {:.3e})",
                    c, volume
                )));
            }

            // 重心坐标梯度：∇λ_{1..3} 是 J^{-1} 的行，∇λ_0 是其负和
            let inv = jac.inverse();
            let g1 = inv.row(0);
            let g2 = inv.row(1);
            let g3 = inv.row(2);
            let g0 = -(g1 + g2 + g3);
            let grads = [g0, g1, g2, g3];

            for (i, gi) in grads.iter().enumerate() {
                for (j, gj) in grads.iter().enumerate() {
                    builder.add(
                        tet[i] as usize,
                        tet[j] as usize,
                        volume * gi.dot(*gj),
                    );
                }
            }
        }
        builder.build()
    }
}

/// 把 P1 节点解插值到 P2 自由度（节点 + 边中点）
///
/// 节点值照抄，边中点取两端平均；输出顺序与标量 P2 空间的实体序
/// 一致（节点在前，边在后）。
pub fn interpolate_p1_to_p2(mesh: &DomainMesh, t_nodes: &[f64]) -> CgResult<Vec<f64>> {
    CgError::check_size("p1 solution", mesh.n_nodes(), t_nodes.len())?;
    let mut out = Vec::with_capacity(mesh.n_nodes() + mesh.n_edges());
    out.extend_from_slice(t_nodes);
    for edge in mesh.edges() {
        out.push(0.5 * (t_nodes[edge[0] as usize] + t_nodes[edge[1] as usize]));
    }
    Ok(out)
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cg::ConjugateGradient;
    use cg_mesh::converter::MeshConverter;
    use cg_mesh::generation::{slab_tags, MeshGenerator, SlabParams, StructuredMeshGenerator};

    fn slab_geometry(dx: f64) -> cg_mesh::converter::ConvertedGeometry {
        let raw = StructuredMeshGenerator
            .slab(&SlabParams {
                lx: 4.0,
                ly: 2.0,
                lz: 2.0,
                dx,
            })
            .unwrap();
        MeshConverter::convert(&raw).unwrap()
    }

    #[test]
    fn test_slab_transmural_is_linear_in_y() {
        let geo = slab_geometry(1.0);
        let problem = LaplaceProblem::new(&geo.mesh, &geo.ffun).unwrap();
        let t = problem
            .solve(
                &[slab_tags::Y0],
                &[slab_tags::Y1],
                &ConjugateGradient::default(),
            )
            .unwrap();

        // 精确解 t = y / ly；P1 在节点处精确再现线性解
        let ly = 2.0;
        for (i, &ti) in t.iter().enumerate() {
            let expected = geo.mesh.node(i).y / ly;
            assert!(
                (ti - expected).abs() < 1e-8,
                "node {}: t = {}, expected {}",
                i,
                ti,
                expected
            );
        }
    }

    #[test]
    fn test_transmural_bounded_by_maximum_principle() {
        let geo = slab_geometry(0.5);
        let problem = LaplaceProblem::new(&geo.mesh, &geo.ffun).unwrap();
        let t = problem
            .solve(
                &[slab_tags::Y0],
                &[slab_tags::Y1],
                &ConjugateGradient::default(),
            )
            .unwrap();

        for &ti in &t {
            assert!((-1e-9..=1.0 + 1e-9).contains(&ti), "t = {} out of range", ti);
        }
    }

    #[test]
    fn test_endo_zero_epi_one() {
        let geo = slab_geometry(1.0);
        let problem = LaplaceProblem::new(&geo.mesh, &geo.ffun).unwrap();
        let t = problem
            .solve(
                &[slab_tags::Y0],
                &[slab_tags::Y1],
                &ConjugateGradient::default(),
            )
            .unwrap();

        for f in geo.ffun.entities_with_tag(slab_tags::Y0) {
            for &n in &geo.mesh.facets()[f] {
                assert!(t[n as usize].abs() < 1e-12);
            }
        }
        for f in geo.ffun.entities_with_tag(slab_tags::Y1) {
            for &n in &geo.mesh.facets()[f] {
                assert!((t[n as usize] - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_unmatched_marker_is_ill_posed() {
        let geo = slab_geometry(1.0);
        let problem = LaplaceProblem::new(&geo.mesh, &geo.ffun).unwrap();
        let err = problem
            .solve(&[99], &[slab_tags::Y1], &ConjugateGradient::default())
            .unwrap_err();
        assert!(matches!(err, CgError::Solver { .. }));
    }

    #[test]
    fn test_wrong_marker_dimension_rejected() {
        let geo = slab_geometry(1.0);
        let err = LaplaceProblem::new(&geo.mesh, &geo.cfun).unwrap_err();
        assert!(matches!(err, CgError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_p1_to_p2_interpolation() {
        let geo = slab_geometry(1.0);
        let problem = LaplaceProblem::new(&geo.mesh, &geo.ffun).unwrap();
        let t = problem
            .solve(
                &[slab_tags::Y0],
                &[slab_tags::Y1],
                &ConjugateGradient::default(),
            )
            .unwrap();

        let t2 = interpolate_p1_to_p2(&geo.mesh, &t).unwrap();
        assert_eq!(t2.len(), geo.mesh.n_nodes() + geo.mesh.n_edges());

        // 线性解在边中点也精确：t(mid) = mid.y / ly
        for (e, edge) in geo.mesh.edges().iter().enumerate() {
            let expected =
                0.5 * (geo.mesh.node(edge[0] as usize).y + geo.mesh.node(edge[1] as usize).y)
                    / 2.0;
            assert!((t2[geo.mesh.n_nodes() + e] - expected).abs() < 1e-8);
        }
    }
}
