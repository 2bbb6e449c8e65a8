// crates/cg_solver/src/cg.rs

//! 椭圆求解后端
//!
//! [`EllipticSolver`] 是管线消费的外部协作者接口：`solve(A, b) → x`。
//! [`ConjugateGradient`] 是内置后端：Jacobi 缩放的共轭梯度法，
//! 适用于对称正定系统（Laplace 刚度阵 + 对称 Dirichlet 消元）。
//!
//! 不收敛是致命错误：对不收敛的线性系统按原样重解没有意义，
//! 调用方不得重试。

use crate::csr::CsrMatrix;
use cg_foundation::{CgError, CgResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// 配置与结果
// ============================================================================

/// 求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 相对收敛容差
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-12,
            atol: 1e-14,
            max_iter: 5000,
        }
    }
}

impl SolverConfig {
    /// 创建求解器配置
    pub fn new(rtol: f64, max_iter: usize) -> Self {
        Self {
            rtol,
            max_iter,
            ..Default::default()
        }
    }
}

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散（残差出现非有限值）
    Diverged,
}

/// 求解器结果
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// 求解状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: f64,
    /// 初始残差范数
    pub initial_residual_norm: f64,
}

impl SolverResult {
    /// 是否成功收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

// ============================================================================
// 后端接口
// ============================================================================

/// 椭圆求解后端接口
///
/// 输入组装好的系统 `A x = b`，`x` 兼作初值与输出。
pub trait EllipticSolver: Send + Sync {
    /// 后端名称
    fn name(&self) -> &'static str;

    /// 求解；不收敛时返回 [`CgError::Solver`]
    fn solve(&self, a: &CsrMatrix, b: &[f64], x: &mut [f64]) -> CgResult<SolverResult>;
}

// ============================================================================
// 共轭梯度
// ============================================================================

/// Jacobi 缩放共轭梯度求解器
pub struct ConjugateGradient {
    config: SolverConfig,
}

impl ConjugateGradient {
    /// 创建求解器
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl EllipticSolver for ConjugateGradient {
    fn name(&self) -> &'static str {
        "cg-jacobi"
    }

    fn solve(&self, a: &CsrMatrix, b: &[f64], x: &mut [f64]) -> CgResult<SolverResult> {
        let n = a.n_rows();
        CgError::check_size("rhs", n, b.len())?;
        CgError::check_size("solution", n, x.len())?;

        // Jacobi 预条件：M^{-1} = diag(A)^{-1}
        let mut inv_diag = vec![0.0; n];
        for i in 0..n {
            let d = a.diagonal(i);
            if d == 0.0 {
                return Err(CgError::solver(format!(
                    "matrix has zero diagonal at row {}",
                    i
                )));
            }
            inv_diag[i] = 1.0 / d;
        }

        let dot = |u: &[f64], v: &[f64]| -> f64 { u.iter().zip(v).map(|(a, b)| a * b).sum() };

        // r = b - A x
        let mut r = vec![0.0; n];
        a.spmv(x, &mut r);
        for i in 0..n {
            r[i] = b[i] - r[i];
        }

        let initial_norm = dot(&r, &r).sqrt();
        if initial_norm <= self.config.atol {
            return Ok(SolverResult {
                status: SolverStatus::Converged,
                iterations: 0,
                residual_norm: initial_norm,
                initial_residual_norm: initial_norm,
            });
        }
        let target = (self.config.rtol * initial_norm).max(self.config.atol);

        let mut z: Vec<f64> = r.iter().zip(&inv_diag).map(|(ri, di)| ri * di).collect();
        let mut p = z.clone();
        let mut rz = dot(&r, &z);
        let mut ap = vec![0.0; n];

        for iter in 1..=self.config.max_iter {
            a.spmv(&p, &mut ap);
            let pap = dot(&p, &ap);
            if pap <= 0.0 || !pap.is_finite() {
                return Err(CgError::solver(format!(
                    "conjugate gradient breakdown at iteration {} (pAp = {})",
                    iter, pap
                )));
            }
            let alpha = rz / pap;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }

            let res_norm = dot(&r, &r).sqrt();
            if !res_norm.is_finite() {
                return Err(CgError::solver(format!(
                    "residual diverged at iteration {}",
                    iter
                )));
            }
            if res_norm <= target {
                debug!(iterations = iter, residual = res_norm, "cg converged");
                return Ok(SolverResult {
                    status: SolverStatus::Converged,
                    iterations: iter,
                    residual_norm: res_norm,
                    initial_residual_norm: initial_norm,
                });
            }

            for i in 0..n {
                z[i] = r[i] * inv_diag[i];
            }
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        Err(CgError::solver(format!(
            "conjugate gradient did not converge in {} iterations (residual {:.3e}, target {:.3e})",
            self.config.max_iter,
            dot(&r, &r).sqrt(),
            target
        )))
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::CsrBuilder;

    /// 一维 Laplace 刚度阵 (n 个内部点)
    fn laplace_1d(n: usize) -> CsrMatrix {
        let mut b = CsrBuilder::new(n, n);
        for i in 0..n {
            b.add(i, i, 2.0);
            if i > 0 {
                b.add(i, i - 1, -1.0);
            }
            if i + 1 < n {
                b.add(i, i + 1, -1.0);
            }
        }
        b.build().unwrap()
    }

    #[test]
    fn test_solve_identity_rhs() {
        let a = laplace_1d(10);
        let b = vec![1.0; 10];
        let mut x = vec![0.0; 10];

        let solver = ConjugateGradient::default();
        let result = solver.solve(&a, &b, &mut x).unwrap();
        assert!(result.is_converged());

        // 验证 Ax = b
        let mut ax = vec![0.0; 10];
        a.spmv(&x, &mut ax);
        for (axi, bi) in ax.iter().zip(&b) {
            assert!((axi - bi).abs() < 1e-8);
        }
    }

    #[test]
    fn test_zero_rhs_converges_immediately() {
        let a = laplace_1d(5);
        let b = vec![0.0; 5];
        let mut x = vec![0.0; 5];
        let result = ConjugateGradient::default().solve(&a, &b, &mut x).unwrap();
        assert_eq!(result.iterations, 0);
        assert!(result.is_converged());
    }

    #[test]
    fn test_max_iterations_is_fatal() {
        let a = laplace_1d(50);
        let b = vec![1.0; 50];
        let mut x = vec![0.0; 50];

        let solver = ConjugateGradient::new(SolverConfig {
            rtol: 1e-14,
            atol: 0.0,
            max_iter: 2,
        });
        let err = solver.solve(&a, &b, &mut x).unwrap_err();
        assert!(matches!(err, CgError::Solver { .. }));
    }

    #[test]
    fn test_zero_diagonal_rejected() {
        let mut builder = CsrBuilder::new(2, 2);
        builder.add(0, 1, 1.0);
        builder.add(1, 0, 1.0);
        let a = builder.build().unwrap();
        let mut x = vec![0.0; 2];
        let err = ConjugateGradient::default()
            .solve(&a, &[1.0, 1.0], &mut x)
            .unwrap_err();
        assert!(matches!(err, CgError::Solver { .. }));
    }

    #[test]
    fn test_size_mismatch() {
        let a = laplace_1d(3);
        let mut x = vec![0.0; 3];
        assert!(ConjugateGradient::default()
            .solve(&a, &[1.0], &mut x)
            .is_err());
    }
}
