// crates/cg_solver/src/lib.rs

//! CardioGeom 求解层
//!
//! 提供纤维生成引擎依赖的数值基础设施：
//!
//! - [`space`]: 闭合元素族枚举、函数空间与自由度布局
//!   （显式 owned/ghost 索引集，全局↔局部查询）
//! - [`partition`]: 网格分区（SPMD 子域 + 幽灵实体）
//! - [`csr`]: CSR 稀疏矩阵
//! - [`cg`]: 共轭梯度椭圆求解后端（[`EllipticSolver`] 接口的内置实现）
//! - [`laplace`]: Laplace–Dirichlet 边值问题的组装与求解委托
//! - [`world`]: SPMD 通信子（阻塞集合操作，失败毒化全域）
//! - [`vector`]: 分布式向量与 "insert" 同步
//!
//! 椭圆求解本身是外部协作者：管线只依赖 [`EllipticSolver`]，
//! 内置 CG 是其中一个后端。

pub mod cg;
pub mod csr;
pub mod laplace;
pub mod partition;
pub mod space;
pub mod vector;
pub mod world;

pub use cg::{ConjugateGradient, EllipticSolver, SolverConfig, SolverResult, SolverStatus};
pub use csr::{CsrBuilder, CsrMatrix};
pub use laplace::LaplaceProblem;
pub use partition::MeshPartition;
pub use space::{DofLayout, FiberSpace, FunctionSpace};
pub use vector::DistributedVector;
pub use world::{Communicator, LocalWorld, SerialComm};
