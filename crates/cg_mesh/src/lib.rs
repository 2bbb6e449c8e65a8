// crates/cg_mesh/src/lib.rs

//! CardioGeom 网格模块
//!
//! 提供体网格数据结构、解剖区域标记、网格转换管线和内置网格生成器。
//!
//! # 核心类型
//!
//! - [`RawTaggedMesh`]: 生成器输出的带标签原始网格（按拓扑维度分块）
//! - [`DomainMesh`]: 只读的 SoA 布局四面体网格，带各维度实体表
//! - [`MarkerFunction`] / [`MarkerSet`]: 区域标记
//! - [`MeshConverter`]: 原始网格 → 体网格 + 四个标记函数
//!
//! # 模块结构
//!
//! - [`mesh`]: 体网格与实体拓扑
//! - [`markers`]: 标记函数与哨兵策略
//! - [`converter`]: 转换管线
//! - [`generation`]: 内置结构化网格生成器（slab / LV / BiV）
//! - [`io`]: 原始网格文本格式与二进制持久化格式
//!
//! # 示例
//!
//! ```
//! use cg_mesh::generation::{MeshGenerator, SlabParams, StructuredMeshGenerator};
//! use cg_mesh::converter::MeshConverter;
//!
//! let generator = StructuredMeshGenerator;
//! let raw = generator.slab(&SlabParams::default()).unwrap();
//! let converted = MeshConverter::convert(&raw).unwrap();
//! assert!(converted.mesh.n_cells() > 0);
//! ```

pub mod converter;
pub mod generation;
pub mod io;
pub mod markers;
pub mod mesh;

pub use converter::{ConvertedGeometry, MeshConverter};
pub use markers::{MarkerFunction, MarkerSet, UNMARKED, UNSET_TAG};
pub use mesh::{CellBlock, DomainMesh, RawTaggedMesh};
