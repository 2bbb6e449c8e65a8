// crates/cg_geometry/src/lib.rs

//! CardioGeom 几何层
//!
//! 顶层编排：能力解析 → 网格生成 → 转换 → 纤维 → 持久化目录。
//!
//! - [`capability`]: 可选后端（网格生成器 / 椭圆求解器）在启动时
//!   解析一次并注入工厂；"后端未安装"产生缺席结果而非深层失败
//! - [`info`]: 生成参数 + 几何类型判别 + 版本 + 时间戳 (info.json)
//! - [`geometry`]: Geometry 聚合与目录持久化/重载
//! - [`factory`]: create_slab / create_lv_ellipsoid / create_biv_ellipsoid

pub mod capability;
pub mod factory;
pub mod geometry;
pub mod info;

pub use capability::Backends;
pub use factory::{FiberOptions, GeometryFactory};
pub use geometry::Geometry;
pub use info::{GeometryInfo, GeometryParams};
