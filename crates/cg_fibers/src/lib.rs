// crates/cg_fibers/src/lib.rs

//! CardioGeom 纤维层
//!
//! 基于 Laplace–Dirichlet 规则（LDRB）的心肌纤维结构生成：
//!
//! 1. [`transmural`]: 解调和边值问题得到跨壁标量场 t（内膜 0，外膜 1）
//! 2. [`angle`]: 螺旋角在 t 上线性插值（度数进出，内部弧度）
//! 3. [`basis`]: 局部解剖基（slab 固定笛卡尔基 / LV 解析长椭球基 /
//!    BiV 梯度基）
//! 4. [`frame`]: 逐自由度正交归一三元组 (fiber, sheet, sheet-normal)
//!    的构建与跨分区同步
//! 5. [`microstructure`]: 三元组聚合与持久化
//!
//! 三元组在每个自由度上单位长度、两两正交，分区边界上的共享自由度
//! 在同步后各副本一致。

pub mod angle;
pub mod basis;
pub mod frame;
pub mod microstructure;
pub mod transmural;

pub use angle::AngleParams;
pub use basis::FiberBasis;
pub use frame::LocalFrameBuilder;
pub use microstructure::{
    create_biv_microstructure, create_lv_microstructure, create_slab_microstructure,
    Microstructure,
};
pub use transmural::TransmuralField;
