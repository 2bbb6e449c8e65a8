// crates/cg_mesh/src/io/mod.rs

//! 网格 IO
//!
//! - [`msh`]: 带标签原始网格的文本格式（生成器输出 / 块文件往返）
//! - [`cgm`]: 持久化二进制格式（体网格 + 标记函数）
//! - [`crc32`]: 校验和工具，供二进制格式使用

pub mod cgm;
pub mod crc32;
pub mod msh;

pub use cgm::{read_mesh, write_mesh};
pub use msh::{MshReader, MshWriter};
