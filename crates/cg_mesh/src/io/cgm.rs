// crates/cg_mesh/src/io/cgm.rs

//! 持久化二进制网格格式 (CGM)
//!
//! 体网格 + 标记集 + 四个标记函数的自描述单文件格式，
//! 契约是一次写入、读回相等。
//!
//! # 文件格式 (v1)
//!
//! ```text
//! [魔数: 4 bytes] "CGM1"
//! [版本: u32]
//! [节点数: u64]
//! [坐标: n_nodes * 3 * f64]
//! [四面体数: u64]
//! [四面体: n_tets * 4 * u32]
//! [标记函数 x4 (维度 0..3)]: [长度: u64][值: len * u32]
//! [标记集 JSON: u64 长度 + bytes]
//! [CRC32: u32]
//! ```
//!
//! 全部小端。实体编号由四面体列表确定性导出，因此标记函数数组
//! 在读回后与重建的实体表对齐。写入通过临时文件 + 原子重命名。

use crate::converter::ConvertedGeometry;
use crate::markers::{MarkerFunction, MarkerSet};
use crate::mesh::DomainMesh;
use cg_foundation::{CgError, CgResult};
use glam::DVec3;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use super::crc32;

/// CGM 文件魔数
pub const CGM_MAGIC: &[u8; 4] = b"CGM1";

/// CGM 格式版本
pub const CGM_VERSION: u32 = 1;

// ============================================================================
// 写入
// ============================================================================

/// 写入体网格与标记到文件
pub fn write_mesh(path: &Path, geo: &ConvertedGeometry) -> CgResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CgError::io_with_source("cannot create mesh directory", e))?;
    }

    let mut data = Vec::new();
    data.extend_from_slice(CGM_MAGIC);
    data.extend_from_slice(&CGM_VERSION.to_le_bytes());

    let mesh = &geo.mesh;
    data.extend_from_slice(&(mesh.n_nodes() as u64).to_le_bytes());
    for p in mesh.node_coords() {
        data.extend_from_slice(&p.x.to_le_bytes());
        data.extend_from_slice(&p.y.to_le_bytes());
        data.extend_from_slice(&p.z.to_le_bytes());
    }

    data.extend_from_slice(&(mesh.n_cells() as u64).to_le_bytes());
    for tet in mesh.tets() {
        for &n in tet {
            data.extend_from_slice(&n.to_le_bytes());
        }
    }

    for fun in [&geo.vfun, &geo.efun, &geo.ffun, &geo.cfun] {
        data.extend_from_slice(&(fun.len() as u64).to_le_bytes());
        for &v in fun.values() {
            data.extend_from_slice(&v.to_le_bytes());
        }
    }

    let markers_json = serde_json::to_vec(&geo.markers)
        .map_err(|e| CgError::serialization(e.to_string()))?;
    data.extend_from_slice(&(markers_json.len() as u64).to_le_bytes());
    data.extend_from_slice(&markers_json);

    let crc = crc32::compute(&data);

    // 临时文件写入，成功后原子重命名
    let temp_path = path.with_extension("cgm.tmp");
    {
        let file = File::create(&temp_path)
            .map_err(|e| CgError::io_with_source("cannot create mesh file", e))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&data)?;
        writer.write_all(&crc.to_le_bytes())?;
        writer.flush()?;
    }
    std::fs::rename(&temp_path, path)
        .map_err(|e| CgError::io_with_source("cannot finalize mesh file", e))?;

    Ok(())
}

// ============================================================================
// 读取
// ============================================================================

/// 小端读取游标
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, n: usize) -> CgResult<&'a [u8]> {
        if self.offset + n > self.data.len() {
            return Err(CgError::serialization("mesh file truncated"));
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn u32(&mut self) -> CgResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> CgResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn f64(&mut self) -> CgResult<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

/// 从文件读取体网格与标记
pub fn read_mesh(path: &Path) -> CgResult<ConvertedGeometry> {
    let mut file =
        File::open(path).map_err(|_| CgError::file_not_found(path.to_path_buf()))?;
    let mut all = Vec::new();
    file.read_to_end(&mut all)?;

    if all.len() < CGM_MAGIC.len() + 4 + 4 {
        return Err(CgError::serialization("mesh file too small"));
    }

    // 分离并验证 CRC
    let crc_offset = all.len() - 4;
    let data = &all[..crc_offset];
    let stored = u32::from_le_bytes([all[crc_offset], all[crc_offset + 1], all[crc_offset + 2], all[crc_offset + 3]]);
    let computed = crc32::compute(data);
    if stored != computed {
        return Err(CgError::serialization(format!(
            "mesh file checksum mismatch: stored {:08x}, computed {:08x}",
            stored, computed
        )));
    }

    let mut cur = Cursor::new(data);
    if cur.take(4)? != CGM_MAGIC {
        return Err(CgError::serialization("not a CGM mesh file"));
    }
    let version = cur.u32()?;
    if version != CGM_VERSION {
        return Err(CgError::serialization(format!(
            "unsupported CGM version {}",
            version
        )));
    }

    let n_nodes = cur.u64()? as usize;
    let mut coords = Vec::with_capacity(n_nodes);
    for _ in 0..n_nodes {
        let x = cur.f64()?;
        let y = cur.f64()?;
        let z = cur.f64()?;
        coords.push(DVec3::new(x, y, z));
    }

    let n_tets = cur.u64()? as usize;
    let mut tets = Vec::with_capacity(n_tets);
    for _ in 0..n_tets {
        tets.push([cur.u32()?, cur.u32()?, cur.u32()?, cur.u32()?]);
    }

    let mesh = DomainMesh::from_tets(coords, tets)?;

    let mut funs = Vec::with_capacity(4);
    for dim in 0u8..4 {
        let len = cur.u64()? as usize;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(cur.u32()?);
        }
        CgError::check_size("marker function", mesh.n_entities(dim), values.len())?;
        funs.push(MarkerFunction::from_values(dim, values));
    }

    let json_len = cur.u64()? as usize;
    let markers: MarkerSet = serde_json::from_slice(cur.take(json_len)?)
        .map_err(|e| CgError::serialization(e.to_string()))?;

    let mut it = funs.into_iter();
    Ok(ConvertedGeometry {
        mesh,
        markers,
        vfun: it.next().unwrap(),
        efun: it.next().unwrap(),
        ffun: it.next().unwrap(),
        cfun: it.next().unwrap(),
    })
}

// ============================================================================
// 测试
// ============================================================================
