// crates/cg_mesh/src/io/msh.rs

//! 带标签原始网格的文本格式
//!
//! v2.2 风格的分节 ASCII 格式，支持点/线/三角形/四面体单元，
//! 每个单元携带一个物理区域标签。生成器输出和转换管线的
//! 按维度块文件都使用本格式。
//!
//! # 示例
//!
//! ```ignore
//! use cg_mesh::io::msh::MshReader;
//!
//! let raw = MshReader::load("slab.msh")?;
//! println!("Loaded {} nodes", raw.n_nodes());
//! ```

use crate::mesh::{CellBlock, RawTaggedMesh};
use cg_foundation::{CgError, CgResult};
use glam::DVec3;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// 单元类型编码 → 拓扑维度
fn elem_type_dim(elem_type: usize) -> Option<u8> {
    match elem_type {
        15 => Some(0), // point
        1 => Some(1),  // 2-node line
        2 => Some(2),  // 3-node triangle
        4 => Some(3),  // 4-node tetrahedron
        _ => None,
    }
}

/// 拓扑维度 → 单元类型编码
fn dim_elem_type(dim: u8) -> usize {
    match dim {
        0 => 15,
        1 => 1,
        2 => 2,
        _ => 4,
    }
}

// ============================================================================
// 读取
// ============================================================================

/// 原始网格文件加载器
pub struct MshReader;

impl MshReader {
    /// 加载文件
    pub fn load<P: AsRef<Path>>(path: P) -> CgResult<RawTaggedMesh> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| CgError::io(format!("cannot open {}: {}", path.display(), e)))?;
        Self::load_from_reader(BufReader::new(file))
    }

    /// 从 reader 加载
    pub fn load_from_reader<R: BufRead>(reader: R) -> CgResult<RawTaggedMesh> {
        let mut lines = reader.lines();
        let mut nodes: Vec<DVec3> = Vec::new();
        let mut node_map: HashMap<usize, u32> = HashMap::new();
        let mut blocks: [CellBlock; 4] = [
            CellBlock::empty(0),
            CellBlock::empty(1),
            CellBlock::empty(2),
            CellBlock::empty(3),
        ];
        let mut region_names: Vec<(String, u32, u8)> = Vec::new();

        while let Some(line) = lines.next() {
            let line = line.map_err(|e| CgError::io(e.to_string()))?;
            match line.trim() {
                "$MeshFormat" => Self::skip_to(&mut lines, "$EndMeshFormat"),
                "$PhysicalNames" => {
                    region_names = Self::parse_physical_names(&mut lines)?;
                }
                "$Nodes" => {
                    let (coords, map) = Self::parse_nodes(&mut lines)?;
                    nodes = coords;
                    node_map = map;
                }
                "$Elements" => {
                    Self::parse_elements(&mut lines, &node_map, &mut blocks)?;
                }
                _ => {}
            }
        }

        Ok(RawTaggedMesh {
            nodes,
            blocks: blocks.into_iter().filter(|b| !b.is_empty()).collect(),
            region_names,
        })
    }

    /// 跳过到指定结束标记
    fn skip_to<I: Iterator<Item = std::io::Result<String>>>(lines: &mut I, end: &str) {
        for l in lines.by_ref().flatten() {
            if l.trim() == end {
                break;
            }
        }
    }

    /// 解析物理名称: `dim tag "name"`
    fn parse_physical_names<I: Iterator<Item = std::io::Result<String>>>(
        lines: &mut I,
    ) -> CgResult<Vec<(String, u32, u8)>> {
        let mut names = Vec::new();
        lines.next(); // 跳过数量行

        for l in lines.by_ref().flatten() {
            let t = l.trim();
            if t == "$EndPhysicalNames" {
                break;
            }
            let parts: Vec<&str> = t.split_whitespace().collect();
            if parts.len() >= 3 {
                if let (Ok(dim), Ok(tag)) = (parts[0].parse::<u8>(), parts[1].parse::<u32>()) {
                    let name = parts[2..].join(" ").trim_matches('"').to_string();
                    names.push((name, tag, dim));
                }
            }
        }
        Ok(names)
    }

    /// 解析节点: `id x y z`
    fn parse_nodes<I: Iterator<Item = std::io::Result<String>>>(
        lines: &mut I,
    ) -> CgResult<(Vec<DVec3>, HashMap<usize, u32>)> {
        let mut coords = Vec::new();
        let mut map = HashMap::new();

        if let Some(Ok(count)) = lines.next() {
            if let Ok(n) = count.trim().parse::<usize>() {
                coords.reserve(n);
                map.reserve(n);
            }
        }

        for l in lines.by_ref().flatten() {
            let t = l.trim();
            if t == "$EndNodes" {
                break;
            }
            let parts: Vec<&str> = t.split_whitespace().collect();
            if parts.len() >= 4 {
                if let (Ok(id), Ok(x), Ok(y), Ok(z)) = (
                    parts[0].parse::<usize>(),
                    parts[1].parse::<f64>(),
                    parts[2].parse::<f64>(),
                    parts[3].parse::<f64>(),
                ) {
                    map.insert(id, coords.len() as u32);
                    coords.push(DVec3::new(x, y, z));
                }
            }
        }
        Ok((coords, map))
    }

    /// 解析单元: `id type ntags ptag [gtag...] n1 n2 ...`
    fn parse_elements<I: Iterator<Item = std::io::Result<String>>>(
        lines: &mut I,
        node_map: &HashMap<usize, u32>,
        blocks: &mut [CellBlock; 4],
    ) -> CgResult<()> {
        lines.next(); // 跳过数量行

        for l in lines.by_ref().flatten() {
            let t = l.trim();
            if t == "$EndElements" {
                break;
            }
            let parts: Vec<&str> = t.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }

            let elem_type = parts[1].parse::<usize>().unwrap_or(0);
            let Some(dim) = elem_type_dim(elem_type) else {
                continue;
            };
            let n_tags = parts[2].parse::<usize>().unwrap_or(0);
            let tag = if n_tags > 0 {
                parts.get(3).and_then(|s| s.parse().ok()).unwrap_or(0)
            } else {
                0
            };
            let start = 3 + n_tags;
            let n_nodes = CellBlock::nodes_per_cell(dim);

            if parts.len() < start + n_nodes {
                continue;
            }
            let ns: Option<Vec<u32>> = parts[start..start + n_nodes]
                .iter()
                .map(|s| s.parse::<usize>().ok().and_then(|id| node_map.get(&id).copied()))
                .collect();
            if let Some(ns) = ns {
                blocks[dim as usize].push(ns, tag);
            }
        }
        Ok(())
    }
}

// ============================================================================
// 写入
// ============================================================================

/// 原始网格文件写入器
pub struct MshWriter;

impl MshWriter {
    /// 写入文件
    pub fn write<P: AsRef<Path>>(path: P, mesh: &RawTaggedMesh) -> CgResult<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| CgError::io(format!("cannot create {}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        Self::write_to(&mut writer, mesh)
    }

    /// 写入到 writer
    pub fn write_to<W: Write>(writer: &mut W, mesh: &RawTaggedMesh) -> CgResult<()> {
        let io_err = |e: std::io::Error| CgError::io(e.to_string());

        writeln!(writer, "$MeshFormat").map_err(io_err)?;
        writeln!(writer, "2.2 0 8").map_err(io_err)?;
        writeln!(writer, "$EndMeshFormat").map_err(io_err)?;

        if !mesh.region_names.is_empty() {
            writeln!(writer, "$PhysicalNames").map_err(io_err)?;
            writeln!(writer, "{}", mesh.region_names.len()).map_err(io_err)?;
            for (name, tag, dim) in &mesh.region_names {
                writeln!(writer, "{} {} \"{}\"", dim, tag, name).map_err(io_err)?;
            }
            writeln!(writer, "$EndPhysicalNames").map_err(io_err)?;
        }

        writeln!(writer, "$Nodes").map_err(io_err)?;
        writeln!(writer, "{}", mesh.nodes.len()).map_err(io_err)?;
        for (i, p) in mesh.nodes.iter().enumerate() {
            writeln!(writer, "{} {} {} {}", i + 1, p.x, p.y, p.z).map_err(io_err)?;
        }
        writeln!(writer, "$EndNodes").map_err(io_err)?;

        let total: usize = mesh.blocks.iter().map(|b| b.len()).sum();
        writeln!(writer, "$Elements").map_err(io_err)?;
        writeln!(writer, "{}", total).map_err(io_err)?;

        let mut elem_id = 1;
        for block in &mesh.blocks {
            let etype = dim_elem_type(block.dim);
            for (cell, &tag) in block.cells.iter().zip(block.tags.iter()) {
                write!(writer, "{} {} 2 {} 0", elem_id, etype, tag).map_err(io_err)?;
                for &n in cell {
                    write!(writer, " {}", n + 1).map_err(io_err)?;
                }
                writeln!(writer).map_err(io_err)?;
                elem_id += 1;
            }
        }
        writeln!(writer, "$EndElements").map_err(io_err)?;

        Ok(())
    }
}

// ============================================================================
// 测试
// ============================================================================
