// crates/cg_mesh/src/generation.rs

//! 内置结构化网格生成器
//!
//! 提供 [`MeshGenerator`] 后端接口和结构化实现 [`StructuredMeshGenerator`]：
//!
//! - 矩形 slab：立方体晶格，每个立方体按 Kuhn 方式剖分为 6 个四面体，
//!   六个表面分别标记 X0/X1/Y0/Y1/Z0/Z1；
//! - 理想化 LV 椭球壳：(跨壁, μ, θ) 结构化晶格，ENDO/EPI/BASE 表面标记；
//! - 理想化 BiV：LV 全壳 + RV 半开壳的简化组合，
//!   ENDO_LV/ENDO_RV/EPI/BASE 表面标记。
//!
//! 生成器作为可选后端消费：核心管线只看到 [`RawTaggedMesh`]，
//! 不关心其来源。
//!
//! Kuhn 剖分在指数空间是平移不变的，相邻立方体（包括 θ 周期缝）
//! 共享面的对角线一致，保证提取出的面片表封闭。

use crate::mesh::{CellBlock, RawTaggedMesh};
use cg_foundation::{CgError, CgResult};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;

// ============================================================================
// 参数
// ============================================================================

/// slab 几何参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlabParams {
    /// x 方向长度
    #[serde(default = "default_lx")]
    pub lx: f64,
    /// y 方向长度（跨壁方向）
    #[serde(default = "default_ly")]
    pub ly: f64,
    /// z 方向长度
    #[serde(default = "default_lz")]
    pub lz: f64,
    /// 单元尺寸
    #[serde(default = "default_dx")]
    pub dx: f64,
}

fn default_lx() -> f64 {
    20.0
}
fn default_ly() -> f64 {
    7.0
}
fn default_lz() -> f64 {
    3.0
}
fn default_dx() -> f64 {
    1.0
}

impl Default for SlabParams {
    fn default() -> Self {
        Self {
            lx: default_lx(),
            ly: default_ly(),
            lz: default_lz(),
            dx: default_dx(),
        }
    }
}

impl SlabParams {
    /// 验证参数有效性
    pub fn validate(&self) -> CgResult<()> {
        for (key, v) in [
            ("lx", self.lx),
            ("ly", self.ly),
            ("lz", self.lz),
            ("dx", self.dx),
        ] {
            if v <= 0.0 {
                return Err(CgError::invalid_config(
                    key,
                    v.to_string(),
                    "must be positive",
                ));
            }
        }
        Ok(())
    }
}

/// LV 椭球几何参数
///
/// 长轴沿 x，μ 为从心尖 (−π) 到基底的极角。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LvEllipsoidParams {
    /// 内膜短半径
    #[serde(default = "default_r_short_endo")]
    pub r_short_endo: f64,
    /// 外膜短半径
    #[serde(default = "default_r_short_epi")]
    pub r_short_epi: f64,
    /// 内膜长半径
    #[serde(default = "default_r_long_endo")]
    pub r_long_endo: f64,
    /// 外膜长半径
    #[serde(default = "default_r_long_epi")]
    pub r_long_epi: f64,
    /// 参考单元尺寸（越小网格越细）
    #[serde(default = "default_psize_ref")]
    pub psize_ref: f64,
    /// 内膜心尖角
    #[serde(default = "default_mu_apex")]
    pub mu_apex_endo: f64,
    /// 内膜基底角
    #[serde(default = "default_mu_base_endo")]
    pub mu_base_endo: f64,
    /// 外膜心尖角
    #[serde(default = "default_mu_apex")]
    pub mu_apex_epi: f64,
    /// 外膜基底角
    #[serde(default = "default_mu_base_epi")]
    pub mu_base_epi: f64,
}

fn default_r_short_endo() -> f64 {
    7.0
}
fn default_r_short_epi() -> f64 {
    10.0
}
fn default_r_long_endo() -> f64 {
    17.0
}
fn default_r_long_epi() -> f64 {
    20.0
}
fn default_psize_ref() -> f64 {
    3.0
}
fn default_mu_apex() -> f64 {
    -PI
}
fn default_mu_base_endo() -> f64 {
    -(5.0_f64 / 17.0).acos()
}
fn default_mu_base_epi() -> f64 {
    -(5.0_f64 / 20.0).acos()
}

impl Default for LvEllipsoidParams {
    fn default() -> Self {
        Self {
            r_short_endo: default_r_short_endo(),
            r_short_epi: default_r_short_epi(),
            r_long_endo: default_r_long_endo(),
            r_long_epi: default_r_long_epi(),
            psize_ref: default_psize_ref(),
            mu_apex_endo: default_mu_apex(),
            mu_base_endo: default_mu_base_endo(),
            mu_apex_epi: default_mu_apex(),
            mu_base_epi: default_mu_base_epi(),
        }
    }
}

impl LvEllipsoidParams {
    /// 验证参数有效性
    pub fn validate(&self) -> CgResult<()> {
        if self.r_short_endo >= self.r_short_epi || self.r_long_endo >= self.r_long_epi {
            return Err(CgError::invalid_config(
                "r_endo/r_epi",
                format!(
                    "short {}/{}, long {}/{}",
                    self.r_short_endo, self.r_short_epi, self.r_long_endo, self.r_long_epi
                ),
                "endocardial radii must be smaller than epicardial",
            ));
        }
        if self.psize_ref <= 0.0 {
            return Err(CgError::invalid_config(
                "psize_ref",
                self.psize_ref.to_string(),
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// BiV 椭球几何参数
///
/// 两个椭球壳（LV 全壳 + RV 自由壁半壳）的简化组合；
/// 半轴 a 沿长轴 x，b/c 沿 y/z。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BivEllipsoidParams {
    /// 特征单元尺寸
    #[serde(default = "default_char_length")]
    pub char_length: f64,
    /// LV 中心 y 坐标
    #[serde(default)]
    pub center_lv_y: f64,
    /// LV 内膜半轴 a
    #[serde(default = "default_a_endo_lv")]
    pub a_endo_lv: f64,
    /// LV 内膜半轴 b
    #[serde(default = "default_b_endo_lv")]
    pub b_endo_lv: f64,
    /// LV 内膜半轴 c
    #[serde(default = "default_b_endo_lv")]
    pub c_endo_lv: f64,
    /// LV 外膜半轴 a
    #[serde(default = "default_a_epi_lv")]
    pub a_epi_lv: f64,
    /// LV 外膜半轴 b
    #[serde(default = "default_b_epi_lv")]
    pub b_epi_lv: f64,
    /// LV 外膜半轴 c
    #[serde(default = "default_b_epi_lv")]
    pub c_epi_lv: f64,
    /// RV 中心 y 坐标
    #[serde(default = "default_center_rv_y")]
    pub center_rv_y: f64,
    /// RV 内膜半轴 a
    #[serde(default = "default_a_endo_rv")]
    pub a_endo_rv: f64,
    /// RV 内膜半轴 b
    #[serde(default = "default_b_endo_rv")]
    pub b_endo_rv: f64,
    /// RV 内膜半轴 c
    #[serde(default = "default_b_endo_rv")]
    pub c_endo_rv: f64,
    /// RV 外膜半轴 a
    #[serde(default = "default_a_epi_rv")]
    pub a_epi_rv: f64,
    /// RV 外膜半轴 b
    #[serde(default = "default_b_epi_rv")]
    pub b_epi_rv: f64,
    /// RV 外膜半轴 c
    #[serde(default = "default_c_epi_rv")]
    pub c_epi_rv: f64,
}

fn default_char_length() -> f64 {
    0.5
}
fn default_a_endo_lv() -> f64 {
    2.5
}
fn default_b_endo_lv() -> f64 {
    1.0
}
fn default_a_epi_lv() -> f64 {
    3.0
}
fn default_b_epi_lv() -> f64 {
    1.5
}
fn default_center_rv_y() -> f64 {
    0.5
}
fn default_a_endo_rv() -> f64 {
    3.0
}
fn default_b_endo_rv() -> f64 {
    1.5
}
fn default_a_epi_rv() -> f64 {
    4.0
}
fn default_b_epi_rv() -> f64 {
    2.5
}
fn default_c_epi_rv() -> f64 {
    2.0
}

impl Default for BivEllipsoidParams {
    fn default() -> Self {
        Self {
            char_length: default_char_length(),
            center_lv_y: 0.0,
            a_endo_lv: default_a_endo_lv(),
            b_endo_lv: default_b_endo_lv(),
            c_endo_lv: default_b_endo_lv(),
            a_epi_lv: default_a_epi_lv(),
            b_epi_lv: default_b_epi_lv(),
            c_epi_lv: default_b_epi_lv(),
            center_rv_y: default_center_rv_y(),
            a_endo_rv: default_a_endo_rv(),
            b_endo_rv: default_b_endo_rv(),
            c_endo_rv: default_b_endo_rv(),
            a_epi_rv: default_a_epi_rv(),
            b_epi_rv: default_b_epi_rv(),
            c_epi_rv: default_c_epi_rv(),
        }
    }
}

impl BivEllipsoidParams {
    /// 验证参数有效性
    pub fn validate(&self) -> CgResult<()> {
        if self.char_length <= 0.0 {
            return Err(CgError::invalid_config(
                "char_length",
                self.char_length.to_string(),
                "must be positive",
            ));
        }
        if self.a_endo_lv >= self.a_epi_lv || self.a_endo_rv >= self.a_epi_rv {
            return Err(CgError::invalid_config(
                "a_endo/a_epi",
                format!("{}/{}, {}/{}", self.a_endo_lv, self.a_epi_lv, self.a_endo_rv, self.a_epi_rv),
                "endocardial semi-axes must be smaller than epicardial",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// 后端接口
// ============================================================================

/// 网格生成后端
///
/// 核心管线通过该接口消费生成器；后端是否可用由上层能力标志决定。
pub trait MeshGenerator: Send + Sync + std::fmt::Debug {
    /// 后端名称
    fn name(&self) -> &'static str;

    /// 生成矩形 slab
    fn slab(&self, params: &SlabParams) -> CgResult<RawTaggedMesh>;

    /// 生成理想化 LV 椭球
    fn lv_ellipsoid(&self, params: &LvEllipsoidParams) -> CgResult<RawTaggedMesh>;

    /// 生成理想化 BiV 椭球
    fn biv_ellipsoid(&self, params: &BivEllipsoidParams) -> CgResult<RawTaggedMesh>;
}

// ============================================================================
// slab 区域标签
// ============================================================================

/// slab 表面与体区域标签
pub mod slab_tags {
    /// y=0 面（内膜侧）
    pub const Y0: u32 = 1;
    /// y=ly 面（外膜侧）
    pub const Y1: u32 = 2;
    /// x=0 面
    pub const X0: u32 = 3;
    /// x=lx 面
    pub const X1: u32 = 4;
    /// z=0 面
    pub const Z0: u32 = 5;
    /// z=lz 面
    pub const Z1: u32 = 6;
    /// 体区域
    pub const MYOCARDIUM: u32 = 7;
}

/// LV 表面与体区域标签
pub mod lv_tags {
    /// 内膜面
    pub const ENDO: u32 = 1;
    /// 外膜面
    pub const EPI: u32 = 2;
    /// 基底面
    pub const BASE: u32 = 3;
    /// 体区域
    pub const MYOCARDIUM: u32 = 4;
}

/// BiV 表面与体区域标签
pub mod biv_tags {
    /// LV 内膜面
    pub const ENDO_LV: u32 = 1;
    /// RV 内膜面
    pub const ENDO_RV: u32 = 2;
    /// 外膜面
    pub const EPI: u32 = 3;
    /// 基底面
    pub const BASE: u32 = 4;
    /// 体区域
    pub const MYOCARDIUM: u32 = 5;
}

// ============================================================================
// 结构化生成器
// ============================================================================

/// 内置结构化网格生成后端
#[derive(Debug)]
pub struct StructuredMeshGenerator;

/// Kuhn 剖分使用的 6 个轴置换
const KUHN_PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// 把一个立方体（8 个全局节点，corner\[dx]\[dy]\[dz] 布局）剖分为 6 个四面体
fn kuhn_split(corner: &dyn Fn(usize, usize, usize) -> u32, tets: &mut Vec<Vec<u32>>) {
    let v000 = corner(0, 0, 0);
    let v111 = corner(1, 1, 1);
    for perm in KUHN_PERMUTATIONS {
        let mut d = [0usize; 3];
        d[perm[0]] = 1;
        let v1 = corner(d[0], d[1], d[2]);
        d[perm[1]] = 1;
        let v2 = corner(d[0], d[1], d[2]);
        tets.push(vec![v000, v1, v2, v111]);
    }
}

/// 从四面体列表提取边界面片（只属于一个四面体的面）
fn boundary_facets(tets: &[Vec<u32>]) -> Vec<[u32; 3]> {
    let mut counts: HashMap<[u32; 3], u8> = HashMap::new();
    for tet in tets {
        for f in [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]] {
            let mut key = [tet[f[0]], tet[f[1]], tet[f[2]]];
            key.sort_unstable();
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    let mut facets: Vec<[u32; 3]> = counts
        .into_iter()
        .filter(|&(_, c)| c == 1)
        .map(|(k, _)| k)
        .collect();
    // HashMap 迭代序不确定；排序保证生成器输出可复现
    facets.sort_unstable();
    facets
}

impl MeshGenerator for StructuredMeshGenerator {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn slab(&self, params: &SlabParams) -> CgResult<RawTaggedMesh> {
        params.validate()?;

        let nx = (params.lx / params.dx).round().max(1.0) as usize;
        let ny = (params.ly / params.dx).round().max(1.0) as usize;
        let nz = (params.lz / params.dx).round().max(1.0) as usize;

        let hx = params.lx / nx as f64;
        let hy = params.ly / ny as f64;
        let hz = params.lz / nz as f64;

        let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    nodes.push(DVec3::new(i as f64 * hx, j as f64 * hy, k as f64 * hz));
                }
            }
        }
        let node_idx =
            |i: usize, j: usize, k: usize| -> u32 { ((k * (ny + 1) + j) * (nx + 1) + i) as u32 };

        let mut tets: Vec<Vec<u32>> = Vec::with_capacity(nx * ny * nz * 6);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let corner =
                        |di: usize, dj: usize, dk: usize| node_idx(i + di, j + dj, k + dk);
                    kuhn_split(&corner, &mut tets);
                }
            }
        }

        // 按坐标平面分类边界面片
        let eps = 1e-9 * (1.0 + params.lx.max(params.ly).max(params.lz));
        let on = |v: f64, target: f64| (v - target).abs() < eps;
        let mut facet_block = CellBlock::empty(2);
        for facet in boundary_facets(&tets) {
            let p: Vec<DVec3> = facet.iter().map(|&n| nodes[n as usize]).collect();
            let tag = if p.iter().all(|q| on(q.y, 0.0)) {
                slab_tags::Y0
            } else if p.iter().all(|q| on(q.y, params.ly)) {
                slab_tags::Y1
            } else if p.iter().all(|q| on(q.x, 0.0)) {
                slab_tags::X0
            } else if p.iter().all(|q| on(q.x, params.lx)) {
                slab_tags::X1
            } else if p.iter().all(|q| on(q.z, 0.0)) {
                slab_tags::Z0
            } else if p.iter().all(|q| on(q.z, params.lz)) {
                slab_tags::Z1
            } else {
                continue;
            };
            facet_block.push(facet.to_vec(), tag);
        }

        let mut tet_block = CellBlock::empty(3);
        for tet in tets {
            tet_block.push(tet, slab_tags::MYOCARDIUM);
        }

        Ok(RawTaggedMesh {
            nodes,
            blocks: vec![facet_block, tet_block],
            region_names: vec![
                ("Y0".into(), slab_tags::Y0, 2),
                ("Y1".into(), slab_tags::Y1, 2),
                ("X0".into(), slab_tags::X0, 2),
                ("X1".into(), slab_tags::X1, 2),
                ("Z0".into(), slab_tags::Z0, 2),
                ("Z1".into(), slab_tags::Z1, 2),
                ("MYOCARDIUM".into(), slab_tags::MYOCARDIUM, 3),
            ],
        })
    }

    fn lv_ellipsoid(&self, params: &LvEllipsoidParams) -> CgResult<RawTaggedMesh> {
        params.validate()?;

        let spec = ShellSpec {
            center: DVec3::ZERO,
            a_endo: params.r_long_endo,
            b_endo: params.r_short_endo,
            c_endo: params.r_short_endo,
            a_epi: params.r_long_epi,
            b_epi: params.r_short_epi,
            c_epi: params.r_short_epi,
            mu_apex_endo: params.mu_apex_endo,
            mu_base_endo: params.mu_base_endo,
            mu_apex_epi: params.mu_apex_epi,
            mu_base_epi: params.mu_base_epi,
            theta_range: None,
            n_layers: resolution(params.r_short_epi - params.r_short_endo, params.psize_ref, 2),
            n_mu: resolution(
                params.r_long_epi * (params.mu_base_epi - params.mu_apex_epi).abs(),
                params.psize_ref,
                4,
            ),
            n_theta: resolution(2.0 * PI * params.r_short_epi, params.psize_ref, 8),
            endo_tag: lv_tags::ENDO,
            epi_tag: lv_tags::EPI,
            base_tag: lv_tags::BASE,
        };

        let mut builder = ShellMeshBuilder::new();
        builder.add_shell(&spec);
        Ok(builder.finish(
            lv_tags::MYOCARDIUM,
            vec![
                ("ENDO".into(), lv_tags::ENDO, 2),
                ("EPI".into(), lv_tags::EPI, 2),
                ("BASE".into(), lv_tags::BASE, 2),
                ("MYOCARDIUM".into(), lv_tags::MYOCARDIUM, 3),
            ],
        ))
    }

    fn biv_ellipsoid(&self, params: &BivEllipsoidParams) -> CgResult<RawTaggedMesh> {
        params.validate()?;

        let h = params.char_length;
        let mu_apex = -PI;
        let mu_base = -PI / 2.0;

        let lv = ShellSpec {
            center: DVec3::new(0.0, params.center_lv_y, 0.0),
            a_endo: params.a_endo_lv,
            b_endo: params.b_endo_lv,
            c_endo: params.c_endo_lv,
            a_epi: params.a_epi_lv,
            b_epi: params.b_epi_lv,
            c_epi: params.c_epi_lv,
            mu_apex_endo: mu_apex,
            mu_base_endo: mu_base,
            mu_apex_epi: mu_apex,
            mu_base_epi: mu_base,
            theta_range: None,
            n_layers: resolution(params.b_epi_lv - params.b_endo_lv, h, 2),
            n_mu: resolution(params.a_epi_lv * (mu_base - mu_apex).abs(), h, 4),
            n_theta: resolution(2.0 * PI * params.b_epi_lv, h, 8),
            endo_tag: biv_tags::ENDO_LV,
            epi_tag: biv_tags::EPI,
            base_tag: biv_tags::BASE,
        };

        // RV 自由壁：θ 限制在 cosθ<0 的半区，使壳体朝 +y 方向鼓出
        let rv = ShellSpec {
            center: DVec3::new(0.0, params.center_rv_y, 0.0),
            a_endo: params.a_endo_rv,
            b_endo: params.b_endo_rv,
            c_endo: params.c_endo_rv,
            a_epi: params.a_epi_rv,
            b_epi: params.b_epi_rv,
            c_epi: params.c_epi_rv,
            mu_apex_endo: mu_apex,
            mu_base_endo: mu_base,
            mu_apex_epi: mu_apex,
            mu_base_epi: mu_base,
            theta_range: Some((PI / 2.0, 3.0 * PI / 2.0)),
            n_layers: resolution(params.b_epi_rv - params.b_endo_rv, h, 2),
            n_mu: resolution(params.a_epi_rv * (mu_base - mu_apex).abs(), h, 4),
            n_theta: resolution(PI * params.b_epi_rv, h, 8),
            endo_tag: biv_tags::ENDO_RV,
            epi_tag: biv_tags::EPI,
            base_tag: biv_tags::BASE,
        };

        let mut builder = ShellMeshBuilder::new();
        builder.add_shell(&lv);
        builder.add_shell(&rv);
        Ok(builder.finish(
            biv_tags::MYOCARDIUM,
            vec![
                ("ENDO_LV".into(), biv_tags::ENDO_LV, 2),
                ("ENDO_RV".into(), biv_tags::ENDO_RV, 2),
                ("EPI".into(), biv_tags::EPI, 2),
                ("BASE".into(), biv_tags::BASE, 2),
                ("MYOCARDIUM".into(), biv_tags::MYOCARDIUM, 3),
            ],
        ))
    }
}

/// 由弧长和参考尺寸确定分割数
fn resolution(extent: f64, size_ref: f64, min: usize) -> usize {
    ((extent / size_ref).ceil() as usize).max(min)
}

// ============================================================================
// 椭球壳构建
// ============================================================================

/// 单个椭球壳的几何描述
struct ShellSpec {
    center: DVec3,
    a_endo: f64,
    b_endo: f64,
    c_endo: f64,
    a_epi: f64,
    b_epi: f64,
    c_epi: f64,
    mu_apex_endo: f64,
    mu_base_endo: f64,
    mu_apex_epi: f64,
    mu_base_epi: f64,
    /// None = θ 全周期；Some = 开壳的 θ 区间
    theta_range: Option<(f64, f64)>,
    n_layers: usize,
    n_mu: usize,
    n_theta: usize,
    endo_tag: u32,
    epi_tag: u32,
    base_tag: u32,
}

impl ShellSpec {
    /// 晶格坐标 → 空间位置
    ///
    /// λ ∈ [0,1] 跨壁（0=endo, 1=epi），j ∈ [1, n_mu] 极向（n_mu=基底），
    /// θ 周向。心尖 (j=0) 因退化被跳过，壳体在心尖留一个小孔，
    /// 该孔的面片保持未标记（零通量边界）。
    fn position(&self, lambda: f64, j: usize, theta: f64) -> DVec3 {
        let a = self.a_endo + lambda * (self.a_epi - self.a_endo);
        let b = self.b_endo + lambda * (self.b_epi - self.b_endo);
        let c = self.c_endo + lambda * (self.c_epi - self.c_endo);
        let mu_apex = self.mu_apex_endo + lambda * (self.mu_apex_epi - self.mu_apex_endo);
        let mu_base = self.mu_base_endo + lambda * (self.mu_base_epi - self.mu_base_endo);
        let mu = mu_apex + (mu_base - mu_apex) * (j as f64 / self.n_mu as f64);

        self.center
            + DVec3::new(
                a * mu.cos(),
                b * mu.sin() * theta.cos(),
                c * mu.sin() * theta.sin(),
            )
    }

    fn theta_at(&self, i: usize) -> f64 {
        match self.theta_range {
            None => 2.0 * PI * i as f64 / self.n_theta as f64,
            Some((t0, t1)) => t0 + (t1 - t0) * i as f64 / self.n_theta as f64,
        }
    }

    /// θ 方向节点环数（开壳比周期壳多一圈）
    fn n_theta_nodes(&self) -> usize {
        match self.theta_range {
            None => self.n_theta,
            Some(_) => self.n_theta + 1,
        }
    }
}

/// 单个节点的晶格标签
#[derive(Debug, Clone, Copy)]
struct NodeLabel {
    /// 所属壳序号
    shell: usize,
    /// 跨壁层号 (0=endo)
    layer: usize,
    /// 极向序号 (n_mu=基底)
    mu: usize,
}

/// 单个壳的标签表
#[derive(Debug, Clone, Copy)]
struct ShellTags {
    n_layers: usize,
    n_mu: usize,
    endo: u32,
    epi: u32,
    base: u32,
}

/// 多壳网格构建器
///
/// 累积节点与四面体，最后统一提取带标签边界面片。
struct ShellMeshBuilder {
    nodes: Vec<DVec3>,
    tets: Vec<Vec<u32>>,
    node_labels: Vec<NodeLabel>,
    shells: Vec<ShellTags>,
}

impl ShellMeshBuilder {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            tets: Vec::new(),
            node_labels: Vec::new(),
            shells: Vec::new(),
        }
    }

    fn add_shell(&mut self, spec: &ShellSpec) {
        let shell = self.shells.len();
        let node_offset = self.nodes.len() as u32;
        let n_theta_nodes = spec.n_theta_nodes();

        // 节点晶格：(层 il, 极向 j ∈ 1..=n_mu, 周向 it)
        for il in 0..=spec.n_layers {
            let lambda = il as f64 / spec.n_layers as f64;
            for j in 1..=spec.n_mu {
                for it in 0..n_theta_nodes {
                    let theta = spec.theta_at(it);
                    self.nodes.push(spec.position(lambda, j, theta));
                    self.node_labels.push(NodeLabel {
                        shell,
                        layer: il,
                        mu: j,
                    });
                }
            }
        }

        let node_idx = |il: usize, j: usize, it: usize| -> u32 {
            node_offset + ((il * spec.n_mu + (j - 1)) * n_theta_nodes + it) as u32
        };

        for il in 0..spec.n_layers {
            for j in 1..spec.n_mu {
                for it in 0..spec.n_theta {
                    // 周期壳在缝处回绕；开壳不回绕（n_theta_nodes = n_theta + 1）
                    let it_next = match spec.theta_range {
                        None => (it + 1) % n_theta_nodes,
                        Some(_) => it + 1,
                    };
                    let corner = |di: usize, dj: usize, dk: usize| {
                        let itk = if dk == 0 { it } else { it_next };
                        node_idx(il + di, j + dj, itk)
                    };
                    kuhn_split(&corner, &mut self.tets);
                }
            }
        }

        self.shells.push(ShellTags {
            n_layers: spec.n_layers,
            n_mu: spec.n_mu,
            endo: spec.endo_tag,
            epi: spec.epi_tag,
            base: spec.base_tag,
        });
    }

    fn finish(self, volume_tag: u32, region_names: Vec<(String, u32, u8)>) -> RawTaggedMesh {
        // 边界面片按节点晶格标签分类；心尖孔和开壳 θ 端面保持未标记
        let mut facet_block = CellBlock::empty(2);
        for facet in boundary_facets(&self.tets) {
            let labels: Vec<NodeLabel> = facet
                .iter()
                .map(|&n| self.node_labels[n as usize])
                .collect();
            let shell = self.shells[labels[0].shell];

            let tag = if labels.iter().all(|l| l.layer == 0) {
                Some(shell.endo)
            } else if labels.iter().all(|l| l.layer == shell.n_layers) {
                Some(shell.epi)
            } else if labels.iter().all(|l| l.mu == shell.n_mu) {
                Some(shell.base)
            } else {
                None
            };
            if let Some(tag) = tag {
                facet_block.push(facet.to_vec(), tag);
            }
        }

        let mut tet_block = CellBlock::empty(3);
        for tet in self.tets {
            tet_block.push(tet, volume_tag);
        }

        RawTaggedMesh {
            nodes: self.nodes,
            blocks: vec![facet_block, tet_block],
            region_names,
        }
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slab_counts() {
        let gen = StructuredMeshGenerator;
        let raw = gen
            .slab(&SlabParams {
                lx: 2.0,
                ly: 1.0,
                lz: 1.0,
                dx: 1.0,
            })
            .unwrap();

        // 3*2*2 节点, 2 立方体 * 6 四面体
        assert_eq!(raw.n_nodes(), 12);
        let (tets, _) = raw.cells_of_dim(3);
        assert_eq!(tets.len(), 12);
    }

    #[test]
    fn test_slab_surface_tags() {
        let gen = StructuredMeshGenerator;
        let params = SlabParams {
            lx: 2.0,
            ly: 1.0,
            lz: 1.0,
            dx: 1.0,
        };
        let raw = gen.slab(&params).unwrap();
        let (facets, tags) = raw.cells_of_dim(2);

        // 每个表面四边形剖成 2 个三角形:
        // Y0/Y1: 2x1 -> 4 个三角形各; X0/X1: 1x1 -> 2; Z0/Z1: 2x1 -> 4
        let count = |tag: u32| tags.iter().filter(|&&t| t == tag).count();
        assert_eq!(count(slab_tags::Y0), 4);
        assert_eq!(count(slab_tags::Y1), 4);
        assert_eq!(count(slab_tags::X0), 2);
        assert_eq!(count(slab_tags::X1), 2);
        assert_eq!(count(slab_tags::Z0), 4);
        assert_eq!(count(slab_tags::Z1), 4);

        // 全部边界面片都被标记
        assert_eq!(facets.len(), 4 + 4 + 2 + 2 + 4 + 4);

        // Y0 面片节点确实在 y=0
        for (f, &t) in facets.iter().zip(tags.iter()) {
            if t == slab_tags::Y0 {
                for &n in f.iter() {
                    assert!(raw.nodes[n as usize].y.abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_slab_region_names() {
        let gen = StructuredMeshGenerator;
        let raw = gen.slab(&SlabParams::default()).unwrap();
        assert!(raw
            .region_names
            .iter()
            .any(|(n, t, d)| n == "Y0" && *t == slab_tags::Y0 && *d == 2));
        assert!(raw
            .region_names
            .iter()
            .any(|(n, t, d)| n == "MYOCARDIUM" && *t == slab_tags::MYOCARDIUM && *d == 3));
    }

    #[test]
    fn test_slab_invalid_params() {
        let gen = StructuredMeshGenerator;
        let err = gen
            .slab(&SlabParams {
                lx: -1.0,
                ..SlabParams::default()
            })
            .unwrap_err();
        assert!(matches!(err, CgError::InvalidConfig { .. }));
    }

    #[test]
    fn test_lv_ellipsoid_has_all_surfaces() {
        let gen = StructuredMeshGenerator;
        let raw = gen.lv_ellipsoid(&LvEllipsoidParams::default()).unwrap();

        let (_, tags) = raw.cells_of_dim(2);
        let count = |tag: u32| tags.iter().filter(|&&t| t == tag).count();
        assert!(count(lv_tags::ENDO) > 0);
        assert!(count(lv_tags::EPI) > 0);
        assert!(count(lv_tags::BASE) > 0);

        let (tets, _) = raw.cells_of_dim(3);
        assert!(!tets.is_empty());
    }

    #[test]
    fn test_lv_endo_facets_on_endo_surface() {
        let gen = StructuredMeshGenerator;
        let params = LvEllipsoidParams::default();
        let raw = gen.lv_ellipsoid(&params).unwrap();

        let (facets, tags) = raw.cells_of_dim(2);
        for (f, &t) in facets.iter().zip(tags.iter()) {
            if t == lv_tags::ENDO {
                for &n in f.iter() {
                    let p = raw.nodes[n as usize];
                    // 内膜面节点满足内膜椭球方程
                    let r = (p.x / params.r_long_endo).powi(2)
                        + (p.y / params.r_short_endo).powi(2)
                        + (p.z / params.r_short_endo).powi(2);
                    assert!((r - 1.0).abs() < 1e-9, "endo node off surface: {}", r);
                }
            }
        }
    }

    #[test]
    fn test_lv_invalid_radii() {
        let gen = StructuredMeshGenerator;
        let err = gen
            .lv_ellipsoid(&LvEllipsoidParams {
                r_short_endo: 11.0,
                ..LvEllipsoidParams::default()
            })
            .unwrap_err();
        assert!(matches!(err, CgError::InvalidConfig { .. }));
    }

    #[test]
    fn test_biv_has_two_endo_surfaces() {
        let gen = StructuredMeshGenerator;
        let raw = gen.biv_ellipsoid(&BivEllipsoidParams::default()).unwrap();

        let (_, tags) = raw.cells_of_dim(2);
        let count = |tag: u32| tags.iter().filter(|&&t| t == tag).count();
        assert!(count(biv_tags::ENDO_LV) > 0);
        assert!(count(biv_tags::ENDO_RV) > 0);
        assert!(count(biv_tags::EPI) > 0);
        assert!(count(biv_tags::BASE) > 0);
    }

    #[test]
    fn test_resolution_floor() {
        assert_eq!(resolution(0.1, 3.0, 4), 4);
        assert!(resolution(100.0, 3.0, 4) >= 33);
    }
}
