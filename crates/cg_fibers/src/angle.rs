// crates/cg_fibers/src/angle.rs

//! 螺旋角插值
//!
//! `angle(t) = alpha_endo + (alpha_epi − alpha_endo) · t`，角度在所有
//! 公共边界上以度为单位，内部换算为弧度。纯函数、逐自由度局部、
//! 无邻居耦合。
//!
//! 原始方向在局部解剖基上构造：
//! `f0_raw = cos α · e_c + sin α · e_l`，`s0_raw = e_r`。
//! 解析上 cos²+sin²=1 已保证单位长度，仍显式归一以抵御浮点舍入。

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// 螺旋角参数（度）
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AngleParams {
    /// 内膜角 [度]
    pub alpha_endo: f64,
    /// 外膜角 [度]
    pub alpha_epi: f64,
}

impl Default for AngleParams {
    fn default() -> Self {
        Self {
            alpha_endo: -60.0,
            alpha_epi: 60.0,
        }
    }
}

impl AngleParams {
    /// 创建角度参数
    pub fn new(alpha_endo: f64, alpha_epi: f64) -> Self {
        Self {
            alpha_endo,
            alpha_epi,
        }
    }

    /// t 处的螺旋角 [弧度]
    #[inline]
    pub fn angle_rad(&self, t: f64) -> f64 {
        (self.alpha_endo + (self.alpha_epi - self.alpha_endo) * t).to_radians()
    }
}

/// 由螺旋角和局部基构造原始 (fiber, sheet) 方向
///
/// 返回前显式归一。
#[inline]
pub fn raw_directions(
    alpha_rad: f64,
    e_c: DVec3,
    e_l: DVec3,
    e_r: DVec3,
) -> (DVec3, DVec3) {
    let f0 = (alpha_rad.cos() * e_c + alpha_rad.sin() * e_l).normalize();
    let s0 = e_r.normalize();
    (f0, s0)
}

// ============================================================================
// 测试
// ============================================================================
