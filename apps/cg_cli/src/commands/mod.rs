// apps/cg_cli/src/commands/mod.rs

//! CLI 子命令

pub mod create_biv;
pub mod create_lv;
pub mod create_slab;
pub mod info;

use anyhow::Context;
use cg_fibers::AngleParams;
use cg_geometry::{FiberOptions, GeometryFactory};
use cg_solver::space::FiberSpace;

/// 各 create 子命令共用的纤维选项
#[derive(clap::Args)]
pub struct FiberArgs {
    /// 是否生成解析纤维
    #[arg(long)]
    pub create_fibers: bool,

    /// 内膜螺旋角 [度]
    #[arg(long, default_value_t = -60.0, allow_hyphen_values = true)]
    pub fiber_angle_endo: f64,

    /// 外膜螺旋角 [度]
    #[arg(long, default_value_t = 60.0, allow_hyphen_values = true)]
    pub fiber_angle_epi: f64,

    /// 纤维函数空间 (P_1 或 P_2)
    #[arg(long, default_value = "P_1")]
    pub fiber_space: String,
}

impl FiberArgs {
    /// 转为工厂选项；空间字符串在此一次性校验
    pub fn to_options(&self) -> anyhow::Result<FiberOptions> {
        let fiber_space: FiberSpace = self
            .fiber_space
            .parse()
            .with_context(|| format!("invalid --fiber-space '{}'", self.fiber_space))?;
        Ok(FiberOptions {
            create_fibers: self.create_fibers,
            angles: AngleParams::new(self.fiber_angle_endo, self.fiber_angle_epi),
            fiber_space,
        })
    }
}

/// 构建工厂并上前检查能力，缺口在任何工作前报告
pub fn factory_with_capability_check() -> anyhow::Result<GeometryFactory> {
    let factory = GeometryFactory::with_defaults();
    factory
        .backends()
        .require_all()
        .context("required backend is not installed")?;
    Ok(factory)
}
