// apps/cg_cli/src/commands/create_lv.rs

//! create-lv-ellipsoid 子命令

use super::{factory_with_capability_check, FiberArgs};
use anyhow::Context;
use cg_mesh::generation::LvEllipsoidParams;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// create-lv-ellipsoid 参数
#[derive(Args)]
pub struct CreateLvArgs {
    /// 输出目录
    pub outdir: PathBuf,

    /// 内膜最短半径
    #[arg(long, default_value_t = 7.0)]
    pub r_short_endo: f64,

    /// 外膜最短半径
    #[arg(long, default_value_t = 10.0)]
    pub r_short_epi: f64,

    /// 内膜最长半径
    #[arg(long, default_value_t = 17.0)]
    pub r_long_endo: f64,

    /// 外膜最长半径
    #[arg(long, default_value_t = 20.0)]
    pub r_long_epi: f64,

    /// 参考单元尺寸（越小网格越细）
    #[arg(long, default_value_t = 3.0)]
    pub psize_ref: f64,

    /// 内膜心尖角
    #[arg(long, default_value_t = -std::f64::consts::PI, allow_hyphen_values = true)]
    pub mu_apex_endo: f64,

    /// 内膜基底角（缺省 -acos(5/17)）
    #[arg(long, allow_hyphen_values = true)]
    pub mu_base_endo: Option<f64>,

    /// 外膜心尖角
    #[arg(long, default_value_t = -std::f64::consts::PI, allow_hyphen_values = true)]
    pub mu_apex_epi: f64,

    /// 外膜基底角（缺省 -acos(5/20)）
    #[arg(long, allow_hyphen_values = true)]
    pub mu_base_epi: Option<f64>,

    #[command(flatten)]
    pub fibers: FiberArgs,
}

/// 执行 create-lv-ellipsoid
pub fn execute(args: CreateLvArgs) -> anyhow::Result<()> {
    let factory = factory_with_capability_check()?;
    let defaults = LvEllipsoidParams::default();
    let params = LvEllipsoidParams {
        r_short_endo: args.r_short_endo,
        r_short_epi: args.r_short_epi,
        r_long_endo: args.r_long_endo,
        r_long_epi: args.r_long_epi,
        psize_ref: args.psize_ref,
        mu_apex_endo: args.mu_apex_endo,
        mu_base_endo: args.mu_base_endo.unwrap_or(defaults.mu_base_endo),
        mu_apex_epi: args.mu_apex_epi,
        mu_base_epi: args.mu_base_epi.unwrap_or(defaults.mu_base_epi),
    };
    let options = args.fibers.to_options()?;

    let geometry = factory
        .create_lv_ellipsoid(Some(&args.outdir), &params, &options)
        .context("LV ellipsoid creation failed")?
        .context("geometry is absent although backends were checked")?;

    info!(
        outdir = %args.outdir.display(),
        n_cells = geometry.mesh().n_cells(),
        fibers = geometry.microstructure.is_some(),
        "LV ellipsoid geometry written"
    );
    Ok(())
}
