// apps/cg_cli/src/commands/create_slab.rs

//! create-slab 子命令

use super::{factory_with_capability_check, FiberArgs};
use anyhow::Context;
use cg_mesh::generation::SlabParams;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// create-slab 参数
#[derive(Args)]
pub struct CreateSlabArgs {
    /// 输出目录
    pub outdir: PathBuf,

    /// x 方向长度
    #[arg(long, default_value_t = 20.0)]
    pub lx: f64,

    /// y 方向长度（跨壁方向）
    #[arg(long, default_value_t = 7.0)]
    pub ly: f64,

    /// z 方向长度
    #[arg(long, default_value_t = 3.0)]
    pub lz: f64,

    /// 单元尺寸
    #[arg(long, default_value_t = 1.0)]
    pub dx: f64,

    #[command(flatten)]
    pub fibers: FiberArgs,
}

/// 执行 create-slab
pub fn execute(args: CreateSlabArgs) -> anyhow::Result<()> {
    let factory = factory_with_capability_check()?;
    let params = SlabParams {
        lx: args.lx,
        ly: args.ly,
        lz: args.lz,
        dx: args.dx,
    };
    let options = args.fibers.to_options()?;

    let geometry = factory
        .create_slab(Some(&args.outdir), &params, &options)
        .context("slab creation failed")?
        .context("geometry is absent although backends were checked")?;

    info!(
        outdir = %args.outdir.display(),
        n_cells = geometry.mesh().n_cells(),
        fibers = geometry.microstructure.is_some(),
        "slab geometry written"
    );
    Ok(())
}
