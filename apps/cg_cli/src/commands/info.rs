// apps/cg_cli/src/commands/info.rs

//! info 子命令：显示已持久化几何目录的摘要

use anyhow::Context;
use cg_geometry::Geometry;
use clap::Args;
use std::path::PathBuf;

/// info 参数
#[derive(Args)]
pub struct InfoArgs {
    /// 几何目录
    pub dir: PathBuf,
}

/// 执行 info
pub fn execute(args: InfoArgs) -> anyhow::Result<()> {
    let geometry = Geometry::from_folder(&args.dir)
        .with_context(|| format!("cannot load geometry from {}", args.dir.display()))?;

    println!("geometry type : {}", geometry.info.params.type_name());
    println!("version       : {}", geometry.info.cardiogeom_version);
    println!("created       : {}", geometry.info.timestamp);
    println!(
        "mesh          : {} nodes, {} cells, {} facets",
        geometry.mesh().n_nodes(),
        geometry.mesh().n_cells(),
        geometry.mesh().n_facets()
    );
    println!("markers       :");
    for (name, tag, dim) in geometry.markers().iter() {
        println!("  {:<12} tag {:>3}, dim {}", name, tag, dim);
    }
    match &geometry.microstructure {
        Some(ms) => println!(
            "fibers        : {} ({} dofs)",
            geometry.info.fiber_space,
            ms.n_points()
        ),
        None => println!("fibers        : none"),
    }
    Ok(())
}
