// apps/cg_cli/src/main.rs

//! CardioGeom 命令行界面
//!
//! 创建理想化心脏几何（slab / LV 椭球 / BiV 椭球）并按需生成
//! 纤维微结构。角度参数一律以度为单位。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// CardioGeom 心脏几何生成命令行工具
#[derive(Parser)]
#[command(name = "cg_cli")]
#[command(author = "CardioGeom Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CardioGeom cardiac geometry and fiber generator", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 创建矩形 slab 几何
    CreateSlab(commands::create_slab::CreateSlabArgs),
    /// 创建理想化 LV 椭球几何
    CreateLvEllipsoid(commands::create_lv::CreateLvArgs),
    /// 创建理想化 BiV 椭球几何
    CreateBivEllipsoid(commands::create_biv::CreateBivArgs),
    /// 显示已持久化几何目录的信息
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 执行命令
    match cli.command {
        Commands::CreateSlab(args) => commands::create_slab::execute(args),
        Commands::CreateLvEllipsoid(args) => commands::create_lv::execute(args),
        Commands::CreateBivEllipsoid(args) => commands::create_biv::execute(args),
        Commands::Info(args) => commands::info::execute(args),
    }
}
