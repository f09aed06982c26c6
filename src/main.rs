use anyhow::Result;
use clap::Parser;
use savesync_lib::commands::{self, RunSummary};
use savesync_lib::config::{current_platform, AppConfig};
use savesync_lib::logging::{log_dir_for, LogConfig, SizeRotatingWriter};
use savesync_lib::SyncRunner;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

/// 双向同步游戏存档
#[derive(Debug, Parser)]
#[command(name = "savesync", version, about)]
struct Cli {
    /// 配置文件路径
    #[arg(long, env = "SAVESYNC_CONFIG")]
    config: Option<PathBuf>,

    /// 只同步一次后退出
    #[arg(long)]
    once: bool,

    /// 只同步指定的游戏（可重复）
    #[arg(long = "game", value_name = "NAME")]
    games: Vec<String>,

    /// 列出配置的游戏
    #[arg(long)]
    list: bool,

    /// 以 JSON 输出结果
    #[arg(long)]
    json: bool,

    /// 覆盖同步间隔（分钟）
    #[arg(long, value_name = "MINUTES")]
    interval: Option<u64>,

    /// 覆盖时间容差（毫秒）
    #[arg(long, value_name = "MS")]
    skew_tolerance_ms: Option<u64>,

    /// 在控制台输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

/// 初始化日志系统
fn init_logging(config: &LogConfig, config_path: &Path, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.tracing_level()
    };
    let env_filter = || {
        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
        ["hyper=warn", "reqwest=warn", "opendal=warn"]
            .iter()
            .filter_map(|d| d.parse().ok())
            .fold(filter, |f, d| f.add_directive(d))
    };

    // 控制台默认只显示警告和错误，-v 时显示调试日志
    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(console_level);

    let file_writer = if config.enabled {
        SizeRotatingWriter::new(&log_dir_for(config_path), config.max_size_bytes())
            .map_err(|e| eprintln!("无法创建日志文件: {}", e))
            .ok()
    } else {
        None
    };
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(console_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 执行一轮同步并输出结果
async fn run_once(config: &AppConfig, runner: &SyncRunner, games: &[String], json: bool) -> Result<RunSummary> {
    let reports = commands::sync_all_games(config, runner, current_platform(), games).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            commands::print_report(report);
        }
        commands::print_summary(&reports);
    }

    Ok(RunSummary::from_reports(&reports))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let (mut config, created) = AppConfig::load_or_create(&config_path)?;

    init_logging(&config.log, &config_path, cli.verbose);

    if created {
        info!("已创建默认配置: {}", config_path.display());
        if !cli.json {
            println!("Created default config: {}", config_path.display());
        }
    }

    if let Some(minutes) = cli.interval {
        config.sync_interval_minutes = minutes;
    }
    if let Some(ms) = cli.skew_tolerance_ms {
        config.skew_tolerance_ms = ms;
    }

    if cli.list {
        if cli.json {
            let games = commands::list_games(&config, current_platform());
            println!("{}", serde_json::to_string_pretty(&games)?);
        } else {
            commands::print_games(&config, current_platform());
        }
        return Ok(());
    }

    let runner = SyncRunner::new(config.sync_config());

    if cli.once {
        let summary = run_once(&config, &runner, &cli.games, cli.json).await?;
        if summary.has_failures() {
            std::process::exit(summary.exit_code());
        }
        return Ok(());
    }

    let interval = config.sync_interval();
    info!("持续同步模式，间隔 {} 分钟", interval.as_secs() / 60);
    if !cli.json {
        println!(
            "Syncing every {} minutes. Press Ctrl+C to stop.",
            interval.as_secs() / 60
        );
    }

    // 同步和等待期间都响应 Ctrl+C
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = run_once(&config, &runner, &cli.games, cli.json) => {
                if let Err(e) = result {
                    error!("同步失败: {}", e);
                }
            }
            _ = &mut shutdown => break,
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => break,
        }
    }

    info!("收到中断信号，停止同步");
    if !cli.json {
        println!("\nStopped.");
    }

    Ok(())
}
