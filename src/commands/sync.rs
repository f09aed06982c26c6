//! 同步命令

use crate::config::{AppConfig, StorageConfig};
use crate::core::{GameError, Side, SyncReport, SyncRunner, SyncSpec};
use crate::storage::{create_storage, LocalStorage};
use serde::Serialize;
use tracing::{error, info, warn};

/// 同步单个游戏：创建两侧存储并执行一次同步
pub async fn sync_game(
    runner: &SyncRunner,
    remote_config: &StorageConfig,
    spec: &SyncSpec,
) -> SyncReport {
    let local = LocalStorage::new(&spec.local_root);

    let remote = match create_storage(remote_config, &spec.remote_root).await {
        Ok(s) => s,
        Err(e) => {
            error!("创建远程存储失败: {}: {}", spec.game_name, e);
            return SyncReport::failed(
                &spec.game_name,
                GameError::StoreUnavailable {
                    side: Side::Remote,
                    store: remote_config.describe(&spec.remote_root),
                    message: e.to_string(),
                },
            );
        }
    };

    runner.run(spec, &local, remote.as_ref()).await
}

/// 同步所有启用的游戏（`only` 非空时只同步指定游戏）
///
/// 游戏之间相互独立：一个游戏失败不影响其他游戏。
pub async fn sync_all_games(
    config: &AppConfig,
    runner: &SyncRunner,
    platform: &str,
    only: &[String],
) -> Vec<SyncReport> {
    for name in only {
        if config.find_game(name).is_none() {
            warn!("未配置的游戏: {}", name);
        }
    }

    let specs = config.sync_specs(platform, only);
    if specs.is_empty() {
        warn!("没有需要同步的游戏");
    }

    let mut reports = Vec::with_capacity(specs.len());
    for spec in &specs {
        reports.push(sync_game(runner, &config.remote, spec).await);
    }

    let summary = RunSummary::from_reports(&reports);
    info!(
        "本轮同步完成: {} 个游戏, ↑ {} | ↓ {} | ✓ {} | ✗ {}",
        reports.len(),
        summary.uploaded,
        summary.downloaded,
        summary.skipped,
        summary.failed
    );
    reports
}

/// 一轮同步的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub games: u32,
    pub failed_games: u32,
    pub uploaded: u32,
    pub downloaded: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl RunSummary {
    pub fn from_reports(reports: &[SyncReport]) -> Self {
        reports.iter().fold(Self::default(), |mut acc, r| {
            acc.games += 1;
            acc.failed_games += u32::from(r.error.is_some());
            acc.uploaded += r.uploaded;
            acc.downloaded += r.downloaded;
            acc.skipped += r.skipped;
            acc.failed += r.failed;
            acc
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.failed_games > 0
    }

    /// 进程退出码：全部成功为 0，存在失败为 1
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }
}

/// 打印单个游戏的同步结果
pub fn print_report(report: &SyncReport) {
    println!("\n{}", "=".repeat(60));
    println!("SYNCING: {}", report.game_name);
    println!("{}", "=".repeat(60));

    if let Some(err) = &report.error {
        println!("  ✗ {}", err);
    }

    if report.files.is_empty() && report.error.is_none() {
        println!("  No save files found (neither local nor remote)");
    }

    for file in &report.files {
        println!("  {:<24} {}", file.file_name, file.describe());
    }
}

/// 打印整轮汇总和失败列表
pub fn print_summary(reports: &[SyncReport]) {
    let summary = RunSummary::from_reports(reports);

    println!("\n{}", "=".repeat(60));
    println!(
        "SUMMARY: ↑ {} uploaded  |  ↓ {} downloaded  |  ✓ {} in sync  |  ✗ {} failed",
        summary.uploaded, summary.downloaded, summary.skipped, summary.failed
    );
    println!("{}", "=".repeat(60));

    if !summary.has_failures() {
        return;
    }

    println!("\nFailures:");
    for report in reports {
        if let Some(err) = &report.error {
            println!("  {}: {}", report.game_name, err);
        }
        for file in report.failures() {
            println!(
                "  {}/{}: {}",
                report.game_name,
                file.file_name,
                file.error.as_deref().unwrap_or_default()
            );
        }
    }
}
