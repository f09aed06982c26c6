use crate::core::file_state::{format_timestamp, FileRef, FileState, Side};
use crate::core::reconciler::{Decision, DecisionReason, Reconciler, SyncAction, DEFAULT_SKEW_TOLERANCE};
use crate::core::scanner::FileScanner;
use crate::storage::{Storage, StoreError};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// 单个游戏的同步定义，一次运行期间不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSpec {
    pub game_name: String,
    pub local_root: PathBuf,
    pub remote_root: String,
    /// 字面文件名或 glob 模式
    pub patterns: Vec<String>,
}

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 时间容差
    pub skew_tolerance: Duration,
    /// 单个游戏内并发处理的文件数，1 表示顺序执行
    pub max_concurrent_files: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            skew_tolerance: DEFAULT_SKEW_TOLERANCE,
            max_concurrent_files: 1,
        }
    }
}

/// 中止整个游戏同步的错误
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameError {
    #[error("无法创建远程目录 {store}: {message}")]
    ContainerCreation { store: String, message: String },

    #[error("无效的文件模式 {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("{side} 存储不可用 ({store}): {message}")]
    StoreUnavailable {
        side: Side,
        store: String,
        message: String,
    },
}

/// 单个文件的处理结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub file_name: String,
    /// 状态查询失败时为空
    pub action: Option<SyncAction>,
    pub reason: Option<DecisionReason>,
    pub local: Option<FileState>,
    pub remote: Option<FileState>,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// 用于显示的一行描述
    pub fn describe(&self) -> String {
        if let Some(err) = &self.error {
            let action = self.action.map(|a| a.to_string()).unwrap_or_else(|| "stat".to_string());
            return format!("✗ {} failed: {}", action, err);
        }

        let local_time = self.local.and_then(|s| s.modified_at);
        let remote_time = self.remote.and_then(|s| s.modified_at);
        match (self.action, self.reason) {
            (Some(SyncAction::Upload), Some(reason)) => {
                format!("↑ uploaded ({}, local {})", reason, format_timestamp(local_time))
            }
            (Some(SyncAction::Download), Some(reason)) => {
                format!("↓ downloaded ({}, remote {})", reason, format_timestamp(remote_time))
            }
            (_, Some(DecisionReason::InSync)) => {
                format!("✓ in sync ({})", format_timestamp(local_time))
            }
            (_, Some(reason)) => format!("- skipped ({})", reason),
            _ => "- skipped".to_string(),
        }
    }
}

/// 单个游戏的同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub game_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub uploaded: u32,
    pub downloaded: u32,
    pub skipped: u32,
    pub failed: u32,
    pub files: Vec<FileOutcome>,
    /// 游戏级错误（该游戏的同步被中止）
    pub error: Option<GameError>,
}

impl SyncReport {
    fn new(game_name: &str) -> Self {
        let now = Utc::now();
        Self {
            game_name: game_name.to_string(),
            start_time: now,
            end_time: now,
            uploaded: 0,
            downloaded: 0,
            skipped: 0,
            failed: 0,
            files: Vec::new(),
            error: None,
        }
    }

    /// 创建一个在开始前就失败的报告（例如存储无法初始化）
    pub fn failed(game_name: &str, error: GameError) -> Self {
        let mut report = Self::new(game_name);
        report.error = Some(error);
        report
    }

    fn record(&mut self, outcome: FileOutcome) {
        if outcome.is_failed() {
            self.failed += 1;
        } else {
            match outcome.action {
                Some(SyncAction::Upload) => self.uploaded += 1,
                Some(SyncAction::Download) => self.downloaded += 1,
                Some(SyncAction::NoOp) | None => self.skipped += 1,
            }
        }
        self.files.push(outcome);
    }

    fn finish(mut self) -> Self {
        self.end_time = Utc::now();
        self
    }

    /// 是否存在失败（文件级或游戏级）
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.error.is_some()
    }

    /// 实际传输的文件数
    pub fn transferred(&self) -> u32 {
        self.uploaded + self.downloaded
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.is_failed())
    }
}

/// 单个文件的执行结果
struct FileResult {
    outcome: FileOutcome,
    /// 致命错误，需要中止游戏同步
    fatal: Option<GameError>,
}

/// 同步执行器
///
/// 每次运行都重新查询两侧状态，不在多次运行之间保留任何状态。
pub struct SyncRunner {
    config: SyncConfig,
    reconciler: Reconciler,
}

impl SyncRunner {
    pub fn new(config: SyncConfig) -> Self {
        let reconciler = Reconciler::new(config.skew_tolerance);
        Self { config, reconciler }
    }

    /// 同步单个游戏
    pub async fn run(
        &self,
        spec: &SyncSpec,
        local: &dyn Storage,
        remote: &dyn Storage,
    ) -> SyncReport {
        let mut report = SyncReport::new(&spec.game_name);

        info!(
            "开始同步: {} (local={}, remote={})",
            spec.game_name,
            spec.local_root.display(),
            spec.remote_root
        );

        // 1. 确保远程目录存在
        if let Err(e) = remote.ensure_container().await {
            error!("创建远程目录失败: {}: {}", remote.name(), e);
            report.error = Some(GameError::ContainerCreation {
                store: remote.name().to_string(),
                message: e.to_string(),
            });
            return report.finish();
        }

        // 2. 展开文件模式
        let scanner = match FileScanner::new(&spec.patterns) {
            Ok(s) => s,
            Err(e) => {
                error!("文件模式无效: {}", e);
                report.error = Some(GameError::InvalidPattern {
                    pattern: spec.patterns.join(","),
                    message: e.to_string(),
                });
                return report.finish();
            }
        };

        if !spec.local_root.exists() {
            // 新机器上首次运行的正常情况
            info!(
                "本地存档目录不存在: {}，将检查远程存档",
                spec.local_root.display()
            );
        }

        let tracked = match scanner.expand(local, remote).await {
            Ok(t) => t,
            Err(e) => {
                let store = match e.side {
                    Side::Local => local.name(),
                    Side::Remote => remote.name(),
                };
                error!("列出文件失败: {} ({}): {}", store, e.pattern, e.source);
                report.error = Some(GameError::StoreUnavailable {
                    side: e.side,
                    store: store.to_string(),
                    message: e.source.to_string(),
                });
                return report.finish();
            }
        };

        if tracked.is_empty() {
            info!("未找到存档文件: {}", spec.patterns.join(", "));
            return report.finish();
        }

        // 3. 逐个文件协调
        let aborted = AtomicBool::new(false);
        let names = tracked.sorted();
        let mut results = futures::stream::iter(names)
            .map(|name| self.sync_file(name, local, remote, &aborted))
            .buffered(self.config.max_concurrent_files.max(1));

        while let Some(result) = results.next().await {
            let Some(result) = result else {
                continue;
            };
            if let Some(fatal) = result.fatal {
                if report.error.is_none() {
                    report.error = Some(fatal);
                }
            }
            report.record(result.outcome);
        }

        let report = report.finish();
        info!(
            "同步完成: {} (↑ {} | ↓ {} | ✓ {} | ✗ {})",
            spec.game_name, report.uploaded, report.downloaded, report.skipped, report.failed
        );
        report
    }

    /// 处理单个文件，游戏已中止时返回 None
    async fn sync_file(
        &self,
        name: String,
        local: &dyn Storage,
        remote: &dyn Storage,
        aborted: &AtomicBool,
    ) -> Option<FileResult> {
        if aborted.load(Ordering::SeqCst) {
            debug!("游戏同步已中止，跳过: {}", name);
            return None;
        }

        let local_state = match local.stat(&name).await {
            Ok(s) => s,
            Err(e) => return Some(Self::stat_failed(name, Side::Local, local, e, aborted)),
        };
        let remote_state = match remote.stat(&name).await {
            Ok(s) => s,
            Err(e) => return Some(Self::stat_failed(name, Side::Remote, remote, e, aborted)),
        };

        let Decision { action, reason } = self.reconciler.decide(&local_state, &remote_state);
        debug!("{}: {} ({})", name, action, reason);

        let result = match action {
            SyncAction::Upload => {
                let src = FileRef::new(name.as_str(), Side::Local);
                self.transfer(&src, local, remote, &local_state).await
            }
            SyncAction::Download => {
                let src = FileRef::new(name.as_str(), Side::Remote);
                self.transfer(&src, remote, local, &remote_state).await
            }
            SyncAction::NoOp => Ok(()),
        };

        let mut outcome = FileOutcome {
            file_name: name,
            action: Some(action),
            reason: Some(reason),
            local: Some(local_state),
            remote: Some(remote_state),
            error: None,
        };

        let mut fatal = None;
        match result {
            Ok(()) if action != SyncAction::NoOp => {
                info!("{}: {} 成功 ({})", outcome.file_name, action, reason);
            }
            Ok(()) => {}
            Err((side, e)) => {
                error!("{}: {} 失败 ({}): {}", outcome.file_name, action, side, e);
                if e.is_fatal() {
                    aborted.store(true, Ordering::SeqCst);
                    let store = match side {
                        Side::Local => local.name(),
                        Side::Remote => remote.name(),
                    };
                    fatal = Some(GameError::StoreUnavailable {
                        side,
                        store: store.to_string(),
                        message: e.to_string(),
                    });
                }
                outcome.error = Some(e.to_string());
            }
        }

        Some(FileResult { outcome, fatal })
    }

    fn stat_failed(
        name: String,
        side: Side,
        storage: &dyn Storage,
        e: StoreError,
        aborted: &AtomicBool,
    ) -> FileResult {
        error!("获取文件状态失败: {} ({}): {}", name, storage.name(), e);

        let fatal = if e.is_fatal() {
            aborted.store(true, Ordering::SeqCst);
            Some(GameError::StoreUnavailable {
                side,
                store: storage.name().to_string(),
                message: e.to_string(),
            })
        } else {
            None
        };

        FileResult {
            outcome: FileOutcome {
                file_name: name,
                action: None,
                reason: None,
                local: None,
                remote: None,
                error: Some(e.to_string()),
            },
            fatal,
        }
    }

    /// 复制文件并对齐两侧时间戳
    ///
    /// 失败时返回出错的一侧：读取失败归于来源，写入失败归于目标。
    async fn transfer(
        &self,
        src: &FileRef,
        from: &dyn Storage,
        to: &dyn Storage,
        src_state: &FileState,
    ) -> Result<(), (Side, StoreError)> {
        let data = from.read(&src.name).await.map_err(|e| (src.side, e))?;
        let size = data.len();
        let written = to
            .write(&src.name, data, src_state.modified_at)
            .await
            .map_err(|e| (src.side.opposite(), e))?;
        debug!(
            "已复制 {} 字节: {} ({}) -> {}",
            size,
            src.name,
            from.name(),
            to.name()
        );

        // 目标存储无法保留修改时间时，把来源的时间对齐到目标，保证下次运行为 NoOp
        if let (Some(src_time), Some(dst_time)) = (src_state.modified_at, written.modified_at) {
            let drift = self
                .reconciler
                .decide(&FileState::present(src_time), &FileState::present(dst_time));
            if drift.action != SyncAction::NoOp {
                match from.set_modified(&src.name, dst_time).await {
                    Ok(true) => debug!("已对齐 {} 的修改时间: {}", src, dst_time),
                    Ok(false) => warn!(
                        "{} 不支持修改时间，{} 下次同步可能被反向复制",
                        from.name(),
                        src.name
                    ),
                    Err(e) => warn!("对齐 {} 的修改时间失败: {}", src.name, e),
                }
            }
        }

        Ok(())
    }
}

impl Default for SyncRunner {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::GlobPattern;
    use crate::storage::{LocalStorage, StoreResult};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// 内存存储，用于驱动同步场景
    struct MemoryStorage {
        name: String,
        files: Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
        /// 写入时保留来源修改时间；否则使用当前时间（模拟对象存储）
        pin_mtime: bool,
        fail_writes: HashSet<String>,
        fail_stats: HashSet<String>,
        fail_container: bool,
        auth_failure: bool,
        /// 读取时返回认证错误（stat 和 list 正常）
        read_auth_failure: bool,
        writes: AtomicUsize,
    }

    impl MemoryStorage {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                files: Mutex::new(BTreeMap::new()),
                pin_mtime: true,
                fail_writes: HashSet::new(),
                fail_stats: HashSet::new(),
                fail_container: false,
                auth_failure: false,
                read_auth_failure: false,
                writes: AtomicUsize::new(0),
            }
        }

        fn with_file(self, name: &str, data: &[u8], modified: DateTime<Utc>) -> Self {
            self.files
                .lock()
                .unwrap()
                .insert(name.to_string(), (data.to_vec(), modified));
            self
        }

        fn content(&self, name: &str) -> Option<Vec<u8>> {
            self.files.lock().unwrap().get(name).map(|(d, _)| d.clone())
        }

        fn modified(&self, name: &str) -> Option<DateTime<Utc>> {
            self.files.lock().unwrap().get(name).map(|(_, t)| *t)
        }

        fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Storage for MemoryStorage {
        async fn stat(&self, name: &str) -> StoreResult<FileState> {
            if self.auth_failure {
                return Err(StoreError::Auth("token expired".to_string()));
            }
            if self.fail_stats.contains(name) {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "simulated stat failure",
                )));
            }
            Ok(match self.files.lock().unwrap().get(name) {
                Some((_, t)) => FileState::present(*t),
                None => FileState::missing(),
            })
        }

        async fn read(&self, name: &str) -> StoreResult<Vec<u8>> {
            if self.read_auth_failure {
                return Err(StoreError::Auth("token expired".to_string()));
            }
            self.content(name).ok_or_else(|| {
                StoreError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, name.to_string()))
            })
        }

        async fn write(
            &self,
            name: &str,
            data: Vec<u8>,
            modified_at: Option<DateTime<Utc>>,
        ) -> StoreResult<FileState> {
            if self.fail_writes.contains(name) {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "simulated write failure",
                )));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            let t = match (self.pin_mtime, modified_at) {
                (true, Some(t)) => t,
                _ => Utc::now(),
            };
            self.files.lock().unwrap().insert(name.to_string(), (data, t));
            Ok(FileState::present(t))
        }

        async fn set_modified(&self, name: &str, modified_at: DateTime<Utc>) -> StoreResult<bool> {
            if !self.pin_mtime {
                return Ok(false);
            }
            if let Some(entry) = self.files.lock().unwrap().get_mut(name) {
                entry.1 = modified_at;
            }
            Ok(true)
        }

        async fn list(&self, pattern: &GlobPattern) -> StoreResult<Vec<String>> {
            if self.auth_failure {
                return Err(StoreError::Auth("token expired".to_string()));
            }
            Ok(self
                .files
                .lock()
                .unwrap()
                .keys()
                .filter(|k| pattern.matches(k))
                .cloned()
                .collect())
        }

        async fn ensure_container(&self) -> StoreResult<()> {
            if self.fail_container {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only drive",
                )));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn spec(patterns: &[&str]) -> SyncSpec {
        SyncSpec {
            game_name: "Hollow Knight".to_string(),
            local_root: PathBuf::from("/nonexistent/savesync-test"),
            remote_root: "GameSaves/HollowKnight".to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_local_only_file_is_uploaded() {
        let local = MemoryStorage::new("local").with_file("save1.dat", b"local", at(0));
        let remote = MemoryStorage::new("remote");

        let report = SyncRunner::default().run(&spec(&["save1.dat"]), &local, &remote).await;

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.downloaded, 0);
        assert!(!report.has_failures());
        assert_eq!(remote.content("save1.dat").unwrap(), b"local");
        assert_eq!(remote.modified("save1.dat"), Some(at(0)));
    }

    #[tokio::test]
    async fn test_newer_remote_is_downloaded() {
        let local = MemoryStorage::new("local").with_file("save1.dat", b"old", at(0));
        let remote = MemoryStorage::new("remote").with_file("save1.dat", b"new", at(10));

        let report = SyncRunner::default().run(&spec(&["*.dat"]), &local, &remote).await;

        assert_eq!(report.downloaded, 1);
        assert_eq!(local.content("save1.dat").unwrap(), b"new");
        assert_eq!(report.files[0].reason, Some(DecisionReason::RemoteNewer));
    }

    #[tokio::test]
    async fn test_within_tolerance_mutates_nothing() {
        let remote_time = at(0);
        let local_time = remote_time + chrono::Duration::milliseconds(500);
        let local = MemoryStorage::new("local").with_file("save1.dat", b"a", local_time);
        let remote = MemoryStorage::new("remote").with_file("save1.dat", b"b", remote_time);

        let report = SyncRunner::default().run(&spec(&["save1.dat"]), &local, &remote).await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.transferred(), 0);
        assert_eq!(local.write_count(), 0);
        assert_eq!(remote.write_count(), 0);
        assert_eq!(local.content("save1.dat").unwrap(), b"a");
        assert_eq!(remote.content("save1.dat").unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_missing_local_root_downloads_all() {
        let dir = tempfile::tempdir().unwrap();
        let local_root = dir.path().join("never-played");
        let remote_root = dir.path().join("cloud");

        let remote = LocalStorage::new(&remote_root);
        remote.write("user1.dat", b"one".to_vec(), Some(at(0))).await.unwrap();
        remote.write("user2.dat", b"two".to_vec(), Some(at(5))).await.unwrap();
        let local = LocalStorage::new(&local_root);

        let mut spec = spec(&["*.dat"]);
        spec.local_root = local_root.clone();
        let report = SyncRunner::default().run(&spec, &local, &remote).await;

        assert!(report.error.is_none());
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(std::fs::read(local_root.join("user1.dat")).unwrap(), b"one");
        assert_eq!(std::fs::read(local_root.join("user2.dat")).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_write_failure_is_isolated_to_one_file() {
        let local = MemoryStorage::new("local")
            .with_file("save1.dat", b"1", at(0))
            .with_file("save2.dat", b"2", at(0));
        let mut remote = MemoryStorage::new("remote");
        remote.fail_writes.insert("save2.dat".to_string());

        let report = SyncRunner::default()
            .run(&spec(&["save2.dat", "save1.dat"]), &local, &remote)
            .await;

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed, 1);
        assert!(report.error.is_none());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file_name, "save2.dat");
        assert_eq!(failures[0].action, Some(SyncAction::Upload));
        assert_eq!(remote.content("save1.dat").unwrap(), b"1");
        assert!(remote.content("save2.dat").is_none());
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let local = MemoryStorage::new("local")
            .with_file("user1.dat", b"l", at(100))
            .with_file("user2.dat", b"l", at(0));
        let remote = MemoryStorage::new("remote")
            .with_file("user2.dat", b"r", at(50))
            .with_file("user3.dat", b"r", at(7));

        let runner = SyncRunner::default();
        let first = runner.run(&spec(&["*.dat"]), &local, &remote).await;
        assert_eq!(first.uploaded, 1);
        assert_eq!(first.downloaded, 2);

        let second = runner.run(&spec(&["*.dat"]), &local, &remote).await;
        assert_eq!(second.transferred(), 0);
        assert_eq!(second.skipped, 3);
    }

    #[tokio::test]
    async fn test_second_run_is_noop_when_remote_sets_its_own_time() {
        let local = MemoryStorage::new("local").with_file("user1.dat", b"l", at(0));
        let mut remote = MemoryStorage::new("remote");
        remote.pin_mtime = false;

        let runner = SyncRunner::default();
        let first = runner.run(&spec(&["user1.dat"]), &local, &remote).await;
        assert_eq!(first.uploaded, 1);
        // 本地时间已对齐到远程写入时间
        assert_eq!(local.modified("user1.dat"), remote.modified("user1.dat"));

        let second = runner.run(&spec(&["user1.dat"]), &local, &remote).await;
        assert_eq!(second.transferred(), 0);
    }

    #[tokio::test]
    async fn test_absent_literal_is_skipped_not_failed() {
        let local = MemoryStorage::new("local");
        let remote = MemoryStorage::new("remote");

        let report = SyncRunner::default().run(&spec(&["user4.dat"]), &local, &remote).await;

        assert_eq!(report.skipped, 1);
        assert!(!report.has_failures());
        assert_eq!(report.files[0].reason, Some(DecisionReason::AbsentBothSides));
    }

    #[tokio::test]
    async fn test_container_failure_aborts_game() {
        let local = MemoryStorage::new("local").with_file("save1.dat", b"1", at(0));
        let mut remote = MemoryStorage::new("remote");
        remote.fail_container = true;

        let report = SyncRunner::default().run(&spec(&["save1.dat"]), &local, &remote).await;

        assert!(matches!(report.error, Some(GameError::ContainerCreation { .. })));
        assert!(report.files.is_empty());
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_aborts_game() {
        let local = MemoryStorage::new("local").with_file("save1.dat", b"1", at(0));
        let mut remote = MemoryStorage::new("remote");
        remote.auth_failure = true;

        let report = SyncRunner::default()
            .run(&spec(&["save1.dat", "save2.dat"]), &local, &remote)
            .await;

        assert!(matches!(
            report.error,
            Some(GameError::StoreUnavailable { side: Side::Remote, .. })
        ));
        // 第一个文件失败后不再处理后续文件
        assert_eq!(report.files.len(), 1);
        assert!(report.has_failures());
    }

    #[tokio::test]
    async fn test_remote_read_auth_failure_blames_remote() {
        let local = MemoryStorage::new("local");
        let mut remote = MemoryStorage::new("remote").with_file("save1.dat", b"r", at(10));
        remote.read_auth_failure = true;

        let report = SyncRunner::default().run(&spec(&["save1.dat"]), &local, &remote).await;

        match &report.error {
            Some(GameError::StoreUnavailable { side, store, .. }) => {
                assert_eq!(*side, Side::Remote);
                assert_eq!(store, "remote");
            }
            other => panic!("unexpected game error: {:?}", other),
        }
        assert_eq!(report.files[0].action, Some(SyncAction::Download));
        assert!(local.content("save1.dat").is_none());
    }

    #[tokio::test]
    async fn test_local_read_auth_failure_blames_local() {
        let mut local = MemoryStorage::new("local").with_file("save1.dat", b"l", at(10));
        local.read_auth_failure = true;
        let remote = MemoryStorage::new("remote");

        let report = SyncRunner::default().run(&spec(&["save1.dat"]), &local, &remote).await;

        assert!(matches!(
            report.error,
            Some(GameError::StoreUnavailable { side: Side::Local, .. })
        ));
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_stat_io_error_fails_only_that_file() {
        let mut local = MemoryStorage::new("local")
            .with_file("save0.dat", b"0", at(0))
            .with_file("save1.dat", b"1", at(0));
        local.fail_stats.insert("save0.dat".to_string());
        let remote = MemoryStorage::new("remote");

        let report = SyncRunner::default()
            .run(&spec(&["save0.dat", "save1.dat"]), &local, &remote)
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.uploaded, 1);
        assert!(report.error.is_none());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures[0].file_name, "save0.dat");
        assert_eq!(failures[0].action, None);
        assert!(failures[0].local.is_none());
        assert_eq!(remote.content("save1.dat").unwrap(), b"1");
        assert!(remote.content("save0.dat").is_none());
    }

    #[tokio::test]
    async fn test_invalid_pattern_aborts_game() {
        let local = MemoryStorage::new("local");
        let remote = MemoryStorage::new("remote");

        let report = SyncRunner::default().run(&spec(&["save[z-a].dat"]), &local, &remote).await;

        assert!(matches!(report.error, Some(GameError::InvalidPattern { .. })));
    }

    #[tokio::test]
    async fn test_report_is_sorted_and_deduplicated() {
        let local = MemoryStorage::new("local")
            .with_file("b.dat", b"", at(0))
            .with_file("a.dat", b"", at(0));
        let remote = MemoryStorage::new("remote")
            .with_file("a.dat", b"", at(0))
            .with_file("c.dat", b"", at(0));

        let report = SyncRunner::default()
            .run(&spec(&["*.dat", "a.dat", "c.dat"]), &local, &remote)
            .await;

        let names: Vec<_> = report.files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.dat", "b.dat", "c.dat"]);
    }

    #[tokio::test]
    async fn test_concurrent_files_keep_order_and_isolation() {
        let mut local = MemoryStorage::new("local");
        for i in 0..8 {
            local = local.with_file(&format!("slot{i}.dat"), b"x", at(i));
        }
        let mut remote = MemoryStorage::new("remote");
        remote.fail_writes.insert("slot3.dat".to_string());

        let runner = SyncRunner::new(SyncConfig {
            max_concurrent_files: 4,
            ..SyncConfig::default()
        });
        let report = runner.run(&spec(&["slot*.dat"]), &local, &remote).await;

        assert_eq!(report.uploaded, 7);
        assert_eq!(report.failed, 1);
        let names: Vec<_> = report.files.iter().map(|f| f.file_name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = SyncReport::failed(
            "Silksong",
            GameError::ContainerCreation {
                store: "s3://bucket".to_string(),
                message: "denied".to_string(),
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["gameName"], "Silksong");
        assert_eq!(json["error"]["kind"], "container_creation");
        assert!(report.has_failures());
    }
}
