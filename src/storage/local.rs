use super::{normalize_name, Storage, StoreError, StoreResult};
use crate::core::scanner::GlobPattern;
use crate::core::FileState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use walkdir::WalkDir;

/// 本地文件系统存储
///
/// 根目录不存在时不会主动创建：首次在新机器上运行时本地目录为空属于正常情况，
/// 所有文件都视为不存在，写入时再按需创建目录。
pub struct LocalStorage {
    base_path: PathBuf,
    name: String,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let base_path = path.into();
        let name = format!("local:{}", base_path.display());
        Self { base_path, name }
    }

    fn resolve_path(&self, name: &str) -> PathBuf {
        let name = normalize_name(name);
        if name.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(name)
        }
    }

    fn to_state(modified: std::io::Result<SystemTime>) -> FileState {
        match modified {
            Ok(t) => FileState::present(DateTime::<Utc>::from(t)),
            Err(_) => FileState::present_without_time(),
        }
    }

    /// 修改文件的 mtime（阻塞调用）
    fn set_mtime(path: &Path, modified_at: DateTime<Utc>) -> std::io::Result<()> {
        let file = std::fs::OpenOptions::new().write(true).open(path)?;
        file.set_modified(SystemTime::from(modified_at))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn stat(&self, name: &str) -> StoreResult<FileState> {
        let full_path = self.resolve_path(name);

        match fs::metadata(&full_path).await {
            Ok(metadata) if metadata.is_dir() => Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("{} 是目录而不是文件", full_path.display()),
            ))),
            Ok(metadata) => Ok(Self::to_state(metadata.modified())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileState::missing()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, name: &str) -> StoreResult<Vec<u8>> {
        let data = fs::read(self.resolve_path(name)).await?;
        Ok(data)
    }

    async fn write(
        &self,
        name: &str,
        data: Vec<u8>,
        modified_at: Option<DateTime<Utc>>,
    ) -> StoreResult<FileState> {
        let full_path = self.resolve_path(name);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // 使用临时文件写入，然后原子重命名
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = full_path.with_file_name(format!(
            ".{}.{}.tmp",
            file_name,
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(t) = modified_at {
            let path = temp_path.clone();
            let result = tokio::task::spawn_blocking(move || Self::set_mtime(&path, t))
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            if let Err(e) = result {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
        }

        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        self.stat(name).await
    }

    async fn set_modified(&self, name: &str, modified_at: DateTime<Utc>) -> StoreResult<bool> {
        let full_path = self.resolve_path(name);
        tokio::task::spawn_blocking(move || Self::set_mtime(&full_path, modified_at))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
        Ok(true)
    }

    async fn list(&self, pattern: &GlobPattern) -> StoreResult<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let base = self.base_path.clone();
        let pattern = pattern.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let names = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
            let mut walker = WalkDir::new(&base).follow_links(false).min_depth(1);
            if !pattern.is_recursive() {
                walker = walker.max_depth(1);
            }

            let mut names = Vec::new();
            for entry in walker {
                let entry = entry.map_err(std::io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&base) else {
                    continue;
                };
                let name = normalize_name(&relative.to_string_lossy());
                // 跳过写入过程中残留的临时文件
                if name.rsplit('/').next().is_some_and(|n| n.starts_with('.') && n.ends_with(".tmp")) {
                    continue;
                }
                if pattern.matches(&name) {
                    names.push(name);
                }
            }
            names.sort();
            Ok(names)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        Ok(names)
    }

    async fn ensure_container(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
