pub mod error;
pub mod local;
pub mod remote;

use crate::config::{StorageConfig, StorageType};
use crate::core::scanner::GlobPattern;
use crate::core::FileState;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use local::LocalStorage;
pub use remote::RemoteStorage;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 存储抽象接口
///
/// 同步引擎只依赖这个接口，本地与远程是对称的两个实现。
/// 所有名称都是相对于存储根目录的路径，使用 `/` 分隔。
#[async_trait]
pub trait Storage: Send + Sync {
    /// 获取文件状态，文件不存在时返回 `FileState::missing()`
    async fn stat(&self, name: &str) -> StoreResult<FileState>;

    /// 读取整个文件
    async fn read(&self, name: &str) -> StoreResult<Vec<u8>>;

    /// 写入整个文件，返回写入后的文件状态
    ///
    /// `modified_at` 为来源侧的修改时间，能保留修改时间的存储应将其写入。
    async fn write(
        &self,
        name: &str,
        data: Vec<u8>,
        modified_at: Option<DateTime<Utc>>,
    ) -> StoreResult<FileState>;

    /// 修改文件的修改时间，不支持时返回 `Ok(false)`
    async fn set_modified(&self, _name: &str, _modified_at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(false)
    }

    /// 列出与 glob 模式匹配的文件名
    async fn list(&self, pattern: &GlobPattern) -> StoreResult<Vec<String>>;

    /// 确保根目录存在（幂等）
    async fn ensure_container(&self) -> StoreResult<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建存储实例，`sub_path` 为存储根目录下的游戏目录
pub async fn create_storage(config: &StorageConfig, sub_path: &str) -> Result<Arc<dyn Storage>> {
    match config.typ {
        StorageType::Local => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Local storage requires path"))?;
            let base = crate::config::expand_path(path).join(sub_path);
            tracing::info!("初始化本地存储: {}", base.display());
            Ok(Arc::new(LocalStorage::new(base)) as Arc<dyn Storage>)
        }
        StorageType::Fs => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Fs storage requires path"))?;
            let base = crate::config::expand_path(path).join(sub_path);
            tracing::info!("初始化 fs 存储: {}", base.display());
            Ok(Arc::new(RemoteStorage::fs(&base.to_string_lossy())?) as Arc<dyn Storage>)
        }
        StorageType::S3 => {
            let bucket = config
                .bucket
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires bucket"))?;
            let region = config
                .region
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires region"))?;
            let access_key = config
                .access_key
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires accessKey"))?;
            let secret_key = config
                .secret_key
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires secretKey"))?;
            let prefix = join_remote_path(config.root.as_deref(), sub_path);
            tracing::info!("初始化S3存储: bucket={}, region={}, prefix={}", bucket, region, prefix);
            Ok(Arc::new(RemoteStorage::s3(
                bucket,
                region,
                access_key,
                secret_key,
                config.endpoint.clone(),
                &prefix,
            )?) as Arc<dyn Storage>)
        }
        StorageType::WebDav => {
            let endpoint = config
                .webdav_endpoint
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("WebDAV storage requires webdavEndpoint"))?;
            let username = config
                .username
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("WebDAV storage requires username"))?;
            let password = config
                .password
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("WebDAV storage requires password"))?;
            let root = join_remote_path(config.root.as_deref(), sub_path);
            tracing::info!("创建WebDAV存储: endpoint={}, root={}", endpoint, root);
            Ok(Arc::new(RemoteStorage::webdav(endpoint, username, password, &root)?)
                as Arc<dyn Storage>)
        }
    }
}

/// 拼接远程根路径，结果形如 `/a/b/`
fn join_remote_path(root: Option<&str>, sub_path: &str) -> String {
    let parts: Vec<&str> = root
        .unwrap_or("")
        .split(['/', '\\'])
        .chain(sub_path.split(['/', '\\']))
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", parts.join("/"))
    }
}

/// 规范化文件名（统一使用 /，去掉开头的分隔符）
pub(crate) fn normalize_name(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path(None, ""), "/");
        assert_eq!(join_remote_path(None, "GameSaves/HollowKnight"), "/GameSaves/HollowKnight/");
        assert_eq!(join_remote_path(Some("/backup/"), "GameSaves\\Silksong"), "/backup/GameSaves/Silksong/");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("\\saves\\user1.dat"), "saves/user1.dat");
        assert_eq!(normalize_name("user1.dat"), "user1.dat");
    }
}
