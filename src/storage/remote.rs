use super::{normalize_name, Storage, StoreResult, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::core::scanner::GlobPattern;
use crate::core::FileState;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metakey, Operator};
use std::time::Duration;

/// 远程存储（基于 OpenDAL，支持 S3 / WebDAV / 同步文件夹）
///
/// 对象存储无法指定修改时间，写入后的时间戳以服务端为准。
pub struct RemoteStorage {
    operator: Operator,
    name: String,
    /// 写入前是否需要逐级创建父目录（WebDAV）
    create_parents: bool,
    /// 根目录是否需要显式创建（S3 没有目录概念）
    create_root: bool,
}

impl RemoteStorage {
    pub fn s3(
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        endpoint: Option<String>,
        prefix: &str,
    ) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default()
            .bucket(bucket)
            .region(region)
            .access_key_id(access_key)
            .secret_access_key(secret_key)
            .root(prefix);

        if let Some(ref ep) = endpoint {
            builder = builder.endpoint(ep);
        }

        let operator = Self::with_timeout(Operator::new(builder)?.finish());
        let name = format!("s3://{}{}", bucket, prefix.trim_end_matches('/'));

        Ok(Self {
            operator,
            name,
            create_parents: false,
            create_root: false,
        })
    }

    pub fn webdav(endpoint: &str, username: &str, password: &str, root: &str) -> Result<Self> {
        use opendal::services::Webdav;

        let builder = Webdav::default()
            .endpoint(endpoint)
            .username(username)
            .password(password)
            .root(root);

        let operator = Self::with_timeout(Operator::new(builder)?.finish());
        let name = format!(
            "webdav://{}{}",
            endpoint.trim_end_matches('/'),
            root.trim_end_matches('/')
        );

        Ok(Self {
            operator,
            name,
            create_parents: true,
            create_root: true,
        })
    }

    /// 同步文件夹（Google Drive / Dropbox / OneDrive 客户端目录等）
    pub fn fs(root: &str) -> Result<Self> {
        use opendal::services::Fs;

        let operator = Operator::new(Fs::default().root(root))?.finish();
        let name = format!("fs://{}", root);

        Ok(Self {
            operator,
            name,
            create_parents: false,
            create_root: true,
        })
    }

    fn with_timeout(operator: Operator) -> Operator {
        operator.layer(
            TimeoutLayer::default()
                .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
        )
    }

    /// 递归创建父目录（WebDAV 服务器不会自动创建）
    async fn create_parent_dirs(&self, path: &str) {
        let Some((parent, _)) = path.rsplit_once('/') else {
            return;
        };

        let mut current_path = String::new();
        for part in parent.split('/').filter(|s| !s.is_empty()) {
            current_path.push_str(part);
            current_path.push('/');
            // 忽略创建目录的错误（可能已存在）
            let _ = self.operator.create_dir(&current_path).await;
        }
    }
}

#[async_trait]
impl Storage for RemoteStorage {
    async fn stat(&self, name: &str) -> StoreResult<FileState> {
        let path = normalize_name(name);
        match self.operator.stat(&path).await {
            Ok(meta) if meta.is_dir() => Err(opendal::Error::new(
                opendal::ErrorKind::IsADirectory,
                "expected a file but found a directory",
            )
            .into()),
            Ok(meta) => Ok(match meta.last_modified() {
                Some(t) => FileState::present(t),
                None => FileState::present_without_time(),
            }),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(FileState::missing()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, name: &str) -> StoreResult<Vec<u8>> {
        let data = self.operator.read(&normalize_name(name)).await?;
        Ok(data.to_vec())
    }

    async fn write(
        &self,
        name: &str,
        data: Vec<u8>,
        _modified_at: Option<DateTime<Utc>>,
    ) -> StoreResult<FileState> {
        let path = normalize_name(name);

        if self.create_parents {
            self.create_parent_dirs(&path).await;
        }

        self.operator.write(&path, data).await?;
        self.stat(&path).await
    }

    async fn list(&self, pattern: &GlobPattern) -> StoreResult<Vec<String>> {
        let lister = self
            .operator
            .lister_with("/")
            .recursive(pattern.is_recursive())
            .metakey(Metakey::Mode)
            .await;

        let mut lister = match lister {
            Ok(l) => l,
            // 根目录尚不存在
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = lister.try_next().await? {
            let path = entry.path().trim_start_matches('/');

            // 跳过根目录和子目录
            if path.is_empty() || path.ends_with('/') || entry.metadata().is_dir() {
                continue;
            }

            if pattern.matches(path) {
                names.push(path.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn ensure_container(&self) -> StoreResult<()> {
        if self.create_root {
            self.operator.create_dir("/").await?;
        }
        // 顺便检测连通性与凭据
        self.operator.check().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
