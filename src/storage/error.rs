//! 存储错误类型

use thiserror::Error;

/// 存储操作错误
///
/// "文件不存在" 不是错误：`stat` 用 `FileState::missing()` 表示，不会走到这里。
#[derive(Debug, Error)]
pub enum StoreError {
    /// 本地文件系统 IO 错误（权限、磁盘等）
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 远程后端返回的普通错误（单个文件范围）
    #[error("存储后端错误: {0}")]
    Backend(#[source] opendal::Error),

    /// 认证失败（凭据无效或权限被拒绝）
    #[error("认证失败: {0}")]
    Auth(String),

    /// 存储不可达（网络、配置错误等）
    #[error("存储不可用: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// 是否应中止整个游戏的同步（而不仅是当前文件）
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Auth(_) | StoreError::Unavailable(_))
    }
}

impl From<opendal::Error> for StoreError {
    fn from(e: opendal::Error) -> Self {
        match e.kind() {
            opendal::ErrorKind::PermissionDenied => StoreError::Auth(e.to_string()),
            opendal::ErrorKind::ConfigInvalid => StoreError::Unavailable(e.to_string()),
            _ if e.is_temporary() => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Backend(e),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
