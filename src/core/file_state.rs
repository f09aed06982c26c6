//! 文件状态 - 每次同步时从存储实时查询，不做持久化

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 文件所在的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

/// 逻辑文件标识（名称 + 所在侧）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    pub name: String,
    pub side: Side,
}

impl FileRef {
    pub fn new(name: impl Into<String>, side: Side) -> Self {
        Self {
            name: name.into(),
            side,
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.side, self.name)
    }
}

/// 某一侧的文件状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileState {
    pub exists: bool,
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileState {
    pub fn missing() -> Self {
        Self {
            exists: false,
            modified_at: None,
        }
    }

    pub fn present(modified_at: DateTime<Utc>) -> Self {
        Self {
            exists: true,
            modified_at: Some(modified_at),
        }
    }

    /// 存在但后端未提供修改时间
    pub fn present_without_time() -> Self {
        Self {
            exists: true,
            modified_at: None,
        }
    }
}

/// 格式化时间戳用于显示
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(t) => t
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "Never".to_string(),
    }
}
