//! 应用配置模块

use crate::core::{SyncConfig, SyncSpec};
use crate::logging::LogConfig;
use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

/// 存储类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// 本地同步文件夹（直接文件系统访问，保留修改时间）
    Local,
    /// 通过 OpenDAL fs 服务访问的文件夹
    Fs,
    S3,
    WebDav,
}

/// 远程存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub typ: StorageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webdav_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl StorageConfig {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            typ: StorageType::Local,
            path: Some(path.into()),
            bucket: None,
            region: None,
            access_key: None,
            secret_key: None,
            endpoint: None,
            webdav_endpoint: None,
            username: None,
            password: None,
            root: None,
        }
    }

    /// 用于显示的远程位置描述（不包含凭据）
    pub fn describe(&self, sub_path: &str) -> String {
        match self.typ {
            StorageType::Local | StorageType::Fs => {
                let base = self.path.as_deref().unwrap_or("");
                format!("{}/{}", base.trim_end_matches(['/', '\\']), sub_path)
            }
            StorageType::S3 => format!(
                "s3://{}/{}",
                self.bucket.as_deref().unwrap_or(""),
                join_display(self.root.as_deref(), sub_path)
            ),
            StorageType::WebDav => format!(
                "{}/{}",
                self.webdav_endpoint.as_deref().unwrap_or("").trim_end_matches('/'),
                join_display(self.root.as_deref(), sub_path)
            ),
        }
    }
}

fn join_display(root: Option<&str>, sub_path: &str) -> String {
    match root.map(|r| r.trim_matches('/')).filter(|r| !r.is_empty()) {
        Some(r) => format!("{}/{}", r, sub_path),
        None => sub_path.to_string(),
    }
}

/// 单个游戏配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 各平台的本地存档目录，键为 macos / windows / linux
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
    /// 显式指定的本地存档目录，优先于 `paths`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    /// 存档文件名，支持 glob 模式
    pub save_files: Vec<String>,
    /// 远程存储中的目录
    pub cloud_folder: String,
}

fn default_enabled() -> bool {
    true
}

impl GameConfig {
    /// 获取当前平台的本地存档目录（已展开 ~ 和环境变量）
    pub fn local_path_for(&self, platform: &str) -> Option<PathBuf> {
        if let Some(ref p) = self.local_path {
            return Some(expand_path(p));
        }

        let platform = normalize_platform(platform);
        self.paths
            .iter()
            .find(|(k, _)| normalize_platform(k) == platform)
            .map(|(_, v)| expand_path(v))
    }
}

fn normalize_platform(name: &str) -> String {
    match name.to_lowercase().as_str() {
        "darwin" | "macos" | "osx" => "macos".to_string(),
        "win" | "win32" | "windows" => "windows".to_string(),
        other => other.to_string(),
    }
}

/// 当前平台名
pub fn current_platform() -> &'static str {
    std::env::consts::OS
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// 远程存储
    pub remote: StorageConfig,
    /// 游戏名 -> 配置
    #[serde(default)]
    pub games: BTreeMap<String, GameConfig>,
    /// 持续模式下的同步间隔（分钟）
    #[serde(default = "default_sync_interval_minutes")]
    pub sync_interval_minutes: u64,
    /// 时间容差（毫秒）
    #[serde(default = "default_skew_tolerance_ms")]
    pub skew_tolerance_ms: u64,
    /// 单个游戏内并发处理的文件数
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_sync_interval_minutes() -> u64 {
    5
}

fn default_skew_tolerance_ms() -> u64 {
    1000
}

fn default_max_concurrent_files() -> usize {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut games = BTreeMap::new();
        games.insert(
            "Hollow Knight".to_string(),
            GameConfig {
                enabled: true,
                paths: BTreeMap::from([
                    (
                        "macos".to_string(),
                        "~/Library/Application Support/unity.Team Cherry.Hollow Knight".to_string(),
                    ),
                    (
                        "windows".to_string(),
                        "%USERPROFILE%/AppData/LocalLow/Team Cherry/Hollow Knight".to_string(),
                    ),
                    (
                        "linux".to_string(),
                        "~/.config/unity3d/Team Cherry/Hollow Knight".to_string(),
                    ),
                ]),
                local_path: None,
                save_files: default_save_files(),
                cloud_folder: "GameSaves/HollowKnight".to_string(),
            },
        );
        games.insert(
            "Hollow Knight Silksong".to_string(),
            GameConfig {
                enabled: true,
                paths: BTreeMap::from([
                    (
                        "macos".to_string(),
                        "~/Library/Application Support/unity.Team-Cherry.Silksong".to_string(),
                    ),
                    (
                        "windows".to_string(),
                        "%USERPROFILE%/AppData/LocalLow/Team Cherry/Hollow Knight Silksong"
                            .to_string(),
                    ),
                ]),
                local_path: None,
                save_files: default_save_files(),
                cloud_folder: "GameSaves/HollowKnightSilksong".to_string(),
            },
        );

        Self {
            remote: StorageConfig::local("~/CloudSaves"),
            games,
            sync_interval_minutes: default_sync_interval_minutes(),
            skew_tolerance_ms: default_skew_tolerance_ms(),
            max_concurrent_files: default_max_concurrent_files(),
            log: LogConfig::default(),
        }
    }
}

fn default_save_files() -> Vec<String> {
    (1..=4).map(|i| format!("user{}.dat", i)).collect()
}

impl AppConfig {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        crate::dirs::config_dir()
            .map(|p| p.join("savesync"))
            .unwrap_or_else(|| PathBuf::from(".savesync"))
            .join("config.json")
    }

    /// 从配置文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("配置文件格式错误: {}", path.display()))?;
        Ok(config)
    }

    /// 加载配置，文件不存在时写入默认配置；返回值第二项表示是否新建
    pub fn load_or_create(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }

        let config = Self::default();
        config.save(path)?;
        Ok((config, true))
    }

    /// 保存配置
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("无法写入配置文件: {}", path.display()))?;
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            skew_tolerance: Duration::from_millis(self.skew_tolerance_ms),
            max_concurrent_files: self.max_concurrent_files.max(1),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_minutes.max(1).saturating_mul(60))
    }

    /// 查找游戏（名称不区分大小写）
    pub fn find_game(&self, name: &str) -> Option<(&String, &GameConfig)> {
        self.games.iter().find(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// 生成当前平台下需要同步的游戏定义
    ///
    /// `only` 非空时只包含指定的游戏。缺少本平台路径的游戏会被跳过。
    pub fn sync_specs(&self, platform: &str, only: &[String]) -> Vec<SyncSpec> {
        self.games
            .iter()
            .filter(|(name, _)| only.is_empty() || only.iter().any(|o| o.eq_ignore_ascii_case(name)))
            .filter(|(name, game)| {
                if !game.enabled {
                    debug!("游戏已禁用，跳过: {}", name);
                }
                game.enabled
            })
            .filter_map(|(name, game)| {
                let Some(local_root) = game.local_path_for(platform) else {
                    warn!("{} 没有配置 {} 平台的存档路径，跳过", name, platform);
                    return None;
                };
                Some(SyncSpec {
                    game_name: name.clone(),
                    local_root,
                    remote_root: game.cloud_folder.clone(),
                    patterns: game.save_files.clone(),
                })
            })
            .collect()
    }
}

/// 展开路径中的 `~`、`$VAR`、`${VAR}` 和 `%VAR%`，未定义的变量保持原样
pub fn expand_path(path: &str) -> PathBuf {
    static VAR_RE: OnceLock<Regex> = OnceLock::new();
    let re = VAR_RE.get_or_init(|| {
        Regex::new(r"%([A-Za-z_][A-Za-z0-9_]*)%|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("static regex")
    });

    let path = path.trim().trim_matches(['"', '\'']);
    let expanded = re.replace_all(path, |caps: &Captures| {
        let var = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        std::env::var(var).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned();

    match expanded.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            match crate::dirs::home_dir() {
                Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
                None => PathBuf::from(&expanded),
            }
        }
        _ => PathBuf::from(&expanded),
    }
}
