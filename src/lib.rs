pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod storage;

pub use config::{AppConfig, GameConfig, StorageConfig, StorageType};
pub use core::{SyncConfig, SyncReport, SyncRunner, SyncSpec};

// 平台目录，避免为两个函数引入 dirs 依赖
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            home_dir().map(|h| h.join("Library").join("Application Support"))
        } else {
            // Linux
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| home_dir().map(|h| h.join(".config")))
        }
    }

    pub fn home_dir() -> Option<PathBuf> {
        let var = if cfg!(target_os = "windows") {
            "USERPROFILE"
        } else {
            "HOME"
        };
        std::env::var(var)
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}
