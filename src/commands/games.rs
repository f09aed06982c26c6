//! 游戏列表命令

use crate::config::AppConfig;
use serde::Serialize;

/// 列表中的一个游戏
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEntry {
    pub name: String,
    pub enabled: bool,
    /// 当前平台的本地目录，未配置时为空
    pub local_path: Option<String>,
    pub cloud_folder: String,
    pub save_files: Vec<String>,
}

/// 列出配置中的所有游戏
pub fn list_games(config: &AppConfig, platform: &str) -> Vec<GameEntry> {
    config
        .games
        .iter()
        .map(|(name, game)| GameEntry {
            name: name.clone(),
            enabled: game.enabled,
            local_path: game
                .local_path_for(platform)
                .map(|p| p.to_string_lossy().into_owned()),
            cloud_folder: game.cloud_folder.clone(),
            save_files: game.save_files.clone(),
        })
        .collect()
}

pub fn print_games(config: &AppConfig, platform: &str) {
    println!("Remote: {}", config.remote.describe(""));
    println!("Platform: {}\n", platform);

    for entry in list_games(config, platform) {
        let status = if entry.enabled { "" } else { " (disabled)" };
        println!("{}{}", entry.name, status);
        println!(
            "  local:  {}",
            entry.local_path.as_deref().unwrap_or("<not configured for this platform>")
        );
        println!("  remote: {}", config.remote.describe(&entry.cloud_folder));
        println!("  files:  {}", entry.save_files.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_default_games() {
        let config = AppConfig::default();

        let games = list_games(&config, "linux");
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].name, "Hollow Knight");
        assert!(games[0].local_path.is_some());
        // Silksong 没有 linux 路径
        assert_eq!(games[1].name, "Hollow Knight Silksong");
        assert!(games[1].local_path.is_none());
        assert_eq!(games[1].save_files.len(), 4);
    }
}
