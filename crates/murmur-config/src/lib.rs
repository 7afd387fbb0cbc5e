pub mod config;
pub mod manager;

pub use config::{
    BackendConfig, ChatConfig, Config, ConfigError, ConfigResult, LogLevel, LoggingConfig, UiConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 murmur 配置目录路径
pub fn murmur_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".murmur"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    murmur_dir().map(|dir| dir.join("config.json"))
}

/// 获取默认日志文件路径
pub fn default_log_path() -> Option<PathBuf> {
    murmur_dir().map(|dir| dir.join("logs").join("murmur.log"))
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur_dir() {
        let dir = murmur_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().to_string_lossy().contains(".murmur"));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/.murmur/config.json");
        assert!(expanded.is_some());
        assert!(!expanded.unwrap().to_string_lossy().starts_with("~"));

        assert_eq!(expand_tilde("/tmp/murmur.log"), Some(PathBuf::from("/tmp/murmur.log")));
    }

    #[test]
    fn test_default_paths_live_under_murmur_dir() {
        let dir = murmur_dir().unwrap();
        assert!(default_config_path().unwrap().starts_with(&dir));
        assert!(default_log_path().unwrap().starts_with(&dir));
    }
}
