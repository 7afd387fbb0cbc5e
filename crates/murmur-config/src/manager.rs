use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// `${VAR}` 或 `${VAR:-default}`
const ENV_VAR_PATTERN: &str = r"\$\{([^}]+)\}";

/// 配置管理器
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// 加载配置文件，不存在时写出默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            let content = Self::expand_env_vars(&content)?;
            let config: Config = serde_json::from_str(&content)?;
            Self::validate(&config)?;
            config
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            // 确保父目录存在
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self::new(config, path.to_path_buf()))
    }

    /// 从默认位置加载配置
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path).await
    }

    /// 获取默认配置路径 (~/.murmur/config.json)
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    /// 创建一个新的配置管理器（用于测试）
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取配置的只读引用
    pub fn get(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// 获取当前配置的副本
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// 保存配置到文件
    pub async fn save(&self) -> ConfigResult<()> {
        let config = self.config.read().await;
        let content = serde_json::to_string_pretty(&*config)?;
        drop(config);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// 更新配置并保存，校验失败时保持原配置不变
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.config.write().await;
        let mut updated = config.clone();
        f(&mut updated);
        Self::validate(&updated)?;
        *config = updated;
        drop(config);
        self.save().await
    }

    /// 验证配置
    pub fn validate(config: &Config) -> ConfigResult<()> {
        let endpoint = config.backend.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Validation(
                "Backend endpoint cannot be empty".to_string(),
            ));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "Backend endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }

        if config.chat.greeting.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Chat greeting cannot be empty".to_string(),
            ));
        }

        if config.chat.fallback_reply.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Chat fallback_reply cannot be empty".to_string(),
            ));
        }

        if config.chat.tick_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Chat tick_interval_ms must be greater than 0".to_string(),
            ));
        }

        if config.chat.min_chunk == 0 || config.chat.min_chunk > config.chat.max_chunk {
            return Err(ConfigError::Validation(format!(
                "Chat chunk range {}..={} is invalid",
                config.chat.min_chunk, config.chat.max_chunk
            )));
        }

        if config.backend.timeout_seconds == Some(0) {
            return Err(ConfigError::Validation(
                "Backend timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// 展开环境变量 ${VAR} 或 ${VAR:-default}
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(ENV_VAR_PATTERN)
            .map_err(|e| ConfigError::Validation(format!("Invalid pattern: {}", e)))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            // 处理 ${VAR:-default} 语法
            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    /// 获取配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_writes_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let config = manager.snapshot().await;

        assert_eq!(config, Config::default());
        assert!(config_path.exists());
    }

    #[tokio::test]
    async fn test_load_existing_file_with_env_default() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(
            &config_path,
            r#"{"backend": {"endpoint": "${MURMUR_TEST_UNSET_ENDPOINT:-http://127.0.0.1:9999/chat}"}}"#,
        )
        .await
        .unwrap();

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let config = manager.snapshot().await;
        assert_eq!(config.backend.endpoint, "http://127.0.0.1:9999/chat");
        assert_eq!(config.chat.greeting, "Hello");
    }

    #[tokio::test]
    async fn test_env_var_expansion() {
        std::env::set_var("MURMUR_TEST_GREETING", "hi there");

        let content = r#"{"greeting": "${MURMUR_TEST_GREETING}"}"#;
        let expanded = ConfigManager::expand_env_vars(content).unwrap();
        assert!(expanded.contains("hi there"));

        let missing = ConfigManager::expand_env_vars(r#"{"x": "${MURMUR_TEST_DEFINITELY_MISSING}"}"#);
        assert!(matches!(missing, Err(ConfigError::EnvVarNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_saves_to_disk() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::load(&config_path).await.unwrap();

        manager
            .update(|config| config.chat.tick_interval_ms = 45)
            .await
            .unwrap();

        let other = ConfigManager::load(&config_path).await.unwrap();
        assert_eq!(other.snapshot().await.chat.tick_interval_ms, 45);
        assert_eq!(other.path(), config_path.as_path());
    }

    #[tokio::test]
    async fn test_rejected_update_keeps_previous_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::load(&config_path).await.unwrap();

        let result = manager
            .update(|config| config.chat.fallback_reply.clear())
            .await;
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        assert_eq!(manager.get().read().await.chat, ChatConfig::default());

        let on_disk = ConfigManager::load(&config_path).await.unwrap();
        assert_eq!(on_disk.snapshot().await, Config::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(ConfigManager::validate(&config).is_ok());

        config.backend.endpoint = "localhost:8080/chat".to_string();
        assert!(ConfigManager::validate(&config).is_err());
        config.backend.endpoint = "https://chat.example.test/api".to_string();

        config.chat.tick_interval_ms = 0;
        assert!(ConfigManager::validate(&config).is_err());
        config.chat.tick_interval_ms = 30;

        config.chat.min_chunk = 4;
        assert!(ConfigManager::validate(&config).is_err());
        config.chat.min_chunk = 0;
        assert!(ConfigManager::validate(&config).is_err());
        config.chat.min_chunk = 1;

        config.backend.timeout_seconds = Some(0);
        assert!(ConfigManager::validate(&config).is_err());
        config.backend.timeout_seconds = None;

        config.chat.greeting = "   ".to_string();
        assert!(matches!(
            ConfigManager::validate(&config),
            Err(ConfigError::Validation(_))
        ));
        config.chat.greeting = "Hello".to_string();

        config.chat.fallback_reply = String::new();
        assert!(matches!(
            ConfigManager::validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }
}
