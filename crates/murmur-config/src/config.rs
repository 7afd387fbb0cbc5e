use serde::{Deserialize, Serialize};

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub backend: BackendConfig,
    pub chat: ChatConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            backend: BackendConfig::default(),
            chat: ChatConfig::default(),
            ui: UiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["backend", "endpoint"] => Some(self.backend.endpoint.clone()),
            ["backend", "timeout_seconds"] => self.backend.timeout_seconds.map(|t| t.to_string()),
            ["chat", "greeting"] => Some(self.chat.greeting.clone()),
            ["chat", "fallback_reply"] => Some(self.chat.fallback_reply.clone()),
            ["chat", "tick_interval_ms"] => Some(self.chat.tick_interval_ms.to_string()),
            ["chat", "min_chunk"] => Some(self.chat.min_chunk.to_string()),
            ["chat", "max_chunk"] => Some(self.chat.max_chunk.to_string()),
            ["ui", "title"] => Some(self.ui.title.clone()),
            ["ui", "placeholder"] => Some(self.ui.placeholder.clone()),
            ["ui", "footer"] => Some(self.ui.footer.clone()),
            ["logging", "level"] => Some(self.logging.level.to_string()),
            ["logging", "file"] => self.logging.file.clone(),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["backend", "endpoint"] => {
                self.backend.endpoint = value.to_string();
            }
            ["backend", "timeout_seconds"] => {
                self.backend.timeout_seconds = Some(parse_number(value)?);
            }
            ["chat", "greeting"] => {
                self.chat.greeting = value.to_string();
            }
            ["chat", "fallback_reply"] => {
                self.chat.fallback_reply = value.to_string();
            }
            ["chat", "tick_interval_ms"] => {
                self.chat.tick_interval_ms = parse_number(value)?;
            }
            ["chat", "min_chunk"] => {
                self.chat.min_chunk = parse_number(value)?;
            }
            ["chat", "max_chunk"] => {
                self.chat.max_chunk = parse_number(value)?;
            }
            ["ui", "title"] => {
                self.ui.title = value.to_string();
            }
            ["ui", "placeholder"] => {
                self.ui.placeholder = value.to_string();
            }
            ["ui", "footer"] => {
                self.ui.footer = value.to_string();
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "file"] => {
                self.logging.file = Some(value.to_string());
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid number: {}", value)))
}

/// 后端聊天接口配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// 聊天接口地址 (POST)
    pub endpoint: String,
    /// 请求超时（秒），不设置时使用 HTTP 客户端默认值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/xiaozhi/chat".to_string(),
            timeout_seconds: None,
        }
    }
}

/// 对话行为配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// 开场请求发送的问候语
    pub greeting: String,
    /// 后端返回空回复时显示的文本
    pub fallback_reply: String,
    /// 打字机效果的刷新间隔（毫秒）
    pub tick_interval_ms: u64,
    /// 每次追加的最少字符数
    pub min_chunk: usize,
    /// 每次追加的最多字符数
    pub max_chunk: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello".to_string(),
            fallback_reply: "Sorry, I didn't get a valid reply.".to_string(),
            tick_interval_ms: 30,
            min_chunk: 1,
            max_chunk: 3,
        }
    }
}

/// 界面文案配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub title: String,
    pub placeholder: String,
    pub footer: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "Appointment Assistant".to_string(),
            placeholder: "Type your question...".to_string(),
            footer: "The assistant is here to help. Describe what you need in detail.".to_string(),
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 日志文件路径，终端界面运行时日志只写入文件
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: Some("~/.murmur/logs/murmur.log".to_string()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
