//! 配置管理
//!
//! 启动时解析一次，之后只读共享（`Arc<Config>`）。
//!
//! 加载顺序：默认值 → YAML 配置文件 → 环境变量覆盖。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "RELAYCAST_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败: {path} - {message}")]
    Read { path: String, message: String },

    #[error("解析配置文件失败: {path} - {message}")]
    Parse { path: String, message: String },

    #[error("配置无效: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8082,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub base_url: String,
    /// 访问上游时使用的代理（http/https）
    pub proxy: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    pub default_model: String,
    /// 允许客户端指定的模型列表，为空时只允许默认模型
    pub allowed_models: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o".to_string(),
            allowed_models: vec![
                "gpt-4o".to_string(),
                "gpt-4o-mini".to_string(),
                "gpt-4.1".to_string(),
                "o3-mini".to_string(),
                "o4-mini".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// file 模式下没有识别出任何文件时，把完整文本作为普通文本返回
    pub fallback: bool,
    /// 文件落地的根目录，默认为当前工作目录
    pub base_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fallback: true,
            base_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
    pub retention_days: u32,
    pub max_file_size: u64,
    /// 日志目录，默认 ~/.relaycast/logs
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            retention_days: 7,
            max_file_size: 10 * 1024 * 1024,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub models: ModelsConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    /// 记录完整的上游请求体（debug 级别）
    pub debug: bool,
    /// CLI 本地配置文件路径，默认 ~/.claude.json
    pub cli_config_path: Option<PathBuf>,
}

impl Config {
    /// 从默认位置加载配置并应用环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// 从 YAML 文件加载
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// 应用环境变量覆盖
    ///
    /// `lookup` 通常是 `std::env::var`，测试中可以注入固定的映射。
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.upstream.api_key = v;
        }
        if let Some(v) = lookup("OPENAI_BASE_URL") {
            self.upstream.base_url = v;
        }
        if let Some(v) = lookup("RELAYCAST_UPSTREAM_PROXY") {
            self.upstream.proxy = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("RELAYCAST_DEFAULT_MODEL") {
            self.models.default_model = v;
        }
        if let Some(v) = lookup("RELAYCAST_ALLOWED_MODELS") {
            self.models.allowed_models = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("RELAYCAST_OUTPUT_FALLBACK") {
            self.output.fallback = parse_bool(&v).unwrap_or(self.output.fallback);
        }
        if let Some(v) = lookup("RELAYCAST_DEBUG") {
            self.debug = parse_bool(&v).unwrap_or(self.debug);
        }
        if let Some(v) = lookup("RELAYCAST_HOST") {
            self.server.host = v;
        }
        if let Some(port) = lookup("RELAYCAST_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(v) = lookup("RELAYCAST_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// 校验必填项
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "未配置上游 API key (OPENAI_API_KEY)".to_string(),
            ));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("上游 base_url 不能为空".to_string()));
        }
        if self.models.default_model.trim().is_empty() {
            return Err(ConfigError::Invalid("默认模型不能为空".to_string()));
        }
        Ok(())
    }

    /// 文件落地根目录
    pub fn output_base_dir(&self) -> PathBuf {
        self.output
            .base_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// 日志目录
    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .dir
            .clone()
            .unwrap_or_else(|| relaycast_home().join("logs"))
    }

    /// CLI 本地配置文件路径
    pub fn cli_config_path(&self) -> PathBuf {
        self.cli_config_path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".claude.json")
        })
    }
}

/// ~/.relaycast
pub fn relaycast_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".relaycast")
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".relaycast").join("config.yaml"))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8082);
        assert_eq!(config.models.default_model, "gpt-4o");
        assert!(config.output.fallback);
        assert!(!config.debug);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:9000/v1"),
            ("RELAYCAST_DEFAULT_MODEL", "o3-mini"),
            ("RELAYCAST_ALLOWED_MODELS", "o3-mini, gpt-4o ,,"),
            ("RELAYCAST_DEBUG", "yes"),
            ("RELAYCAST_OUTPUT_FALLBACK", "off"),
            ("RELAYCAST_PORT", "9999"),
        ]));

        assert_eq!(config.upstream.api_key, "sk-test");
        assert_eq!(config.upstream.base_url, "http://localhost:9000/v1");
        assert_eq!(config.models.default_model, "o3-mini");
        assert_eq!(config.models.allowed_models, vec!["o3-mini", "gpt-4o"]);
        assert!(config.debug);
        assert!(!config.output.fallback);
        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(lookup_from(&[("RELAYCAST_PORT", "not-a-port")]));
        assert_eq!(config.server.port, 8082);
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.upstream.api_key = "sk-test".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_file_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "upstream:\n  api_key: sk-file\nmodels:\n  default_model: gpt-4.1\ndebug: true"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.upstream.api_key, "sk-file");
        assert_eq!(config.upstream.base_url, "https://api.openai.com/v1");
        assert_eq!(config.models.default_model, "gpt-4.1");
        assert!(config.debug);
        assert_eq!(config.server, ServerConfig::default());
    }
}
