//! 统一配置管理系统
//!
//! 本模块是 CMDB 核心服务配置的"单一真理之源"。
//! 所有配置项的定义、文档、默认值都在这里统一管理。

pub mod transfer;

pub use crate::config::transfer::{HostModuleGate, TransferConfig};
use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// CMDB 核心服务的主配置结构体
///
/// 配置文件使用 TOML 格式，支持完整的类型安全加载。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CoreConfig {
    /// 服务器实例名称
    ///
    /// 用于标识不同的服务器实例，出现在日志中便于区分节点。
    pub name: String,

    /// 运行环境标识
    ///
    /// - "dev": 开发环境
    /// - "prod": 生产环境
    /// - "test": 测试环境，用于自动化测试
    pub env: String,

    /// SQLite 数据库文件存储目录路径
    ///
    /// 主数据库文件将存储为 `{sqlite_path}/cmdb.db`，
    /// 包含模块表和主机-模块关系表。
    #[serde(
        serialize_with = "serialize_pathbuf",
        deserialize_with = "deserialize_pathbuf"
    )]
    pub sqlite_path: PathBuf,

    /// 可观测性配置（日志）
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// 主机转移配置
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// 过滤级别
    ///
    /// 支持 EnvFilter 语法（如 "info,sqlx=warn"）。默认值 "info"。
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// 日志输出目标
    ///
    /// - "console": 仅输出到控制台（默认）
    /// - "file": 输出到文件
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 日志轮转开关
    ///
    /// 当 output = "file" 时有效：
    /// - true: 按天轮转日志文件
    /// - false: 追加到单个文件
    #[serde(default)]
    pub rotate: bool,

    /// 日志文件路径
    ///
    /// 当 output = "file" 时有效
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            filter_level: default_filter_level(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    "info".to_string()
}

fn serialize_pathbuf<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    path.display().to_string().serialize(serializer)
}

fn deserialize_pathbuf<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(PathBuf::from(s))
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            name: "cmdb-default".to_string(),
            env: "dev".to_string(),
            sqlite_path: PathBuf::from("database"),
            observability: ObservabilityConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

impl CoreConfig {
    /// 返回可观测性配置引用
    pub fn observability_config(&self) -> &ObservabilityConfig {
        &self.observability
    }

    /// 返回日志配置引用
    pub fn log_config(&self) -> &LogConfig {
        &self.observability.log
    }

    /// 返回主机转移配置引用
    pub fn transfer_config(&self) -> &TransferConfig {
        &self.transfer
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path_ref.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path_ref).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;

        Self::from_toml(&content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// 验证配置有效性
    ///
    /// 以 "Warning:" 开头的条目只是提示，其余条目是必须修复的错误。
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // 验证实例名称
        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }

        // 验证环境
        if !["dev", "prod", "test"].contains(&self.env.as_str()) {
            errors.push(format!(
                "Invalid environment '{}', must be one of: dev, prod, test",
                self.env
            ));
        }

        // 验证过滤级别（EnvFilter 语法）
        {
            let main_level = self
                .observability
                .filter_level
                .split(',')
                .next()
                .unwrap_or("")
                .trim();
            if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
                errors.push(format!(
                    "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                    self.observability.filter_level
                ));
            }
        }

        // 验证日志输出
        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        // 验证 SQLite 路径
        if self
            .sqlite_path
            .to_str()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
        {
            errors.push("SQLite database path cannot be empty".to_string());
        }

        if self.env == "prod" && !self.transfer.host_lock {
            errors.push(
                "Warning: transfer.host_lock is disabled, concurrent batches may lose updates"
                    .to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_config().output, "console");
        assert!(config.transfer_config().host_lock);
    }

    #[test]
    fn test_minimal_toml() {
        let toml = r#"
            name = "cmdb-01"
            env = "test"
            sqlite_path = "/tmp/cmdb"
        "#;

        let config = CoreConfig::from_toml(toml).unwrap();
        assert_eq!(config.name, "cmdb-01");
        assert_eq!(config.sqlite_path, PathBuf::from("/tmp/cmdb"));
        assert_eq!(config.observability.filter_level, "info");
        assert_eq!(
            config.transfer.host_module_gate,
            HostModuleGate::DefaultModulesOnly
        );
    }

    #[test]
    fn test_full_toml_roundtrip() {
        let toml = r#"
            name = "cmdb-02"
            env = "prod"
            sqlite_path = "data"

            [observability]
            filter_level = "debug,sqlx=warn"

            [observability.log]
            output = "file"
            rotate = true
            path = "/var/log/cmdb"

            [transfer]
            host_lock = true
            host_module_gate = "parameter_only"
            request_timeout_ms = 3000
        "#;

        let config = CoreConfig::from_toml(toml).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.log_config().rotate);
        assert_eq!(
            config.transfer.host_module_gate,
            HostModuleGate::ParameterOnly
        );

        let rendered = config.to_toml().unwrap();
        let reparsed = CoreConfig::from_toml(&rendered).unwrap();
        assert_eq!(reparsed.transfer.request_timeout_ms, 3000);
        assert_eq!(reparsed.observability.log.path, "/var/log/cmdb");
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let config = CoreConfig {
            name: " ".to_string(),
            env: "staging".to_string(),
            sqlite_path: PathBuf::from(""),
            observability: ObservabilityConfig {
                filter_level: "verbose".to_string(),
                log: LogConfig {
                    output: "syslog".to_string(),
                    ..LogConfig::default()
                },
            },
            transfer: TransferConfig::default(),
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().all(|e| !e.starts_with("Warning:")));
    }

    #[test]
    fn test_disabled_lock_in_prod_is_warning() {
        let mut config = CoreConfig {
            env: "prod".to_string(),
            ..CoreConfig::default()
        };
        config.transfer.host_lock = false;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Warning:"));
    }

    #[test]
    fn test_from_file_missing() {
        let result = CoreConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_from_file_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "name = ").unwrap();

        let result = CoreConfig::from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
