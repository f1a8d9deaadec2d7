//! 统一错误处理模型
//!
//! 主程序 cmdb 的顶层错误类型，聚合配置、存储和转移批次的错误

use thiserror::Error;

/// 主程序的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 配置相关错误 ==========
    /// 配置文件加载错误
    #[error("Configuration error: {0}")]
    Config(#[from] cmdb_common::error::ConfigError),

    /// 配置验证失败
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    // ========== 基础库错误 ==========
    /// Base crate 聚合错误
    #[error("Base library error: {0}")]
    Base(Box<cmdb_common::error::BaseError>),

    // ========== 业务错误 ==========
    /// 关系存储访问错误
    #[error("Store error: {0}")]
    Store(#[from] modulehost::StoreError),

    /// 转移批次失败，报告已输出到 stdout
    #[error("Transfer failed with code {code}: {message}")]
    TransferFailed { code: i64, message: String },

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // ========== 通用错误 ==========
    /// Anyhow 错误兼容层
    #[error("Legacy error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// 自定义错误消息
    #[error("Application error: {message}")]
    Custom { message: String },
}

impl From<cmdb_common::error::BaseError> for Error {
    fn from(err: cmdb_common::error::BaseError) -> Self {
        Error::Base(Box::new(err))
    }
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 创建配置验证失败错误
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}
