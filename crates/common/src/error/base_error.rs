//! 顶层错误枚举
//!
//! 聚合基础设施层的错误类型，提供统一的错误处理接口

use super::{ConfigError, DatabaseError};
use thiserror::Error;

/// 顶层错误枚举，聚合配置、数据库、IO 等基础设施错误
#[derive(Error, Debug)]
pub enum BaseError {
    // ========== 基础设施错误 ==========
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    // ========== 通用错误 ==========
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 监控指标注册错误
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// 通用错误（用于不适合其他类别的错误）
    #[error("General error: {message}")]
    General { message: String },
}

impl BaseError {
    /// 创建通用错误
    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for BaseError {
    fn from(err: sqlx::Error) -> Self {
        BaseError::Database(DatabaseError::Sqlite(err))
    }
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, BaseError>;
