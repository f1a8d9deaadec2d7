//! CMDB 通用基础设施库
//!
//! 为主机-模块关系管理核心提供配置、错误分类、标识类型、SQLite 存储与监控指标

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-export commonly used types for convenience
pub use config::CoreConfig;
pub use error::{BaseError, ConfigError, DatabaseError, Result};
pub use storage::Database;
pub use types::{BusinessId, HostId, ModuleId, Owner};
