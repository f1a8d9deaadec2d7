//! 数据库连接和建表管理
//!
//! 提供基于 sqlx 的数据库连接池，并负责模块表与主机-模块关系表的结构

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// 模块表名
pub const MODULE_TABLE: &str = "module";

/// 主机-模块关系表名
pub const MODULE_HOST_TABLE: &str = "module_host_config";

/// 主数据库文件名
pub const DATABASE_FILE: &str = "cmdb.db";

/// 数据库管理器
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// 创建新的数据库实例
    ///
    /// # Arguments
    /// * `path` - 数据库文件存储目录路径，必须已存在
    ///   主数据库文件将存储为 `{path}/cmdb.db`
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_file = path.as_ref().join(DATABASE_FILE);

        // 创建连接选项并启用 WAL 模式
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_file.display()))
            .map_err(|e| DatabaseError::ConnectionFailed {
                message: format!("invalid sqlite path {}: {e}", db_file.display()),
            })?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        // 创建连接池
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                message: format!("{}: {e}", db_file.display()),
            })?;

        let db = Self { pool };

        // 初始化数据库表结构
        db.initialize_schema().await?;

        info!("SQLite database ready: path={}", db_file.display());
        Ok(db)
    }

    /// 初始化数据库表结构
    async fn initialize_schema(&self) -> Result<()> {
        // 模块表：按 (开发商账号, 业务, 模块) 唯一
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS module (
                rowid INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                business_id INTEGER NOT NULL,
                module_id INTEGER NOT NULL,
                module_name TEXT NOT NULL DEFAULT '',
                default_kind INTEGER NOT NULL DEFAULT 0,
                UNIQUE(owner, business_id, module_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|_| DatabaseError::SchemaFailed {
            table: MODULE_TABLE.to_string(),
        })?;

        // 主机-模块关系表：一行表示主机属于业务下的一个模块
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS module_host_config (
                rowid INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                business_id INTEGER NOT NULL,
                host_id INTEGER NOT NULL,
                module_id INTEGER NOT NULL,
                UNIQUE(owner, business_id, host_id, module_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|_| DatabaseError::SchemaFailed {
            table: MODULE_HOST_TABLE.to_string(),
        })?;

        // 创建索引
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_module_host_owner_host
             ON module_host_config(owner, host_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_module_host_owner_module
             ON module_host_config(owner, business_id, module_id)",
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite tables and indexes initialized");
        Ok(())
    }

    /// 获取数据库连接池
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }
}
