//! 存储模块
//!
//! 提供 SQLite 数据库连接池与表结构管理

pub mod db;

pub use db::Database;
