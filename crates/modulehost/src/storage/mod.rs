//! 关系存储模块
//!
//! - `filter`: 查询条件与投影
//! - `backend`: `RelationStore` / `ModuleCatalog` trait
//! - `sqlite`: 基于 sqlx 的 SQLite 实现

pub mod backend;
pub mod filter;
pub mod sqlite;

pub use backend::{ModuleCatalog, RelationStore};
pub use filter::{RelationField, RelationFilter, RelationProjection};
pub use sqlite::SqliteStore;
