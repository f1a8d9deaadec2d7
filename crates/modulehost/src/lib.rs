//! 主机-模块关系转移
//!
//! 维护主机属于哪些模块，并保证同一业务下主机要么在一个默认模块中，
//! 要么在一个或多个普通模块中。
//!
//! - [`ModuleHostService`]：三个批量转移入口
//! - [`HostModuleTransfer`]：单次请求的校验与逐主机转移
//! - [`storage`]：关系存储抽象与 SQLite 实现

pub mod context;
pub mod error;
pub mod event;
pub mod invariant;
pub mod lock;
pub mod query;
pub mod service;
pub mod storage;
pub mod transfer;
pub mod types;

pub use context::ContextParams;
pub use error::{HostStateError, StoreError, StoreOp, TransferError, ValidationError, codes};
pub use event::{ChannelNotifier, EventNotifier, HostRelationEvent, TracingNotifier};
pub use lock::HostLockTable;
pub use service::{BatchError, BatchReport, ModuleHostService, report};
pub use storage::{
    ModuleCatalog, RelationField, RelationFilter, RelationProjection, RelationStore, SqliteStore,
};
pub use transfer::{COMPENSATION_TIMEOUT, HostModuleTransfer};
pub use types::{
    ExceptionResult, HostsModuleRelation, ModuleField, ModuleHostRelation, ModuleKind,
    ModuleRecord, TransferHostToInnerModule, TransferHostsCrossBusiness, TransferOutcome,
};

pub use cmdb_common::config::transfer::HostModuleGate;
