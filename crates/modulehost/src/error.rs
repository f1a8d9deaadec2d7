//! 主机转移错误定义
//!
//! - `ValidationError`：请求参数不合法，任何主机处理之前返回
//! - `HostStateError`：某个主机当前的关系状态不允许转移，只影响该主机
//! - `StoreError`：数据访问失败
//! - `TransferError::Aggregate`：批量处理完成但有主机失败

use cmdb_common::types::{BusinessId, HostId, ModuleId};
use thiserror::Error;

use crate::invariant::KindViolation;
use crate::types::ExceptionResult;

/// 对外返回的数字错误码
pub mod codes {
    /// 参数不合法
    pub const PARAMS_INVALID: i64 = 1199006;
    /// 数据库查询失败
    pub const DB_SELECT_FAILED: i64 = 1199019;
    /// 数据库写入失败
    pub const DB_INSERT_FAILED: i64 = 1199020;
    /// 数据库删除失败
    pub const DB_DELETE_FAILED: i64 = 1199022;
    /// 请求超时或被取消
    pub const REQUEST_ABORTED: i64 = 1199050;
    /// 目标模块不是业务的默认模块
    pub const MODULE_NOT_DEFAULT: i64 = 1113008;
    /// 主机当前状态不允许转移
    pub const HOST_STATE_INVALID: i64 = 1113019;
    /// 批量转移中有主机失败
    pub const TRANSFER_HOST_MODULE_FAILED: i64 = 1113020;
}

/// 存储操作类型，用于选择错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Select,
    Insert,
    Delete,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreOp::Select => "select",
            StoreOp::Insert => "insert",
            StoreOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// 数据访问错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database {op} failed: {source}")]
    Query {
        op: StoreOp,
        #[source]
        source: sqlx::Error,
    },

    #[error("store backend {op} failed: {message}")]
    Backend { op: StoreOp, message: String },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("filter is missing the owner condition")]
    MissingOwner,

    #[error("delete filter must constrain hosts or modules")]
    UnboundedDelete,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("request cancelled")]
    Cancelled,

    #[error("{original}; compensation failed: {cleanup}")]
    CompensationFailed {
        original: Box<StoreError>,
        cleanup: Box<StoreError>,
    },
}

impl StoreError {
    pub fn query(op: StoreOp) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| StoreError::Query { op, source }
    }

    pub fn code(&self) -> i64 {
        match self {
            StoreError::Query { op, .. } | StoreError::Backend { op, .. } => match op {
                StoreOp::Select => codes::DB_SELECT_FAILED,
                StoreOp::Insert => codes::DB_INSERT_FAILED,
                StoreOp::Delete => codes::DB_DELETE_FAILED,
            },
            StoreError::Malformed(_) | StoreError::MissingOwner => codes::DB_SELECT_FAILED,
            StoreError::UnboundedDelete => codes::DB_DELETE_FAILED,
            StoreError::DeadlineExceeded | StoreError::Cancelled => codes::REQUEST_ABORTED,
            StoreError::CompensationFailed { original, .. } => original.code(),
        }
    }
}

/// 请求参数校验错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target module list is empty")]
    EmptyModuleSet,

    #[error("modules {module_ids:?} do not exist in business {business_id}")]
    ModuleNotFound {
        business_id: BusinessId,
        module_ids: Vec<ModuleId>,
    },

    #[error(
        "business {business_id}: default modules {inner:?} cannot be mixed with normal modules {normal:?}"
    )]
    MixedModuleKinds {
        business_id: BusinessId,
        inner: Vec<ModuleId>,
        normal: Vec<ModuleId>,
    },

    #[error("business {business_id}: at most one default module allowed, got {module_ids:?}")]
    MultipleInnerModules {
        business_id: BusinessId,
        module_ids: Vec<ModuleId>,
    },

    #[error("target module {module_ids:?} is not a default module for business {business_id}")]
    NotDefaultModule {
        business_id: BusinessId,
        module_ids: Vec<ModuleId>,
    },
}

impl ValidationError {
    pub(crate) fn from_violation(business_id: BusinessId, violation: KindViolation) -> Self {
        match violation {
            KindViolation::Mixed { inner, normal } => ValidationError::MixedModuleKinds {
                business_id,
                inner,
                normal,
            },
            KindViolation::MultipleInner(module_ids) => ValidationError::MultipleInnerModules {
                business_id,
                module_ids,
            },
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            ValidationError::NotDefaultModule { .. } => codes::MODULE_NOT_DEFAULT,
            _ => codes::PARAMS_INVALID,
        }
    }
}

/// 单个主机的状态错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostStateError {
    #[error("host {host_id} is in default module {module_ids:?}, increment transfer is not allowed")]
    IncrementFromInnerModule {
        host_id: HostId,
        module_ids: Vec<ModuleId>,
    },

    #[error("host {host_id} belongs to other business {business_ids:?}")]
    ForeignBusiness {
        host_id: HostId,
        business_ids: Vec<BusinessId>,
    },

    #[error("host {host_id} references unknown modules {module_ids:?}")]
    UnknownModules {
        host_id: HostId,
        module_ids: Vec<ModuleId>,
    },

    #[error("host {host_id}: {violation}")]
    Invariant {
        host_id: HostId,
        violation: KindViolation,
    },
}

/// 主机转移错误
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    HostState(#[from] HostStateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{} of {total} hosts failed to transfer", .exceptions.len())]
    Aggregate {
        total: usize,
        exceptions: Vec<ExceptionResult>,
    },
}

impl TransferError {
    pub fn code(&self) -> i64 {
        match self {
            TransferError::Validation(e) => e.code(),
            TransferError::HostState(_) => codes::HOST_STATE_INVALID,
            TransferError::Store(e) => e.code(),
            TransferError::Aggregate { .. } => codes::TRANSFER_HOST_MODULE_FAILED,
        }
    }

    /// 部分失败时的主机失败列表，其他错误返回空切片
    pub fn exceptions(&self) -> &[ExceptionResult] {
        match self {
            TransferError::Aggregate { exceptions, .. } => exceptions,
            _ => &[],
        }
    }

    /// 转换为单个主机的失败记录
    pub fn to_exception(&self, host_id: HostId) -> ExceptionResult {
        ExceptionResult {
            host_id,
            message: self.to_string(),
            code: self.code(),
        }
    }
}
