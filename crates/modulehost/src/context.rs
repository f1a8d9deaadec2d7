//! 请求上下文
//!
//! 每个请求携带开发商账号、请求 ID（rid）以及调用方给出的截止时间和取消信号。
//! 引擎发起的每一次存储调用都受它约束，引擎本身不设超时、不重试。

use std::future::Future;
use std::time::Duration;

use cmdb_common::types::{DEFAULT_OWNER, Owner};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// 请求上下文
#[derive(Debug, Clone)]
pub struct ContextParams {
    /// 开发商账号，注入到每一个存储过滤条件中
    pub owner: Owner,
    /// 请求 ID，用于日志关联
    pub rid: String,
    /// 调用方给出的截止时间
    pub deadline: Option<Instant>,
    /// 调用方给出的取消信号
    pub cancel: Option<CancellationToken>,
}

impl ContextParams {
    /// 创建上下文，自动生成 rid
    pub fn new(owner: impl Into<Owner>) -> Self {
        Self {
            owner: owner.into(),
            rid: uuid::Uuid::new_v4().simple().to_string(),
            deadline: None,
            cancel: None,
        }
    }

    pub fn with_rid(mut self, rid: impl Into<String>) -> Self {
        self.rid = rid.into();
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 以当前时间为起点设置截止时间
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// 在截止时间和取消信号的约束下执行一次存储调用
    pub async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Err(StoreError::Cancelled);
        }

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let timed = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .unwrap_or(Err(StoreError::DeadlineExceeded)),
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(StoreError::Cancelled),
            result = timed => result,
        }
    }
}

impl Default for ContextParams {
    fn default() -> Self {
        Self::new(DEFAULT_OWNER)
    }
}
