//! 主机模块转移服务
//!
//! 三个入口各自构造一个 [`HostModuleTransfer`]，先做整体校验再逐个主机转移。
//! 单个主机失败记录到异常列表，继续处理下一个主机；结束时如果异常列表非空，
//! 返回 [`TransferError::Aggregate`]。

use std::collections::BTreeMap;
use std::sync::Arc;

use cmdb_common::config::transfer::{HostModuleGate, TransferConfig};
use cmdb_common::metrics;
use cmdb_common::types::{BusinessId, HostId, ModuleId};
use serde::Serialize;
use tracing::{info, warn};

use crate::context::ContextParams;
use crate::error::{StoreError, TransferError, ValidationError};
use crate::event::EventNotifier;
use crate::lock::HostLockTable;
use crate::query;
use crate::storage::{ModuleCatalog, RelationFilter, RelationStore};
use crate::transfer::HostModuleTransfer;
use crate::types::{
    ExceptionResult, HostsModuleRelation, ModuleHostRelation, TransferHostToInnerModule,
    TransferHostsCrossBusiness, TransferOutcome,
};

const OP_TO_INNER: &str = "transfer_host_to_inner_module";
const OP_HOST_MODULE: &str = "transfer_host_module";
const OP_CROSS_BUSINESS: &str = "transfer_host_cross_business";

/// 批量调用结果，供外层序列化返回
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub exceptions: Vec<ExceptionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchError {
    pub code: i64,
    pub message: String,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl TransferError {
    /// 转换为 (异常列表, 错误) 形式
    pub fn into_report(self) -> BatchReport {
        let error = Some(BatchError {
            code: self.code(),
            message: self.to_string(),
        });
        match self {
            TransferError::Aggregate { exceptions, .. } => BatchReport { exceptions, error },
            _ => BatchReport {
                exceptions: Vec::new(),
                error,
            },
        }
    }
}

/// 批量结果转换为报告
pub fn report(result: Result<(), TransferError>) -> BatchReport {
    match result {
        Ok(()) => BatchReport::default(),
        Err(e) => e.into_report(),
    }
}

/// 主机模块关系服务
pub struct ModuleHostService {
    store: Arc<dyn RelationStore>,
    catalog: Arc<dyn ModuleCatalog>,
    notifier: Arc<dyn EventNotifier>,
    locks: Option<Arc<HostLockTable>>,
    gate: HostModuleGate,
}

impl ModuleHostService {
    pub fn new(
        store: Arc<dyn RelationStore>,
        catalog: Arc<dyn ModuleCatalog>,
        notifier: Arc<dyn EventNotifier>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            locks: Some(Arc::new(HostLockTable::new())),
            gate: HostModuleGate::default(),
        }
    }

    /// 按配置设置主机锁和入口校验方式
    pub fn with_config(self, config: &TransferConfig) -> Self {
        self.with_host_lock(config.host_lock)
            .with_host_module_gate(config.host_module_gate)
    }

    pub fn with_host_lock(mut self, enabled: bool) -> Self {
        self.locks = if enabled {
            self.locks.or_else(|| Some(Arc::new(HostLockTable::new())))
        } else {
            None
        };
        self
    }

    pub fn with_host_module_gate(mut self, gate: HostModuleGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn host_module_gate(&self) -> HostModuleGate {
        self.gate
    }

    /// 构造一次请求的转移引擎
    pub fn new_host_module_transfer(
        &self,
        ctx: &ContextParams,
        business_id: BusinessId,
        module_ids: &[ModuleId],
        is_increment: bool,
    ) -> HostModuleTransfer {
        HostModuleTransfer::new(
            ctx.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.catalog),
            Arc::clone(&self.notifier),
            business_id,
            module_ids,
            is_increment,
        )
        .with_locks(self.locks.clone())
    }

    /// 转移主机到业务的默认模块（空闲机、故障机等）
    pub async fn transfer_host_to_inner_module(
        &self,
        ctx: &ContextParams,
        input: &TransferHostToInnerModule,
    ) -> Result<(), TransferError> {
        let transfer =
            self.new_host_module_transfer(ctx, input.business_id, &[input.module_id], false);
        let result = self.run(&transfer, OP_TO_INNER, true, &input.host_ids).await;
        metrics::record_batch(OP_TO_INNER, batch_label(&result));
        result
    }

    /// 转移主机到模块，`is_increment` 为 true 时追加
    ///
    /// 默认配置下与默认模块入口使用相同的前置检查：目标模块必须全部是默认模块。
    pub async fn transfer_host_module(
        &self,
        ctx: &ContextParams,
        input: &HostsModuleRelation,
    ) -> Result<(), TransferError> {
        let transfer = self.new_host_module_transfer(
            ctx,
            input.business_id,
            &input.module_ids,
            input.is_increment,
        );
        let gated = self.gate == HostModuleGate::DefaultModulesOnly;
        let result = self
            .run(&transfer, OP_HOST_MODULE, gated, &input.host_ids)
            .await;
        metrics::record_batch(OP_HOST_MODULE, batch_label(&result));
        result
    }

    /// 跨业务转移主机，原业务下的关系会被删除
    pub async fn transfer_host_cross_business(
        &self,
        ctx: &ContextParams,
        input: &TransferHostsCrossBusiness,
    ) -> Result<(), TransferError> {
        let transfer = self
            .new_host_module_transfer(ctx, input.dst_business_id, &input.dst_module_ids, false)
            .cross_business(true);
        let result = self
            .run(&transfer, OP_CROSS_BUSINESS, false, &input.host_ids)
            .await;
        metrics::record_batch(OP_CROSS_BUSINESS, batch_label(&result));
        result
    }

    /// 统计满足条件的关系数
    pub async fn count_relations(
        &self,
        ctx: &ContextParams,
        filter: RelationFilter,
    ) -> Result<u64, StoreError> {
        query::count_by_cond(ctx, self.store.as_ref(), filter).await
    }

    /// 查询一组主机在业务下的关系
    pub async fn host_relations(
        &self,
        ctx: &ContextParams,
        business_id: BusinessId,
        host_ids: &[HostId],
    ) -> Result<BTreeMap<HostId, Vec<ModuleHostRelation>>, StoreError> {
        query::host_module_map_by_host_id(ctx, self.store.as_ref(), business_id, host_ids).await
    }

    async fn run(
        &self,
        transfer: &HostModuleTransfer,
        operation: &'static str,
        require_inner: bool,
        host_ids: &[HostId],
    ) -> Result<(), TransferError> {
        let ctx = transfer.context();

        if require_inner && !transfer.has_inner_module().await? {
            warn!(
                rid = %ctx.rid,
                "{}: modules {:?} are not default modules of business {}",
                operation,
                transfer.module_ids(),
                transfer.business_id()
            );
            return Err(ValidationError::NotDefaultModule {
                business_id: transfer.business_id(),
                module_ids: transfer.module_ids().to_vec(),
            }
            .into());
        }

        transfer.valid_parameter().await.inspect_err(|e| {
            warn!(rid = %ctx.rid, "{}: invalid parameter: {}", operation, e);
        })?;

        info!(
            rid = %ctx.rid,
            "{}: begin, business {}, modules {:?}, increment {}, {} hosts",
            operation,
            transfer.business_id(),
            transfer.module_ids(),
            transfer.is_increment(),
            host_ids.len()
        );

        let mut results: Vec<(HostId, Result<TransferOutcome, TransferError>)> =
            Vec::with_capacity(host_ids.len());
        for host_id in dedup_hosts(host_ids) {
            let result = transfer.transfer(host_id).await;
            metrics::record_host(operation, host_label(&result));
            if let Err(e) = &result {
                warn!(rid = %ctx.rid, "{}: transfer host {} failed: {}", operation, host_id, e);
            }
            results.push((host_id, result));
        }

        let total = results.len();
        let exceptions: Vec<ExceptionResult> = results
            .iter()
            .filter_map(|(host_id, result)| result.as_ref().err().map(|e| e.to_exception(*host_id)))
            .collect();

        info!(
            rid = %ctx.rid,
            "{}: done, {} hosts, {} failed",
            operation,
            total,
            exceptions.len()
        );

        if exceptions.is_empty() {
            Ok(())
        } else {
            Err(TransferError::Aggregate { total, exceptions })
        }
    }
}

/// 保持顺序去重
fn dedup_hosts(host_ids: &[HostId]) -> Vec<HostId> {
    let mut seen = std::collections::HashSet::new();
    host_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

fn batch_label(result: &Result<(), TransferError>) -> &'static str {
    match result {
        Ok(()) => "success",
        Err(TransferError::Aggregate { .. }) => "partial",
        Err(_) => "rejected",
    }
}

fn host_label(result: &Result<TransferOutcome, TransferError>) -> &'static str {
    match result {
        Ok(outcome) if outcome.is_noop() => "noop",
        Ok(_) => "changed",
        Err(_) => "failed",
    }
}
