//! 主机模块转移引擎
//!
//! 一个 [`HostModuleTransfer`] 对应一次请求：目标业务、目标模块集合和是否增量。
//! `valid_parameter` 先对目标集合整体校验，之后每个主机调用一次 `transfer`。
//!
//! 单个主机的写入顺序：
//! 1. 插入新增关系
//! 2. 删除目标业务下移除的关系
//! 3. 删除原业务关系（仅跨业务转移）
//!
//! 任一步失败时补回第 2 步已删除的行，再删除第 1 步插入的行，主机回到转移前的关系。
//! 补偿不受请求的截止时间和取消信号约束，只受 [`COMPENSATION_TIMEOUT`] 限制。

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cmdb_common::types::{BusinessId, HostId, ModuleId};
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

use crate::context::ContextParams;
use crate::error::{HostStateError, StoreError, TransferError, ValidationError};
use crate::event::{EventNotifier, HOST_RELATION_CHANGED, HostRelationEvent};
use crate::invariant::check_module_kinds;
use crate::lock::HostLockTable;
use crate::query;
use crate::storage::{ModuleCatalog, RelationFilter, RelationStore};
use crate::types::{ModuleHostRelation, ModuleKind, ModuleRecord, TransferOutcome};

/// 补偿写入的超时时间
pub const COMPENSATION_TIMEOUT: Duration = Duration::from_secs(5);

/// 单次请求的主机转移
pub struct HostModuleTransfer {
    ctx: ContextParams,
    store: Arc<dyn RelationStore>,
    catalog: Arc<dyn ModuleCatalog>,
    notifier: Arc<dyn EventNotifier>,
    locks: Option<Arc<HostLockTable>>,

    business_id: BusinessId,
    module_ids: Vec<ModuleId>,
    is_increment: bool,
    cross_business: bool,

    targets: OnceCell<HashMap<ModuleId, ModuleRecord>>,
}

impl HostModuleTransfer {
    pub(crate) fn new(
        ctx: ContextParams,
        store: Arc<dyn RelationStore>,
        catalog: Arc<dyn ModuleCatalog>,
        notifier: Arc<dyn EventNotifier>,
        business_id: BusinessId,
        module_ids: &[ModuleId],
        is_increment: bool,
    ) -> Self {
        // 去重并保持调用方给出的顺序
        let mut seen = BTreeSet::new();
        let module_ids = module_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        Self {
            ctx,
            store,
            catalog,
            notifier,
            locks: None,
            business_id,
            module_ids,
            is_increment,
            cross_business: false,
            targets: OnceCell::new(),
        }
    }

    pub(crate) fn with_locks(mut self, locks: Option<Arc<HostLockTable>>) -> Self {
        self.locks = locks;
        self
    }

    /// 跨业务转移：主机在其他业务下的关系会被删除
    pub fn cross_business(mut self, enabled: bool) -> Self {
        self.cross_business = enabled;
        self
    }

    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    pub fn module_ids(&self) -> &[ModuleId] {
        &self.module_ids
    }

    pub fn is_increment(&self) -> bool {
        self.is_increment
    }

    pub fn context(&self) -> &ContextParams {
        &self.ctx
    }

    /// 目标模块记录，只查询一次
    async fn target_modules(&self) -> Result<&HashMap<ModuleId, ModuleRecord>, StoreError> {
        self.targets
            .get_or_try_init(|| {
                query::module_info_by_module_id(
                    &self.ctx,
                    self.catalog.as_ref(),
                    self.business_id,
                    &self.module_ids,
                    &[],
                )
            })
            .await
    }

    /// 目标模块是否全部是目标业务的默认模块
    ///
    /// 空集合、包含普通模块或包含其他业务的模块时返回 false，只有数据访问失败才返回错误。
    pub async fn has_inner_module(&self) -> Result<bool, StoreError> {
        if self.module_ids.is_empty() {
            return Ok(false);
        }
        let targets = self.target_modules().await?;
        Ok(self.module_ids.iter().all(|id| {
            targets
                .get(id)
                .is_some_and(|m| m.business_id == self.business_id && m.kind.is_inner())
        }))
    }

    /// 目标模块集合整体校验，失败时不处理任何主机
    pub async fn valid_parameter(&self) -> Result<(), TransferError> {
        if self.module_ids.is_empty() {
            return Err(ValidationError::EmptyModuleSet.into());
        }

        let targets = self.target_modules().await?;
        let missing: Vec<ModuleId> = self
            .module_ids
            .iter()
            .copied()
            .filter(|id| {
                !targets
                    .get(id)
                    .is_some_and(|m| m.business_id == self.business_id)
            })
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::ModuleNotFound {
                business_id: self.business_id,
                module_ids: missing,
            }
            .into());
        }

        check_module_kinds(
            self.module_ids
                .iter()
                .filter_map(|id| targets.get(id).map(|m| (*id, m.kind))),
        )
        .map_err(|v| ValidationError::from_violation(self.business_id, v))?;

        Ok(())
    }

    /// 转移单个主机
    pub async fn transfer(&self, host_id: HostId) -> Result<TransferOutcome, TransferError> {
        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(&self.ctx.owner, host_id).await),
            None => None,
        };

        let current = query::host_module_map_by_host_id(
            &self.ctx,
            self.store.as_ref(),
            self.business_id,
            &[host_id],
        )
        .await?
        .remove(&host_id)
        .unwrap_or_default();
        let old_ids: BTreeSet<ModuleId> = current.iter().map(|r| r.module_id).collect();

        let foreign =
            query::host_foreign_relations(&self.ctx, self.store.as_ref(), host_id, self.business_id)
                .await?;
        let foreign_businesses: Vec<BusinessId> = foreign
            .iter()
            .map(|(business_id, _)| *business_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !foreign_businesses.is_empty() && !self.cross_business {
            return Err(HostStateError::ForeignBusiness {
                host_id,
                business_ids: foreign_businesses,
            }
            .into());
        }

        let new_ids = self.next_module_set(host_id, &old_ids).await?;

        let inserted: Vec<ModuleId> = new_ids.difference(&old_ids).copied().collect();
        let deleted: Vec<ModuleId> = old_ids.difference(&new_ids).copied().collect();
        let outcome = TransferOutcome {
            host_id,
            inserted,
            deleted,
            retired_businesses: foreign_businesses,
        };

        if outcome.is_noop() {
            debug!(
                rid = %self.ctx.rid,
                "host {} already in modules {:?} of business {}, nothing to write",
                host_id, new_ids, self.business_id
            );
            return Ok(outcome);
        }

        debug!(
            rid = %self.ctx.rid,
            "host {} business {}: insert {:?}, delete {:?}, retire businesses {:?}",
            host_id, self.business_id, outcome.inserted, outcome.deleted, outcome.retired_businesses
        );

        self.persist(&outcome).await?;

        self.notifier.emit(HostRelationEvent {
            event_kind: HOST_RELATION_CHANGED.to_string(),
            owner: self.ctx.owner.clone(),
            rid: self.ctx.rid.clone(),
            business_id: self.business_id,
            host_id,
            old_module_ids: old_ids.into_iter().collect(),
            new_module_ids: new_ids.into_iter().collect(),
            retired_business_ids: outcome.retired_businesses.clone(),
        });

        Ok(outcome)
    }

    /// 计算主机在目标业务下的新模块集合，并检查互斥规则
    async fn next_module_set(
        &self,
        host_id: HostId,
        old_ids: &BTreeSet<ModuleId>,
    ) -> Result<BTreeSet<ModuleId>, TransferError> {
        let targets = self.target_modules().await?;
        let mut kinds: HashMap<ModuleId, ModuleKind> =
            targets.iter().map(|(id, m)| (*id, m.kind)).collect();
        let mut new_ids: BTreeSet<ModuleId> = self.module_ids.iter().copied().collect();

        if self.is_increment && !old_ids.is_empty() {
            let existing: Vec<ModuleId> = old_ids.iter().copied().collect();
            let records = query::module_info_by_module_id(
                &self.ctx,
                self.catalog.as_ref(),
                self.business_id,
                &existing,
                &[],
            )
            .await?;

            let unknown: Vec<ModuleId> = existing
                .iter()
                .copied()
                .filter(|id| !records.contains_key(id))
                .collect();
            if !unknown.is_empty() {
                return Err(HostStateError::UnknownModules {
                    host_id,
                    module_ids: unknown,
                }
                .into());
            }

            let inner: Vec<ModuleId> = existing
                .iter()
                .copied()
                .filter(|id| records.get(id).is_some_and(|m| m.kind.is_inner()))
                .collect();
            if !inner.is_empty() {
                return Err(HostStateError::IncrementFromInnerModule {
                    host_id,
                    module_ids: inner,
                }
                .into());
            }

            kinds.extend(records.into_iter().map(|(id, m)| (id, m.kind)));
            new_ids.extend(existing);
        }

        let missing: Vec<ModuleId> = new_ids
            .iter()
            .copied()
            .filter(|id| !kinds.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::ModuleNotFound {
                business_id: self.business_id,
                module_ids: missing,
            }
            .into());
        }

        check_module_kinds(
            new_ids
                .iter()
                .filter_map(|id| kinds.get(id).map(|kind| (*id, *kind))),
        )
        .map_err(|violation| HostStateError::Invariant { host_id, violation })?;

        Ok(new_ids)
    }

    /// 写入关系变化
    async fn persist(&self, outcome: &TransferOutcome) -> Result<(), TransferError> {
        let host_id = outcome.host_id;
        let owner = self.ctx.owner.as_str();

        let rows = self.relation_rows(host_id, &outcome.inserted);
        if !rows.is_empty()
            && let Err(e) = self.ctx.bounded(self.store.insert(&rows)).await
        {
            error!(rid = %self.ctx.rid, "insert relations of host {} failed: {}", host_id, e);
            return Err(self.compensate(host_id, &outcome.inserted, &[], e).await);
        }

        if !outcome.deleted.is_empty() {
            let filter = RelationFilter::new()
                .business(self.business_id)
                .hosts([host_id])
                .modules(outcome.deleted.iter().copied())
                .with_owner(owner);
            if let Err(e) = self.ctx.bounded(self.store.delete_by_filter(&filter)).await {
                error!(rid = %self.ctx.rid, "delete relations of host {} failed: {}", host_id, e);
                return Err(self.compensate(host_id, &outcome.inserted, &[], e).await);
            }
        }

        // 原业务关系最后删除，失败时目标业务下的变化都还能撤回
        if !outcome.retired_businesses.is_empty() {
            let filter = RelationFilter::new()
                .not_business(self.business_id)
                .hosts([host_id])
                .with_owner(owner);
            if let Err(e) = self.ctx.bounded(self.store.delete_by_filter(&filter)).await {
                error!(
                    rid = %self.ctx.rid,
                    "delete origin business relations of host {} failed: {}", host_id, e
                );
                return Err(self
                    .compensate(host_id, &outcome.inserted, &outcome.deleted, e)
                    .await);
            }
        }

        Ok(())
    }

    fn relation_rows(&self, host_id: HostId, module_ids: &[ModuleId]) -> Vec<ModuleHostRelation> {
        module_ids
            .iter()
            .map(|module_id| ModuleHostRelation {
                owner: self.ctx.owner.clone(),
                business_id: self.business_id,
                host_id,
                module_id: *module_id,
            })
            .collect()
    }

    /// 恢复目标业务下原有的关系：先补回已删除的行，再删除本次插入的行
    async fn compensate(
        &self,
        host_id: HostId,
        inserted: &[ModuleId],
        removed: &[ModuleId],
        original: StoreError,
    ) -> TransferError {
        if inserted.is_empty() && removed.is_empty() {
            return original.into();
        }

        match self.rollback(host_id, inserted, removed).await {
            Ok(()) => {
                warn!(
                    rid = %self.ctx.rid,
                    "rolled back host {}: removed {:?}, restored {:?}", host_id, inserted, removed
                );
                original.into()
            }
            Err(cleanup) => {
                error!(
                    rid = %self.ctx.rid,
                    "rollback of host {} failed: {}, modules {:?} may remain", host_id, cleanup, inserted
                );
                StoreError::CompensationFailed {
                    original: Box::new(original),
                    cleanup: Box::new(cleanup),
                }
                .into()
            }
        }
    }

    async fn rollback(
        &self,
        host_id: HostId,
        inserted: &[ModuleId],
        removed: &[ModuleId],
    ) -> Result<(), StoreError> {
        let rows = self.relation_rows(host_id, removed);
        if !rows.is_empty() {
            with_cleanup_timeout(self.store.insert(&rows)).await?;
        }

        if !inserted.is_empty() {
            let filter = RelationFilter::new()
                .business(self.business_id)
                .hosts([host_id])
                .modules(inserted.iter().copied())
                .with_owner(&self.ctx.owner);
            with_cleanup_timeout(self.store.delete_by_filter(&filter)).await?;
        }
        Ok(())
    }
}

async fn with_cleanup_timeout<T>(
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(COMPENSATION_TIMEOUT, fut)
        .await
        .unwrap_or(Err(StoreError::DeadlineExceeded))
}
