//! 集成测试公共夹具
//!
//! 临时目录中的 SQLite 库，外面包一层可注入故障的 `FaultyStore`。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cmdb_common::storage::Database;
use modulehost::{
    ChannelNotifier, HostRelationEvent, ModuleHostRelation, ModuleHostService, ModuleKind,
    ModuleRecord, RelationField, RelationFilter, RelationProjection, RelationStore, SqliteStore,
    StoreError, StoreOp,
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

pub const OWNER: &str = "0";

pub const BIZ_A: i64 = 1;
pub const IDLE_A: i64 = 10;
pub const FAULT_A: i64 = 11;
pub const M1: i64 = 21;
pub const M2: i64 = 22;
pub const M3: i64 = 23;

pub const BIZ_B: i64 = 2;
pub const IDLE_B: i64 = 30;
pub const M4: i64 = 41;

#[derive(Debug, Clone, Copy)]
pub enum InsertFault {
    /// 不写入直接失败
    Reject,
    /// 写入后仍然返回失败
    AfterWrite,
}

/// 按主机注入故障的存储包装
pub struct FaultyStore {
    inner: SqliteStore,
    insert_faults: Mutex<HashMap<i64, (InsertFault, usize)>>,
    delete_faults: Mutex<HashMap<i64, (usize, usize)>>,
    delete_stalls: Mutex<HashMap<i64, Option<CancellationToken>>>,
    read_delay: Mutex<Option<Duration>>,
}

impl FaultyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            insert_faults: Mutex::new(HashMap::new()),
            delete_faults: Mutex::new(HashMap::new()),
            delete_stalls: Mutex::new(HashMap::new()),
            read_delay: Mutex::new(None),
        }
    }

    /// 主机接下来 `times` 次插入失败
    pub fn fail_inserts(&self, host_id: i64, fault: InsertFault, times: usize) {
        self.insert_faults
            .lock()
            .unwrap()
            .insert(host_id, (fault, times));
    }

    /// 主机接下来 `times` 次删除失败
    pub fn fail_deletes(&self, host_id: i64, times: usize) {
        self.fail_deletes_after(host_id, 0, times);
    }

    /// 主机先放过 `skip` 次删除，之后 `times` 次失败
    pub fn fail_deletes_after(&self, host_id: i64, skip: usize, times: usize) {
        self.delete_faults
            .lock()
            .unwrap()
            .insert(host_id, (skip, times));
    }

    /// 主机下一次删除永不返回
    pub fn stall_next_delete(&self, host_id: i64) {
        self.delete_stalls.lock().unwrap().insert(host_id, None);
    }

    /// 主机下一次删除时取消请求，且删除永不返回
    pub fn cancel_on_next_delete(&self, host_id: i64, token: CancellationToken) {
        self.delete_stalls
            .lock()
            .unwrap()
            .insert(host_id, Some(token));
    }

    /// `find_all` 前休眠
    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    fn take_insert_fault(&self, rows: &[ModuleHostRelation]) -> Option<(i64, InsertFault)> {
        let mut faults = self.insert_faults.lock().unwrap();
        for row in rows {
            if let Some((fault, remaining)) = faults.get_mut(&row.host_id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Some((row.host_id, *fault));
            }
        }
        None
    }

    fn take_delete_fault(&self, filter: &RelationFilter) -> Option<i64> {
        let mut faults = self.delete_faults.lock().unwrap();
        for host_id in filter.host_ids().unwrap_or_default() {
            let Some((skip, remaining)) = faults.get_mut(host_id) else {
                continue;
            };
            if *skip > 0 {
                *skip -= 1;
            } else if *remaining > 0 {
                *remaining -= 1;
                return Some(*host_id);
            }
        }
        None
    }

    fn take_delete_stall(&self, filter: &RelationFilter) -> Option<Option<CancellationToken>> {
        let mut stalls = self.delete_stalls.lock().unwrap();
        filter
            .host_ids()
            .unwrap_or_default()
            .iter()
            .find_map(|host_id| stalls.remove(host_id))
    }
}

#[async_trait]
impl RelationStore for FaultyStore {
    async fn count(&self, filter: &RelationFilter) -> Result<u64, StoreError> {
        self.inner.count(filter).await
    }

    async fn find_fields(
        &self,
        filter: &RelationFilter,
        fields: &[RelationField],
    ) -> Result<Vec<RelationProjection>, StoreError> {
        self.inner.find_fields(filter, fields).await
    }

    async fn find_all(
        &self,
        filter: &RelationFilter,
    ) -> Result<Vec<ModuleHostRelation>, StoreError> {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.find_all(filter).await
    }

    async fn delete_by_filter(&self, filter: &RelationFilter) -> Result<u64, StoreError> {
        if let Some(token) = self.take_delete_stall(filter) {
            if let Some(token) = token {
                token.cancel();
            }
            std::future::pending::<()>().await;
        }
        if let Some(host_id) = self.take_delete_fault(filter) {
            return Err(StoreError::Backend {
                op: StoreOp::Delete,
                message: format!("injected delete failure for host {host_id}"),
            });
        }
        self.inner.delete_by_filter(filter).await
    }

    async fn insert(&self, rows: &[ModuleHostRelation]) -> Result<(), StoreError> {
        match self.take_insert_fault(rows) {
            None => self.inner.insert(rows).await,
            Some((host_id, InsertFault::Reject)) => Err(StoreError::Backend {
                op: StoreOp::Insert,
                message: format!("injected insert failure for host {host_id}"),
            }),
            Some((host_id, InsertFault::AfterWrite)) => {
                self.inner.insert(rows).await?;
                Err(StoreError::Backend {
                    op: StoreOp::Insert,
                    message: format!("injected insert failure after write for host {host_id}"),
                })
            }
        }
    }
}

pub struct Fixture {
    _dir: TempDir,
    pub sqlite: Arc<SqliteStore>,
    pub faulty: Arc<FaultyStore>,
    pub service: ModuleHostService,
    pub events: UnboundedReceiver<HostRelationEvent>,
}

impl Fixture {
    pub async fn new() -> anyhow::Result<Self> {
        Self::build(|service| service).await
    }

    /// 按需调整服务配置
    pub async fn build(
        configure: impl FnOnce(ModuleHostService) -> ModuleHostService,
    ) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let sqlite = SqliteStore::new(Database::new(dir.path()).await?);
        seed_modules(&sqlite).await?;

        let faulty = Arc::new(FaultyStore::new(sqlite.clone()));
        let sqlite = Arc::new(sqlite);
        let (notifier, events) = ChannelNotifier::new();
        let service = configure(ModuleHostService::new(
            faulty.clone(),
            sqlite.clone(),
            Arc::new(notifier),
        ));

        Ok(Self {
            _dir: dir,
            sqlite,
            faulty,
            service,
            events,
        })
    }

    /// 直接写入关系行，不经过转移引擎
    pub async fn seed(&self, relations: &[(i64, i64, i64)]) -> anyhow::Result<()> {
        let rows: Vec<ModuleHostRelation> = relations
            .iter()
            .map(|(business_id, host_id, module_id)| ModuleHostRelation {
                owner: OWNER.to_string(),
                business_id: *business_id,
                host_id: *host_id,
                module_id: *module_id,
            })
            .collect();
        self.sqlite.insert(&rows).await?;
        Ok(())
    }

    /// 主机在业务下的模块，升序
    pub async fn modules_of(&self, business_id: i64, host_id: i64) -> anyhow::Result<Vec<i64>> {
        let filter = RelationFilter::new()
            .business(business_id)
            .hosts([host_id])
            .with_owner(OWNER);
        let mut ids: Vec<i64> = self
            .sqlite
            .find_all(&filter)
            .await?
            .into_iter()
            .map(|r| r.module_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// 主机在所有业务下的关系行数
    pub async fn row_count(&self, host_id: i64) -> anyhow::Result<u64> {
        let filter = RelationFilter::new().hosts([host_id]).with_owner(OWNER);
        Ok(self.sqlite.count(&filter).await?)
    }

    pub fn drain_events(&mut self) -> Vec<HostRelationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// 主机在业务下的关系满足默认模块/普通模块互斥
    pub async fn assert_homogeneous(&self, business_id: i64, host_id: i64) -> anyhow::Result<()> {
        let ids = self.modules_of(business_id, host_id).await?;
        let kinds: Vec<ModuleKind> = ids.iter().map(|id| kind_of(*id)).collect();
        let inner = kinds.iter().filter(|k| k.is_inner()).count();
        assert!(
            inner == 0 || (inner == 1 && kinds.len() == 1),
            "host {host_id} in business {business_id} has mixed modules {ids:?}"
        );
        Ok(())
    }
}

fn kind_of(module_id: i64) -> ModuleKind {
    match module_id {
        IDLE_A | IDLE_B => ModuleKind::Idle,
        FAULT_A => ModuleKind::Fault,
        _ => ModuleKind::Normal,
    }
}

async fn seed_modules(store: &SqliteStore) -> anyhow::Result<()> {
    let modules: Vec<ModuleRecord> = [
        (BIZ_A, IDLE_A, "空闲机"),
        (BIZ_A, FAULT_A, "故障机"),
        (BIZ_A, M1, "gateway"),
        (BIZ_A, M2, "logic"),
        (BIZ_A, M3, "storage"),
        (BIZ_B, IDLE_B, "空闲机"),
        (BIZ_B, M4, "web"),
    ]
    .into_iter()
    .map(|(business_id, module_id, name)| ModuleRecord {
        module_id,
        business_id,
        kind: kind_of(module_id),
        name: Some(name.to_string()),
    })
    .collect();
    store.insert_modules(OWNER, &modules).await?;
    Ok(())
}
