//! 按 (开发商账号, 主机) 加锁
//!
//! 一个主机的 读取-计算-写入-发事件 过程在持有锁时完成，
//! 同一进程内并发的批量调用不会互相覆盖。锁只在本进程内有效。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cmdb_common::types::{HostId, Owner};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockKey = (Owner, HostId);

/// 主机锁表
#[derive(Debug, Default)]
pub struct HostLockTable {
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl HostLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 等待并获取主机锁，guard 释放时解锁
    pub async fn acquire(self: &Arc<Self>, owner: &str, host_id: HostId) -> HostLockGuard {
        let key = (owner.to_string(), host_id);
        let lock = {
            let mut locks = self.table();
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        HostLockGuard {
            table: Arc::clone(self),
            key,
            guard: Some(guard),
        }
    }

    /// 当前登记的锁数量
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, HashMap<LockKey, Arc<AsyncMutex<()>>>> {
        // 持锁期间不会 panic，遇到 poison 直接取回数据
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 主机锁 guard
#[derive(Debug)]
pub struct HostLockGuard {
    table: Arc<HostLockTable>,
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for HostLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.table.table();
        // 没有其他等待者时回收条目
        if let Some(lock) = locks.get(&self.key)
            && Arc::strong_count(lock) == 1
        {
            locks.remove(&self.key);
        }
    }
}
