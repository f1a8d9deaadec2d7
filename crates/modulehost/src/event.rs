//! 主机关系变更事件

use cmdb_common::types::{BusinessId, HostId, ModuleId, Owner};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// 事件类型
pub const HOST_RELATION_CHANGED: &str = "host-module-relation-changed";

/// 一个主机在目标业务下的关系变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRelationEvent {
    pub event_kind: String,
    pub owner: Owner,
    pub rid: String,
    pub business_id: BusinessId,
    pub host_id: HostId,
    pub old_module_ids: Vec<ModuleId>,
    pub new_module_ids: Vec<ModuleId>,
    /// 跨业务转移时被清理掉的原业务
    pub retired_business_ids: Vec<BusinessId>,
}

/// 事件下发接口
///
/// 引擎不关心投递结果，实现方自行处理失败。
pub trait EventNotifier: Send + Sync {
    fn emit(&self, event: HostRelationEvent);
}

/// 以结构化日志输出事件
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl EventNotifier for TracingNotifier {
    fn emit(&self, event: HostRelationEvent) {
        info!(
            event_kind = %event.event_kind,
            owner = %event.owner,
            rid = %event.rid,
            business_id = event.business_id,
            host_id = event.host_id,
            old = ?event.old_module_ids,
            new = ?event.new_module_ids,
            retired = ?event.retired_business_ids,
            "host module relation changed"
        );
    }
}

/// 通过 tokio channel 转发事件
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<HostRelationEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostRelationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventNotifier for ChannelNotifier {
    fn emit(&self, event: HostRelationEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(
                rid = %e.0.rid,
                "Event receiver dropped, host {} relation change not delivered",
                e.0.host_id
            );
        }
    }
}
