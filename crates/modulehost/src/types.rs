//! 主机-模块关系核心数据结构

use cmdb_common::types::{BusinessId, HostId, ModuleId, Owner};
use serde::{Deserialize, Serialize};

/// 模块类型
///
/// 持久化为整数 `default_kind`：0 普通模块，1 空闲机，2 故障机，3 待回收，
/// 更大的值是后续新增的内置模块。除普通模块外都属于"默认模块"（内置模块）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ModuleKind {
    Normal,
    Idle,
    Fault,
    Recycle,
    Other(i64),
}

impl ModuleKind {
    /// 是否为默认模块（空闲机/故障机/待回收等）
    pub fn is_inner(&self) -> bool {
        !matches!(self, ModuleKind::Normal)
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            ModuleKind::Normal => 0,
            ModuleKind::Idle => 1,
            ModuleKind::Fault => 2,
            ModuleKind::Recycle => 3,
            ModuleKind::Other(n) => *n,
        }
    }
}

impl TryFrom<i64> for ModuleKind {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ModuleKind::Normal),
            1 => Ok(ModuleKind::Idle),
            2 => Ok(ModuleKind::Fault),
            3 => Ok(ModuleKind::Recycle),
            n if n > 3 => Ok(ModuleKind::Other(n)),
            n => Err(format!("invalid module default kind: {n}")),
        }
    }
}

impl From<ModuleKind> for i64 {
    fn from(kind: ModuleKind) -> Self {
        kind.as_i64()
    }
}

/// 模块记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub module_id: ModuleId,
    pub business_id: BusinessId,
    pub kind: ModuleKind,
    /// 仅在请求了 [`ModuleField::Name`] 时加载
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 模块查询可选字段
///
/// 模块 ID、业务 ID 与模块类型总是加载，转移逻辑依赖它们。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleField {
    Name,
}

/// 主机-模块关系行
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleHostRelation {
    pub owner: Owner,
    pub business_id: BusinessId,
    pub host_id: HostId,
    pub module_id: ModuleId,
}

/// 批量操作中单个主机的失败记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionResult {
    pub host_id: HostId,
    pub message: String,
    pub code: i64,
}

/// 转移主机到业务默认模块的请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferHostToInnerModule {
    pub business_id: BusinessId,
    pub module_id: ModuleId,
    pub host_ids: Vec<HostId>,
}

/// 转移主机到模块的请求，`is_increment` 为 true 时追加而非替换
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsModuleRelation {
    pub business_id: BusinessId,
    pub module_ids: Vec<ModuleId>,
    #[serde(default)]
    pub is_increment: bool,
    pub host_ids: Vec<HostId>,
}

/// 跨业务转移主机的请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferHostsCrossBusiness {
    pub dst_business_id: BusinessId,
    pub dst_module_ids: Vec<ModuleId>,
    pub host_ids: Vec<HostId>,
}

/// 单个主机转移完成后的关系变化
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub host_id: HostId,
    /// 目标业务下新增的模块
    pub inserted: Vec<ModuleId>,
    /// 目标业务下移除的模块
    pub deleted: Vec<ModuleId>,
    /// 跨业务转移时被清理掉关系的原业务
    pub retired_businesses: Vec<BusinessId>,
}

impl TransferOutcome {
    /// 没有任何写入
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty() && self.retired_businesses.is_empty()
    }
}
