//! 存储后端抽象
//!
//! 转移引擎只依赖这两个 trait，SQLite 实现见 [`super::sqlite`]，
//! 测试中可以包装实现来注入故障。

use async_trait::async_trait;
use cmdb_common::types::{BusinessId, ModuleId};

use super::filter::{RelationField, RelationFilter, RelationProjection};
use crate::error::StoreError;
use crate::types::{ModuleField, ModuleHostRelation, ModuleRecord};

/// 主机-模块关系表访问接口
///
/// 所有过滤条件都必须已注入开发商账号，否则返回 [`StoreError::MissingOwner`]。
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// 统计满足条件的关系行数
    async fn count(&self, filter: &RelationFilter) -> Result<u64, StoreError>;

    /// 读取指定列，结果去重；`fields` 为空时读取全部列
    async fn find_fields(
        &self,
        filter: &RelationFilter,
        fields: &[RelationField],
    ) -> Result<Vec<RelationProjection>, StoreError>;

    /// 读取完整关系行
    async fn find_all(&self, filter: &RelationFilter)
    -> Result<Vec<ModuleHostRelation>, StoreError>;

    /// 按条件删除，返回删除行数
    async fn delete_by_filter(&self, filter: &RelationFilter) -> Result<u64, StoreError>;

    /// 插入关系行
    async fn insert(&self, rows: &[ModuleHostRelation]) -> Result<(), StoreError>;
}

/// 模块表只读接口
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    /// 查询业务下的模块，不存在或不属于该业务的模块不会出现在结果中
    async fn modules_by_id(
        &self,
        owner: &str,
        business_id: BusinessId,
        module_ids: &[ModuleId],
        fields: &[ModuleField],
    ) -> Result<Vec<ModuleRecord>, StoreError>;
}
