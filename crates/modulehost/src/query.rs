//! 查询辅助函数
//!
//! 负责注入开发商账号、套上请求的截止时间，并在失败时带 rid 记录日志。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cmdb_common::types::{BusinessId, HostId, ModuleId};
use tracing::warn;

use crate::context::ContextParams;
use crate::error::StoreError;
use crate::storage::{ModuleCatalog, RelationField, RelationFilter, RelationStore};
use crate::types::{ModuleField, ModuleHostRelation, ModuleRecord};

/// 统计满足条件的关系数
pub async fn count_by_cond(
    ctx: &ContextParams,
    store: &dyn RelationStore,
    filter: RelationFilter,
) -> Result<u64, StoreError> {
    let filter = filter.with_owner(&ctx.owner);
    ctx.bounded(store.count(&filter)).await.inspect_err(|e| {
        warn!(rid = %ctx.rid, "count module host relations failed: {}, filter: {:?}", e, filter)
    })
}

/// 按模块 ID 查询业务下的模块，结果按模块 ID 索引
pub async fn module_info_by_module_id(
    ctx: &ContextParams,
    catalog: &dyn ModuleCatalog,
    business_id: BusinessId,
    module_ids: &[ModuleId],
    fields: &[ModuleField],
) -> Result<HashMap<ModuleId, ModuleRecord>, StoreError> {
    let records = ctx
        .bounded(catalog.modules_by_id(&ctx.owner, business_id, module_ids, fields))
        .await
        .inspect_err(|e| {
            warn!(
                rid = %ctx.rid,
                "get modules failed: {}, business: {}, modules: {:?}",
                e, business_id, module_ids
            )
        })?;

    Ok(records
        .into_iter()
        .map(|record| (record.module_id, record))
        .collect())
}

/// 查询业务下一组主机的关系，按主机 ID 分组
///
/// 没有任何关系的主机不会出现在结果中。
pub async fn host_module_map_by_host_id(
    ctx: &ContextParams,
    store: &dyn RelationStore,
    business_id: BusinessId,
    host_ids: &[HostId],
) -> Result<BTreeMap<HostId, Vec<ModuleHostRelation>>, StoreError> {
    let filter = RelationFilter::new()
        .business(business_id)
        .hosts(host_ids.iter().copied())
        .with_owner(&ctx.owner);
    let rows = ctx.bounded(store.find_all(&filter)).await.inspect_err(|e| {
        warn!(
            rid = %ctx.rid,
            "get host module relations failed: {}, business: {}, hosts: {:?}",
            e, business_id, host_ids
        )
    })?;

    let mut grouped: BTreeMap<HostId, Vec<ModuleHostRelation>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.host_id).or_default().push(row);
    }
    Ok(grouped)
}

/// 查询主机在指定业务以外的关系，返回去重后的 (业务, 模块)
pub async fn host_foreign_relations(
    ctx: &ContextParams,
    store: &dyn RelationStore,
    host_id: HostId,
    business_id: BusinessId,
) -> Result<Vec<(BusinessId, ModuleId)>, StoreError> {
    let filter = RelationFilter::new()
        .not_business(business_id)
        .hosts([host_id])
        .with_owner(&ctx.owner);
    let projections = ctx
        .bounded(store.find_fields(
            &filter,
            &[RelationField::BusinessId, RelationField::ModuleId],
        ))
        .await
        .inspect_err(|e| {
            warn!(
                rid = %ctx.rid,
                "get host foreign relations failed: {}, host: {}, business: {}",
                e, host_id, business_id
            )
        })?;

    let mut relations = BTreeSet::new();
    for projection in projections {
        match (projection.business_id, projection.module_id) {
            (Some(business_id), Some(module_id)) => {
                relations.insert((business_id, module_id));
            }
            _ => {
                return Err(StoreError::Malformed(format!(
                    "relation projection of host {host_id} is missing business or module"
                )));
            }
        }
    }
    Ok(relations.into_iter().collect())
}
