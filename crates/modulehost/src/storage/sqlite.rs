//! SQLite 存储实现

use std::collections::BTreeSet;

use async_trait::async_trait;
use cmdb_common::storage::Database;
use cmdb_common::types::{BusinessId, ModuleId};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use super::backend::{ModuleCatalog, RelationStore};
use super::filter::{RelationField, RelationFilter, RelationProjection};
use crate::error::{StoreError, StoreOp};
use crate::types::{ModuleField, ModuleHostRelation, ModuleKind, ModuleRecord};

/// 基于 [`Database`] 连接池的关系存储和模块目录
#[derive(Clone, Debug)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// 写入或更新模块目录
    pub async fn insert_modules(
        &self,
        owner: &str,
        modules: &[ModuleRecord],
    ) -> Result<(), StoreError> {
        if owner.is_empty() {
            return Err(StoreError::MissingOwner);
        }
        if modules.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .db
            .get_pool()
            .begin()
            .await
            .map_err(StoreError::query(StoreOp::Insert))?;

        for module in modules {
            sqlx::query(
                "INSERT INTO module (owner, business_id, module_id, module_name, default_kind)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(owner, business_id, module_id)
                 DO UPDATE SET module_name = excluded.module_name,
                               default_kind = excluded.default_kind",
            )
            .bind(owner)
            .bind(module.business_id)
            .bind(module.module_id)
            .bind(module.name.as_deref().unwrap_or_default())
            .bind(module.kind.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::query(StoreOp::Insert))?;
        }

        tx.commit()
            .await
            .map_err(StoreError::query(StoreOp::Insert))?;

        debug!("Upserted {} modules for owner {}", modules.len(), owner);
        Ok(())
    }
}

/// 追加 WHERE 子句
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, owner: &str, filter: &RelationFilter) {
    qb.push(" WHERE owner = ").push_bind(owner.to_string());
    if let Some(business_id) = filter.business_id() {
        qb.push(" AND business_id = ").push_bind(business_id);
    }
    if let Some(business_id) = filter.excluded_business_id() {
        qb.push(" AND business_id <> ").push_bind(business_id);
    }
    push_in(qb, "host_id", filter.host_ids());
    push_in(qb, "module_id", filter.module_ids());
}

fn push_in(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, ids: Option<&[i64]>) {
    let Some(ids) = ids else {
        return;
    };
    if ids.is_empty() {
        qb.push(" AND 0");
        return;
    }
    qb.push(" AND ").push(column).push(" IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl RelationStore for SqliteStore {
    async fn count(&self, filter: &RelationFilter) -> Result<u64, StoreError> {
        let owner = filter.require_owner()?;
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM module_host_config");
        push_filter(&mut qb, owner, filter);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.db.get_pool())
            .await
            .map_err(StoreError::query(StoreOp::Select))?;

        u64::try_from(count).map_err(|_| StoreError::Malformed(format!("negative count {count}")))
    }

    async fn find_fields(
        &self,
        filter: &RelationFilter,
        fields: &[RelationField],
    ) -> Result<Vec<RelationProjection>, StoreError> {
        let owner = filter.require_owner()?;
        let fields = if fields.is_empty() {
            &RelationField::ALL[..]
        } else {
            fields
        };

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT DISTINCT ");
        let mut columns = qb.separated(", ");
        for field in fields {
            columns.push(field.column());
        }
        qb.push(" FROM module_host_config");
        push_filter(&mut qb, owner, filter);

        let rows = qb
            .build()
            .fetch_all(self.db.get_pool())
            .await
            .map_err(StoreError::query(StoreOp::Select))?;

        let mut projections = BTreeSet::new();
        for row in rows {
            let mut projection = RelationProjection::default();
            for field in fields {
                let value: i64 = row
                    .try_get(field.column())
                    .map_err(|e| StoreError::Malformed(e.to_string()))?;
                match field {
                    RelationField::BusinessId => projection.business_id = Some(value),
                    RelationField::HostId => projection.host_id = Some(value),
                    RelationField::ModuleId => projection.module_id = Some(value),
                }
            }
            projections.insert(projection);
        }

        Ok(projections.into_iter().collect())
    }

    async fn find_all(
        &self,
        filter: &RelationFilter,
    ) -> Result<Vec<ModuleHostRelation>, StoreError> {
        let owner = filter.require_owner()?;
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT owner, business_id, host_id, module_id FROM module_host_config",
        );
        push_filter(&mut qb, owner, filter);
        qb.push(" ORDER BY business_id, host_id, module_id");

        let rows = qb
            .build_query_as::<(String, i64, i64, i64)>()
            .fetch_all(self.db.get_pool())
            .await
            .map_err(StoreError::query(StoreOp::Select))?;

        Ok(rows
            .into_iter()
            .map(|(owner, business_id, host_id, module_id)| ModuleHostRelation {
                owner,
                business_id,
                host_id,
                module_id,
            })
            .collect())
    }

    async fn delete_by_filter(&self, filter: &RelationFilter) -> Result<u64, StoreError> {
        filter.require_delete_bounds()?;
        let owner = filter.require_owner()?;
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM module_host_config");
        push_filter(&mut qb, owner, filter);

        let result = qb
            .build()
            .execute(self.db.get_pool())
            .await
            .map_err(StoreError::query(StoreOp::Delete))?;

        Ok(result.rows_affected())
    }

    async fn insert(&self, rows: &[ModuleHostRelation]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        if rows.iter().any(|r| r.owner.is_empty()) {
            return Err(StoreError::MissingOwner);
        }

        // 同一批写入放在一个事务里
        let mut tx = self
            .db
            .get_pool()
            .begin()
            .await
            .map_err(StoreError::query(StoreOp::Insert))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO module_host_config (owner, business_id, host_id, module_id)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&row.owner)
            .bind(row.business_id)
            .bind(row.host_id)
            .bind(row.module_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::query(StoreOp::Insert))?;
        }

        tx.commit()
            .await
            .map_err(StoreError::query(StoreOp::Insert))
    }
}

#[async_trait]
impl ModuleCatalog for SqliteStore {
    async fn modules_by_id(
        &self,
        owner: &str,
        business_id: BusinessId,
        module_ids: &[ModuleId],
        fields: &[ModuleField],
    ) -> Result<Vec<ModuleRecord>, StoreError> {
        if owner.is_empty() {
            return Err(StoreError::MissingOwner);
        }
        if module_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT module_id, business_id, default_kind, module_name FROM module WHERE owner = ",
        );
        qb.push_bind(owner.to_string());
        qb.push(" AND business_id = ").push_bind(business_id);
        push_in(&mut qb, "module_id", Some(module_ids));
        qb.push(" ORDER BY module_id");

        let rows = qb
            .build_query_as::<(i64, i64, i64, String)>()
            .fetch_all(self.db.get_pool())
            .await
            .map_err(StoreError::query(StoreOp::Select))?;

        let with_name = fields.contains(&ModuleField::Name);
        rows.into_iter()
            .map(|(module_id, business_id, kind, name)| {
                Ok(ModuleRecord {
                    module_id,
                    business_id,
                    kind: ModuleKind::try_from(kind).map_err(StoreError::Malformed)?,
                    name: with_name.then_some(name),
                })
            })
            .collect()
    }
}
