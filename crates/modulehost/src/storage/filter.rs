//! 主机-模块关系查询条件

use cmdb_common::types::{BusinessId, HostId, ModuleId, Owner};

use crate::error::StoreError;

/// 关系表过滤条件
///
/// 所有条件之间是 AND 关系。`hosts([])` / `modules([])` 不匹配任何行。
/// 交给存储之前必须调用 [`RelationFilter::with_owner`] 注入开发商账号。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationFilter {
    owner: Option<Owner>,
    business_id: Option<BusinessId>,
    excluded_business_id: Option<BusinessId>,
    host_ids: Option<Vec<HostId>>,
    module_ids: Option<Vec<ModuleId>>,
}

impl RelationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn business(mut self, business_id: BusinessId) -> Self {
        self.business_id = Some(business_id);
        self
    }

    /// 排除指定业务
    pub fn not_business(mut self, business_id: BusinessId) -> Self {
        self.excluded_business_id = Some(business_id);
        self
    }

    pub fn hosts(mut self, host_ids: impl IntoIterator<Item = HostId>) -> Self {
        self.host_ids = Some(host_ids.into_iter().collect());
        self
    }

    pub fn modules(mut self, module_ids: impl IntoIterator<Item = ModuleId>) -> Self {
        self.module_ids = Some(module_ids.into_iter().collect());
        self
    }

    /// 注入开发商账号
    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn business_id(&self) -> Option<BusinessId> {
        self.business_id
    }

    pub fn excluded_business_id(&self) -> Option<BusinessId> {
        self.excluded_business_id
    }

    pub fn host_ids(&self) -> Option<&[HostId]> {
        self.host_ids.as_deref()
    }

    pub fn module_ids(&self) -> Option<&[ModuleId]> {
        self.module_ids.as_deref()
    }

    /// 返回开发商账号，未注入时报错
    pub fn require_owner(&self) -> Result<&str, StoreError> {
        match self.owner.as_deref() {
            Some(owner) if !owner.is_empty() => Ok(owner),
            _ => Err(StoreError::MissingOwner),
        }
    }

    /// 删除必须限定主机或模块，不允许按业务整体删除
    pub fn require_delete_bounds(&self) -> Result<(), StoreError> {
        self.require_owner()?;
        if self.host_ids.is_none() && self.module_ids.is_none() {
            return Err(StoreError::UnboundedDelete);
        }
        Ok(())
    }
}

/// `find_fields` 可选择的列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationField {
    BusinessId,
    HostId,
    ModuleId,
}

impl RelationField {
    pub const ALL: [RelationField; 3] = [
        RelationField::BusinessId,
        RelationField::HostId,
        RelationField::ModuleId,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            RelationField::BusinessId => "business_id",
            RelationField::HostId => "host_id",
            RelationField::ModuleId => "module_id",
        }
    }
}

/// `find_fields` 的结果行，只有请求的列有值
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationProjection {
    pub business_id: Option<BusinessId>,
    pub host_id: Option<HostId>,
    pub module_id: Option<ModuleId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_requires_owner() {
        let filter = RelationFilter::new().business(1).hosts([10]);
        assert!(matches!(
            filter.require_owner(),
            Err(StoreError::MissingOwner)
        ));

        let filter = filter.with_owner("0");
        assert_eq!(filter.require_owner().unwrap(), "0");
    }

    #[test]
    fn test_delete_bounds() {
        let business_only = RelationFilter::new().business(1).with_owner("0");
        assert!(matches!(
            business_only.require_delete_bounds(),
            Err(StoreError::UnboundedDelete)
        ));
        let by_host = business_only.hosts([3]);
        assert!(by_host.require_delete_bounds().is_ok());
    }
}
