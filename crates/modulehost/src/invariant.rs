//! 默认模块与普通模块互斥规则
//!
//! 同一 (开发商账号, 业务, 主机) 的关系要么恰好是一个默认模块，要么是一个或多个普通模块。
//! 底层存储不能保证这一点，所以目标模块集合（参数校验）和每个主机计算出的新关系集合
//! 都要经过同一个检查函数。

use std::fmt;

use cmdb_common::types::ModuleId;

use crate::types::ModuleKind;

/// 违反互斥规则的具体方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindViolation {
    /// 默认模块与普通模块同时存在
    Mixed {
        inner: Vec<ModuleId>,
        normal: Vec<ModuleId>,
    },
    /// 同时存在多个默认模块
    MultipleInner(Vec<ModuleId>),
}

impl fmt::Display for KindViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindViolation::Mixed { inner, normal } => write!(
                f,
                "default modules {inner:?} cannot coexist with normal modules {normal:?}"
            ),
            KindViolation::MultipleInner(ids) => {
                write!(f, "at most one default module is allowed, got {ids:?}")
            }
        }
    }
}

/// 检查模块集合是否满足互斥规则
///
/// 空集合视为满足。
pub fn check_module_kinds<I>(modules: I) -> Result<(), KindViolation>
where
    I: IntoIterator<Item = (ModuleId, ModuleKind)>,
{
    let (inner, normal): (Vec<_>, Vec<_>) =
        modules.into_iter().partition(|(_, kind)| kind.is_inner());
    let inner: Vec<ModuleId> = inner.into_iter().map(|(id, _)| id).collect();
    let normal: Vec<ModuleId> = normal.into_iter().map(|(id, _)| id).collect();

    if !inner.is_empty() && !normal.is_empty() {
        return Err(KindViolation::Mixed { inner, normal });
    }
    if inner.len() > 1 {
        return Err(KindViolation::MultipleInner(inner));
    }
    Ok(())
}
