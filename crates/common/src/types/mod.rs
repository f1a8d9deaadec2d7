//! CMDB 标识类型
//!
//! 业务、模块、主机都使用数据库自增整数作为标识，开发商账号（租户）使用字符串

/// 业务 ID
pub type BusinessId = i64;

/// 模块 ID，在所属业务内唯一
pub type ModuleId = i64;

/// 主机 ID
pub type HostId = i64;

/// 开发商账号（租户标识），所有集合都按它隔离
pub type Owner = String;

/// 未指定开发商账号时使用的默认值
pub const DEFAULT_OWNER: &str = "0";
