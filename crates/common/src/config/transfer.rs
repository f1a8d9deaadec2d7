//! 主机转移配置
//!
//! 控制主机-模块转移引擎的并发保护和入口校验策略

use serde::{Deserialize, Serialize};

/// `TransferHostModule` 入口的目标模块校验策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostModuleGate {
    /// 目标模块必须全部是业务的默认模块（空闲机/故障机/待回收），与历史行为一致
    #[default]
    DefaultModulesOnly,
    /// 只做参数校验，允许转移到普通模块
    ParameterOnly,
}

/// 主机转移配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// 是否启用进程内主机级咨询锁
    ///
    /// 启用后同一 (开发商账号, 主机) 的读取-计算-写入周期串行执行，
    /// 避免两个并发批次对同一主机造成更新丢失。默认开启。
    #[serde(default = "default_host_lock")]
    pub host_lock: bool,

    /// `TransferHostModule` 入口校验策略
    #[serde(default)]
    pub host_module_gate: HostModuleGate,

    /// 单次请求的截止时间（毫秒），0 表示不限制
    ///
    /// 由调用方据此设置请求上下文的 deadline，引擎本身不做超时。
    #[serde(default)]
    pub request_timeout_ms: u64,
}

fn default_host_lock() -> bool {
    true
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            host_lock: default_host_lock(),
            host_module_gate: HostModuleGate::default(),
            request_timeout_ms: 0,
        }
    }
}

impl TransferConfig {
    /// 请求截止时间，未配置时返回 None
    pub fn request_timeout(&self) -> Option<std::time::Duration> {
        (self.request_timeout_ms > 0)
            .then(|| std::time::Duration::from_millis(self.request_timeout_ms))
    }
}
