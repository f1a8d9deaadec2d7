//! Prometheus 监控指标模块
//!
//! 提供全局指标收集和导出功能

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::Once;

use crate::error::Result;

static METRICS_INIT: Once = Once::new();

lazy_static! {
    /// 全局 Prometheus Registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// 批量转移调用次数（按入口和结果分组）
    pub static ref TRANSFER_BATCHES: IntCounterVec = IntCounterVec::new(
        Opts::new("transfer_batches_total", "Total number of host transfer batch calls")
            .namespace("cmdb"),
        &["operation", "result"]
    ).unwrap();

    /// 单主机转移次数（按入口和结果分组）
    pub static ref HOST_TRANSFERS: IntCounterVec = IntCounterVec::new(
        Opts::new("host_transfers_total", "Total number of single host transfers")
            .namespace("cmdb"),
        &["operation", "result"]
    ).unwrap();
}

/// 注册所有指标到全局 Registry
///
/// This function is idempotent - calling it multiple times is safe.
/// Only the first call will actually register the metrics.
pub fn register_metrics() -> Result<()> {
    let mut result = Ok(());

    METRICS_INIT.call_once(|| {
        let register_result = (|| {
            REGISTRY.register(Box::new(TRANSFER_BATCHES.clone()))?;
            REGISTRY.register(Box::new(HOST_TRANSFERS.clone()))?;
            Ok::<(), prometheus::Error>(())
        })();

        if let Err(e) = register_result {
            result = Err(e.into());
        }
    });

    result
}

/// 记录一次批量转移结果
pub fn record_batch(operation: &str, result: &str) {
    TRANSFER_BATCHES
        .with_label_values(&[operation, result])
        .inc();
}

/// 记录一次单主机转移结果
pub fn record_host(operation: &str, result: &str) {
    HOST_TRANSFERS.with_label_values(&[operation, result]).inc();
}

/// 导出 Prometheus 格式的指标
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}
