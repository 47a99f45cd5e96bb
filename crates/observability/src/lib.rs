//! # Observability
//!
//! 可观测性模块：Prometheus 指标与运行摘要。
//!
//! ## 功能
//!
//! - Prometheus 指标导出 (可选 HTTP 端口)
//! - 心跳、payload、轮换与中断等级的指标 helper
//! - Watchdog 评估统计与运行摘要
//!
//! Tracing subscriber 由 CLI 根据 `-v/-q/--log-format` 安装，这里只负责指标。
//! 未安装 recorder 时所有 `record_*` 调用都是空操作。
//!
//! ## 使用示例
//!
//! ```ignore
//! observability::init_metrics_only(9000)?;
//!
//! let evaluation = aggregator.evaluate_at(Instant::now());
//! observability::record_interrupt_level(evaluation.level);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;

// Re-exports
pub use crate::metrics::{
    record_heartbeat, record_interrupt_level, record_level_transition, record_message_dispatched,
    record_payload_dropped, record_payload_received, record_proximity_trigger,
    record_publish_dropped, record_rotation, record_source_age, GuardMetricsAggregator,
    GuardSummary, RunningStats, StatsSummary,
};

/// 安装 Prometheus recorder 并在 `0.0.0.0:port` 暴露 `/metrics`
///
/// 只能调用一次；第二次安装会失败。
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
