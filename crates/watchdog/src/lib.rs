//! # Watchdog
//!
//! 运动安全看门狗：心跳新鲜度 + 近距离检测。
//!
//! 负责：
//! - 记录每个心跳源的最后到达时间
//! - 按固定节拍评估并发布 interrupt level (0 CLEAR / 1 STALE / 2 PROXIMITY)
//! - 对超声波扫描做近距离判定
//!
//! ## 使用示例
//!
//! ```ignore
//! use watchdog::{HeartbeatRegistry, ProximityFilter, SafetyAggregator, SafetyMonitor};
//!
//! let registry = Arc::new(HeartbeatRegistry::from_config(&blueprint.watchdog)?);
//! let filter = Arc::new(ProximityFilter::from_config(&blueprint.proximity));
//! let aggregator = Arc::new(SafetyAggregator::new(
//!     registry,
//!     filter.clone(),
//!     publisher,
//!     blueprint.topics.interrupt.clone(),
//! ));
//! let monitor = SafetyMonitor::new(&blueprint, filter, aggregator.clone())?;
//!
//! tokio::spawn(async move { monitor.run(subscription).await });
//! aggregator.run(blueprint.watchdog.cadence(), shutdown).await;
//! ```

mod aggregator;
mod error;
mod monitor;
mod proximity;
mod registry;

pub use aggregator::{combine, Evaluation, SafetyAggregator};
pub use error::{Result, WatchdogError};
pub use monitor::{Observation, SafetyMonitor};
pub use proximity::{ProximityFilter, ProximityHit};
pub use registry::{HeartbeatRegistry, SourceKey, SourceStatus};
