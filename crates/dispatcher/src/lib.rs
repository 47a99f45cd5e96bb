//! # Dispatcher
//!
//! 消息总线与分发模块。
//!
//! 负责：
//! - 提供有界发布总线 (`bus`)，满时丢弃而不是阻塞发布方
//! - Fan-out 到多个 sinks，按 topic 过滤
//! - 进程内订阅 (`DispatcherBuilder::subscribe`)，供 watchdog 消费
//! - 隔离慢 sink，不阻塞主链路

pub mod bus;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use bus::{bus, BusPublisher};
pub use contracts::{DataSink, Envelope};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{BusMetrics, SinkMetrics, SinkSnapshot};
pub use sinks::{
    ChannelSink, FileSink, FileSinkConfig, LogSink, NetworkFormat, NetworkSink, NetworkSinkConfig,
};
