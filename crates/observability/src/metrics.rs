//! Motion guard 指标收集模块
//!
//! Thin wrappers over the `metrics` facade so every crate reports with the
//! same names and labels, plus an in-memory aggregator for the run summary.

use std::collections::HashMap;

use contracts::InterruptLevel;
use metrics::{counter, gauge, histogram};

/// 记录一次 watchdog 评估结果
pub fn record_interrupt_level(level: InterruptLevel) {
    gauge!("motion_guard_interrupt_level").set(f64::from(level.as_u8()));
    counter!("motion_guard_evaluations_total", "level" => level.as_str()).increment(1);
}

/// 记录 level 跳变
pub fn record_level_transition(from: InterruptLevel, to: InterruptLevel) {
    counter!(
        "motion_guard_level_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// 记录单个 source 的心跳年龄
pub fn record_source_age(source: &str, age_secs: f64, stale: bool) {
    histogram!("motion_guard_source_age_ms", "source" => source.to_string())
        .record(age_secs * 1000.0);
    if stale {
        counter!("motion_guard_source_stale_total", "source" => source.to_string()).increment(1);
    }
}

/// 记录心跳到达
pub fn record_heartbeat(source: &str) {
    counter!("motion_guard_heartbeats_total", "source" => source.to_string()).increment(1);
}

/// 记录近距离触发
pub fn record_proximity_trigger(sector: usize, range_m: f32) {
    counter!("motion_guard_proximity_triggers_total", "sector" => sector.to_string()).increment(1);
    histogram!("motion_guard_proximity_range_m").record(f64::from(range_m));
}

/// 记录硬件 payload 接收
pub fn record_payload_received(kind: &'static str) {
    counter!("motion_guard_payloads_received_total", "kind" => kind).increment(1);
}

/// 记录硬件 payload 丢弃
pub fn record_payload_dropped(kind: &'static str, reason: &'static str) {
    counter!(
        "motion_guard_payloads_dropped_total",
        "kind" => kind,
        "reason" => reason
    )
    .increment(1);
}

/// 记录相机轮换
pub fn record_rotation(frame_label: &str) {
    counter!("motion_guard_rotations_total", "camera" => frame_label.to_string()).increment(1);
}

/// 记录发布队列溢出
pub fn record_publish_dropped(topic: &str) {
    counter!("motion_guard_publish_dropped_total", "topic" => topic.to_string()).increment(1);
}

/// 记录消息分发
pub fn record_message_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "motion_guard_messages_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Watchdog 指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct GuardMetricsAggregator {
    /// 评估次数
    pub evaluations: u64,

    /// 各 level 出现次数 (clear / stale / proximity)
    pub level_counts: [u64; 3],

    /// level 跳变次数
    pub transitions: u64,

    /// 近距离触发次数
    pub proximity_triggers: u64,

    /// 各 source 过期次数
    pub stale_counts: HashMap<String, u64>,

    /// 各 source 心跳年龄统计 (ms)
    pub age_stats: HashMap<String, RunningStats>,

    last_level: Option<InterruptLevel>,
}

impl GuardMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    ///
    /// `sources` yields `(name, age_secs, stale)` for every watched source.
    pub fn update<'a>(
        &mut self,
        level: InterruptLevel,
        sources: impl IntoIterator<Item = (&'a str, f64, bool)>,
    ) {
        self.evaluations += 1;
        self.level_counts[usize::from(level.as_u8())] += 1;

        if self.last_level.is_some_and(|last| last != level) {
            self.transitions += 1;
        }
        self.last_level = Some(level);

        for (name, age_secs, stale) in sources {
            self.age_stats
                .entry(name.to_string())
                .or_default()
                .push(age_secs * 1000.0);
            if stale {
                *self.stale_counts.entry(name.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// 记录一次近距离触发
    pub fn record_proximity(&mut self) {
        self.proximity_triggers += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> GuardSummary {
        let rate = |n: u64| {
            if self.evaluations > 0 {
                n as f64 / self.evaluations as f64 * 100.0
            } else {
                0.0
            }
        };
        GuardSummary {
            evaluations: self.evaluations,
            clear_rate: rate(self.level_counts[0]),
            stale_rate: rate(self.level_counts[1]),
            proximity_rate: rate(self.level_counts[2]),
            transitions: self.transitions,
            proximity_triggers: self.proximity_triggers,
            stale_counts: self.stale_counts.clone(),
            source_age_ms: self
                .age_stats
                .iter()
                .map(|(name, stats)| (name.clone(), StatsSummary::from(stats)))
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct GuardSummary {
    pub evaluations: u64,
    pub clear_rate: f64,
    pub stale_rate: f64,
    pub proximity_rate: f64,
    pub transitions: u64,
    pub proximity_triggers: u64,
    pub stale_counts: HashMap<String, u64>,
    pub source_age_ms: HashMap<String, StatsSummary>,
}

impl std::fmt::Display for GuardSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Watchdog Summary ===")?;
        writeln!(f, "Evaluations: {}", self.evaluations)?;
        writeln!(
            f,
            "Levels: clear {:.2}%, stale {:.2}%, proximity {:.2}%",
            self.clear_rate, self.stale_rate, self.proximity_rate
        )?;
        writeln!(f, "Level transitions: {}", self.transitions)?;
        writeln!(f, "Proximity triggers: {}", self.proximity_triggers)?;

        if !self.source_age_ms.is_empty() {
            writeln!(f, "Heartbeat age (ms):")?;
            let mut names: Vec<_> = self.source_age_ms.keys().collect();
            names.sort();
            for name in names {
                let stale = self.stale_counts.get(name).copied().unwrap_or(0);
                writeln!(
                    f,
                    "  {}: {} stale={}",
                    name, self.source_age_ms[name], stale
                )?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
