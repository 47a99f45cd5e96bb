//! Run statistics.

use std::time::Duration;

use acquisition::BridgeSnapshot;
use contracts::InterruptLevel;
use dispatcher::SinkSnapshot;
use observability::GuardSummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub duration: Duration,

    /// Watchdog evaluations published
    pub ticks: u64,

    /// Camera advances
    pub rotations: u64,

    /// Messages seen by the safety monitor
    pub observed: u64,

    /// Level of the last evaluation
    pub final_level: Option<InterruptLevel>,

    pub bridge: BridgeSnapshot,

    /// `(accepted, dropped)` on the publish bus
    pub bus: (u64, u64),

    /// Messages published per simulated feed
    pub feeds: Vec<(String, u64)>,

    pub sinks: Vec<(String, SinkSnapshot)>,

    pub guard: GuardSummary,
}

impl PipelineStats {
    /// Evaluations per second
    pub fn tick_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of bus traffic dropped, in percent
    pub fn bus_drop_rate(&self) -> f64 {
        let (accepted, dropped) = self.bus;
        let total = accepted + dropped;
        if total > 0 {
            dropped as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   Motion Guard Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let level = self.final_level.map(InterruptLevel::as_str).unwrap_or("none");
        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Evaluations: {} ({:.1}/s)", self.ticks, self.tick_rate());
        println!("   ├─ Final level: {level}");
        println!("   ├─ Camera rotations: {}", self.rotations);
        println!("   └─ Monitor messages: {}", self.observed);

        let b = &self.bridge;
        println!("\n📷 Acquisition Bridge");
        println!("   ├─ Payloads received: {}", b.payloads_received);
        println!("   ├─ Payloads dropped: {}", b.payloads_dropped);
        println!("   ├─ Messages published: {}", b.messages_published);
        println!("   └─ Publish failures: {}", b.publish_failures);

        let (accepted, dropped) = self.bus;
        println!("\n🚌 Bus");
        println!("   ├─ Accepted: {accepted}");
        println!("   └─ Dropped: {dropped} ({:.2}%)", self.bus_drop_rate());

        if !self.feeds.is_empty() {
            println!("\n💓 Simulated Feeds");
            for (source, sent) in &self.feeds {
                println!("   ├─ {source}: {sent}");
            }
        }

        if !self.sinks.is_empty() {
            println!("\n📤 Sinks");
            for (name, s) in &self.sinks {
                println!(
                    "   ├─ {name}: written={} failed={} dropped={} filtered={}",
                    s.written, s.failed, s.dropped, s.filtered
                );
            }
        }

        println!("\n{}", self.guard);
    }
}
