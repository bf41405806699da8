//! End-of-run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::MetricsSummary;
use sensors::Backend;

/// Statistics from one server run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub duration: Duration,
    pub backend: Backend,
    /// Broadcast and sensor-fault totals
    pub summary: MetricsSummary,
    /// Per cloud sink counters
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl RunStats {
    /// Snapshots per second
    pub fn rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.summary.snapshots as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Server Statistics                         ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Backend: {}", self.backend);
        println!("   └─ Snapshot rate: {:.2}/s\n", self.rate());

        print!("{}", self.summary);

        if !self.sinks.is_empty() {
            println!("\n📤 Cloud Sinks");
            for (i, (name, m)) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: published {}, failed {}, dropped {}, skipped {}",
                    prefix, name, m.published, m.failures, m.dropped, m.skipped
                );
            }
        }

        println!();
    }
}
