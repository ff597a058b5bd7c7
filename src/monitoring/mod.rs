pub mod metrics;
pub mod stats_collector;

pub use metrics::PlayerMetrics;
pub use stats_collector::StatsCollector;
