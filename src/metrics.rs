//! Per-tool invocation metrics.
//!
//! Every `tools/call` for an advertised tool records its outcome and
//! response time. Summaries are served by the `metrics://tools` resource.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default, Clone)]
struct ToolStats {
    total: u64,
    successful: u64,
    failed: u64,
    min: Option<Duration>,
    max: Option<Duration>,
    sum: Duration,
    last_execution: Option<DateTime<Utc>>,
}

impl ToolStats {
    fn record(&mut self, elapsed: Duration, success: bool, at: DateTime<Utc>) {
        self.total += 1;
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.min = Some(self.min.map_or(elapsed, |m| m.min(elapsed)));
        self.max = Some(self.max.map_or(elapsed, |m| m.max(elapsed)));
        self.sum += elapsed;
        self.last_execution = Some(self.last_execution.map_or(at, |t| t.max(at)));
    }

    fn merge(&mut self, other: &ToolStats) {
        self.total += other.total;
        self.successful += other.successful;
        self.failed += other.failed;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.sum += other.sum;
        self.last_execution = match (self.last_execution, other.last_execution) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    fn summary(&self) -> MetricsSummary {
        let avg = (self.total > 0).then(|| self.sum.as_secs_f64() / self.total as f64);
        MetricsSummary {
            total_executions: self.total,
            successful_executions: self.successful,
            failed_executions: self.failed,
            failure_rate: if self.total > 0 {
                self.failed as f64 / self.total as f64
            } else {
                0.0
            },
            min_response_time: self.min.map(|d| d.as_secs_f64()),
            max_response_time: self.max.map(|d| d.as_secs_f64()),
            avg_response_time: avg,
            last_execution_time: self
                .last_execution
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

/// Aggregated invocation figures. Response times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub failure_rate: f64,
    pub min_response_time: Option<f64>,
    pub max_response_time: Option<f64>,
    pub avg_response_time: Option<f64>,
    pub last_execution_time: Option<String>,
}

/// Body of the `metrics://tools` resource.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub totals: MetricsSummary,
    pub tools: BTreeMap<String, MetricsSummary>,
}

/// Invocation metrics for a fixed set of tools.
///
/// Names outside that set are ignored, so unknown tool calls cannot grow
/// the table.
#[derive(Debug)]
pub struct ToolMetrics {
    stats: Mutex<BTreeMap<&'static str, ToolStats>>,
}

impl ToolMetrics {
    pub fn new(tools: &[&'static str]) -> Self {
        Self {
            stats: Mutex::new(tools.iter().map(|&t| (t, ToolStats::default())).collect()),
        }
    }

    pub fn record(&self, tool: &str, elapsed: Duration, success: bool, at: DateTime<Utc>) {
        if let Some(stats) = self.stats.lock().get_mut(tool) {
            stats.record(elapsed, success, at);
        }
    }

    pub fn summary(&self, tool: &str) -> Option<MetricsSummary> {
        self.stats.lock().get(tool).map(ToolStats::summary)
    }

    /// Figures across every tool.
    pub fn aggregate(&self) -> MetricsSummary {
        let stats = self.stats.lock();
        let mut totals = ToolStats::default();
        for s in stats.values() {
            totals.merge(s);
        }
        totals.summary()
    }

    pub fn report(&self) -> MetricsReport {
        let tools = self
            .stats
            .lock()
            .iter()
            .map(|(&name, s)| (name.to_string(), s.summary()))
            .collect();
        MetricsReport {
            totals: self.aggregate(),
            tools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, secs).unwrap()
    }

    #[test]
    fn empty_summary() {
        let metrics = ToolMetrics::new(&["a"]);
        let s = metrics.summary("a").unwrap();
        assert_eq!(s.total_executions, 0);
        assert_eq!(s.failure_rate, 0.0);
        assert!(s.avg_response_time.is_none());
        assert!(s.last_execution_time.is_none());
    }

    #[test]
    fn records_success_and_failure() {
        let metrics = ToolMetrics::new(&["a", "b"]);
        metrics.record("a", Duration::from_millis(100), true, at(1));
        metrics.record("a", Duration::from_millis(300), false, at(5));
        metrics.record("b", Duration::from_millis(50), true, at(3));

        let a = metrics.summary("a").unwrap();
        assert_eq!(a.total_executions, 2);
        assert_eq!(a.successful_executions, 1);
        assert_eq!(a.failed_executions, 1);
        assert_eq!(a.failure_rate, 0.5);
        assert_eq!(a.min_response_time, Some(0.1));
        assert_eq!(a.max_response_time, Some(0.3));
        assert_eq!(a.avg_response_time, Some(0.2));
        assert_eq!(a.last_execution_time.as_deref(), Some("2025-01-15T12:00:05Z"));

        let totals = metrics.aggregate();
        assert_eq!(totals.total_executions, 3);
        assert_eq!(totals.min_response_time, Some(0.05));
        assert_eq!(totals.last_execution_time.as_deref(), Some("2025-01-15T12:00:05Z"));
    }

    #[test]
    fn unknown_tools_are_ignored() {
        let metrics = ToolMetrics::new(&["a"]);
        metrics.record("nope", Duration::from_millis(1), false, at(0));
        assert!(metrics.summary("nope").is_none());
        assert_eq!(metrics.aggregate().total_executions, 0);
    }
}
