//! Process-wide metrics registry with a line-oriented text exposition.
//!
//! Counters are integers, latency averages render with two decimals and the
//! cache hit ratio with four, one `# HELP`/`# TYPE` pair per metric.

use crate::model::CacheStatus;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Mutex;
use strum_macros::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

#[derive(Debug, Clone, Default)]
struct MetricsInner {
    tool_calls: BTreeMap<(String, Outcome), u64>,
    cache_status: BTreeMap<CacheStatus, u64>,
    latency: BTreeMap<String, (f64, u64)>,
}

/// Shared by every concurrent call; mutation goes through the increment
/// methods only, readers export from a snapshot.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    inner: Mutex<MetricsInner>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tool_call(&self, tool: &str, outcome: Outcome) {
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        *inner.tool_calls.entry((tool.to_string(), outcome)).or_insert(0) += 1;
    }

    pub fn record_latency(&self, tool: &str, latency_ms: f64) {
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        let entry = inner.latency.entry(tool.to_string()).or_insert((0.0, 0));
        entry.0 += latency_ms.max(0.0);
        entry.1 += 1;
    }

    pub fn record_cache_status(&self, status: CacheStatus) {
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        *inner.cache_status.entry(status).or_insert(0) += 1;
    }

    pub fn tool_calls(&self, tool: &str, outcome: Outcome) -> u64 {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        inner.tool_calls.get(&(tool.to_string(), outcome)).copied().unwrap_or(0)
    }

    pub fn average_latency_ms(&self, tool: &str) -> f64 {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        match inner.latency.get(tool) {
            Some((sum, count)) if *count > 0 => sum / *count as f64,
            _ => 0.0,
        }
    }

    /// hits / (hits + misses), 0 when the denominator is 0.
    pub fn cache_hit_ratio(&self) -> f64 {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        Self::hit_ratio_of(&inner)
    }

    fn hit_ratio_of(inner: &MetricsInner) -> f64 {
        let hits = inner.cache_status.get(&CacheStatus::Hit).copied().unwrap_or(0);
        let misses = inner.cache_status.get(&CacheStatus::Miss).copied().unwrap_or(0);
        if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        }
    }

    /// Text exposition of every metric, rendered from a snapshot so readers
    /// never hold the lock while formatting.
    pub fn render(&self) -> String {
        let snapshot = self.inner.lock().expect("metrics lock poisoned").clone();

        let mut out = String::new();
        let _ = writeln!(out, "# HELP nordvaer_tool_calls_total Tool invocations by tool and outcome.");
        let _ = writeln!(out, "# TYPE nordvaer_tool_calls_total counter");
        for ((tool, outcome), count) in &snapshot.tool_calls {
            let _ = writeln!(
                out,
                "nordvaer_tool_calls_total{{tool=\"{tool}\",outcome=\"{outcome}\"}} {count}"
            );
        }

        let _ = writeln!(out, "# HELP nordvaer_tool_latency_avg_ms Average tool latency in milliseconds.");
        let _ = writeln!(out, "# TYPE nordvaer_tool_latency_avg_ms gauge");
        for (tool, (sum, count)) in &snapshot.latency {
            let avg = if *count > 0 { sum / *count as f64 } else { 0.0 };
            let _ = writeln!(out, "nordvaer_tool_latency_avg_ms{{tool=\"{tool}\"}} {avg:.2}");
        }

        let _ = writeln!(out, "# HELP nordvaer_cache_requests_total Upstream cache lookups by status.");
        let _ = writeln!(out, "# TYPE nordvaer_cache_requests_total counter");
        for (status, count) in &snapshot.cache_status {
            let _ = writeln!(out, "nordvaer_cache_requests_total{{status=\"{status}\"}} {count}");
        }

        let _ = writeln!(out, "# HELP nordvaer_cache_hit_ratio Cache hits over hits plus misses.");
        let _ = writeln!(out, "# TYPE nordvaer_cache_hit_ratio gauge");
        let _ = writeln!(out, "nordvaer_cache_hit_ratio {:.4}", Self::hit_ratio_of(&snapshot));

        out
    }
}
