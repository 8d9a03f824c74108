//! Instrumentation applied to every tool call, composites' inner calls
//! included: request context, start/end logs with a sanitised input summary,
//! call/latency metrics and the cache-status side effect.

use crate::context::{self, ToolContext};
use crate::errors::{ErrorCode, ToolError};
use crate::metrics::{MetricsRegistry, Outcome};
use crate::model::{CacheStatus, SourceMeta};
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Input keys allowed into logs; everything else is dropped.
const INPUT_LOG_KEYS: &[&str] = &[
    "location",
    "timeWindow",
    "resolution",
    "language",
    "activityType",
    "vesselType",
    "query",
    "limit",
];

/// A tool body's result: the structured payload plus the one-line summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolReply<T> {
    pub payload: T,
    pub summary: String,
}

pub trait ToolPayload: Serialize {
    /// Attribution carried by the payload, when it has one; drives the
    /// cache-status counter.
    fn source(&self) -> Option<&SourceMeta> {
        None
    }
}

/// Whitelist filter over the serialised input.
pub fn sanitize_input(input: &serde_json::Value) -> serde_json::Value {
    match input {
        serde_json::Value::Object(map) => {
            let filtered: serde_json::Map<String, serde_json::Value> = map
                .iter()
                .filter(|(key, _)| INPUT_LOG_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            serde_json::Value::Object(filtered)
        },
        _ => serde_json::Value::Object(serde_json::Map::new()),
    }
}

/// Runs one tool body under a fresh request context.
///
/// Exactly one `tool.start` and one `tool.end` line share the generated
/// request id; counters are bumped before the end line is emitted so a
/// reader that sees the log also sees the metric. A panicking body is
/// recorded as an INTERNAL_ERROR outcome and surfaces as a fatal error the
/// transport turns into a protocol-level failure.
pub async fn run_tool<T, F, Fut>(
    metrics: &MetricsRegistry, tool: &'static str, input: serde_json::Value, body: F,
) -> Result<ToolReply<T>, ToolError>
where
    T: ToolPayload,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ToolReply<T>, ToolError>>,
{
    let ctx = ToolContext::new(tool);
    let request_id = ctx.request_id.clone();
    let started_at = ctx.started_at;

    info!(%request_id, tool, input = %sanitize_input(&input), "tool.start");

    let outcome =
        context::with_tool_context(ctx, AssertUnwindSafe(body()).catch_unwind()).await;
    let latency_ms = started_at.elapsed().as_millis() as f64;

    match outcome {
        Ok(Ok(reply)) => {
            metrics.record_tool_call(tool, Outcome::Success);
            metrics.record_latency(tool, latency_ms);
            if let Some(source) = reply.payload.source() {
                let status = if source.cached { CacheStatus::Hit } else { CacheStatus::Miss };
                metrics.record_cache_status(status);
            }
            info!(%request_id, tool, latency_ms, outcome = %Outcome::Success, "tool.end");
            Ok(reply)
        },
        Ok(Err(error)) => {
            metrics.record_tool_call(tool, Outcome::Error);
            metrics.record_latency(tool, latency_ms);
            warn!(
                %request_id,
                tool,
                latency_ms,
                outcome = %Outcome::Error,
                error_code = %error.code,
                "tool.end"
            );
            Err(error)
        },
        Err(_panic) => {
            metrics.record_tool_call(tool, Outcome::Error);
            metrics.record_latency(tool, latency_ms);
            error!(
                %request_id,
                tool,
                latency_ms,
                outcome = %Outcome::Error,
                error_code = %ErrorCode::InternalError,
                "tool.end"
            );
            Err(ToolError::internal_panic())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CacheMetadata;
    use crate::tools::respond;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Serialize)]
    struct EmptyPayload;

    impl ToolPayload for EmptyPayload {}

    #[derive(Debug, Serialize)]
    struct SourcedPayload {
        source: SourceMeta,
    }

    impl ToolPayload for SourcedPayload {
        fn source(&self) -> Option<&SourceMeta> {
            Some(&self.source)
        }
    }

    #[test]
    fn test_sanitize_input_keeps_whitelist_only() {
        let input = serde_json::json!({
            "location": { "lat": 59.91, "lon": 10.75 },
            "language": "nb",
            "route": [{ "lat": 59.9, "lon": 10.7 }],
            "apiKey": "oops",
        });
        let sanitized = sanitize_input(&input);
        assert_eq!(
            sanitized,
            serde_json::json!({
                "location": { "lat": 59.91, "lon": 10.75 },
                "language": "nb",
            })
        );
        assert_eq!(sanitize_input(&serde_json::json!("scalar")), serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_success_updates_counters_and_cache_status() {
        let metrics = MetricsRegistry::new();
        let cache = CacheMetadata { cached: true, age_seconds: Some(5), status: None };
        let reply = run_tool(&metrics, "weather.get_forecast", serde_json::json!({}), || async {
            Ok(ToolReply {
                payload: SourcedPayload {
                    source: respond::source_metadata("Locationforecast 2.0", &cache),
                },
                summary: "ok".to_string(),
            })
        })
        .await;

        claims::assert_ok!(reply);
        assert_eq!(metrics.tool_calls("weather.get_forecast", Outcome::Success), 1);
        assert_eq!(metrics.tool_calls("weather.get_forecast", Outcome::Error), 0);
        assert!((metrics.cache_hit_ratio() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_error_outcome_passes_through_unchanged() {
        let metrics = MetricsRegistry::new();
        let result: Result<ToolReply<EmptyPayload>, _> =
            run_tool(&metrics, "weather.get_nowcast", serde_json::json!({}), || async {
                Err(ToolError::invalid_input("bad window"))
            })
            .await;

        let error = claims::assert_err!(result);
        assert_eq!(error.code, ErrorCode::InvalidInput);
        assert_eq!(error.message, "bad window");
        assert_eq!(metrics.tool_calls("weather.get_nowcast", Outcome::Error), 1);
    }

    #[tokio::test]
    async fn test_body_observes_request_context() {
        let metrics = MetricsRegistry::new();
        let reply = run_tool(&metrics, "places.resolve_name", serde_json::json!({}), || async {
            assert!(crate::context::current_request_id().is_some());
            assert_eq!(crate::context::current_tool(), Some("places.resolve_name"));
            Ok(ToolReply { payload: EmptyPayload, summary: "ok".to_string() })
        })
        .await;
        claims::assert_ok!(reply);
    }

    #[tokio::test]
    async fn test_panicking_body_becomes_fatal_internal_error() {
        let metrics = MetricsRegistry::new();
        let result: Result<ToolReply<EmptyPayload>, _> =
            run_tool(&metrics, "weather.get_marine", serde_json::json!({}), || async {
                panic!("boom")
            })
            .await;

        let error = claims::assert_err!(result);
        assert_eq!(error.code, ErrorCode::InternalError);
        assert!(error.is_fatal());
        assert_eq!(metrics.tool_calls("weather.get_marine", Outcome::Error), 1);
    }
}
