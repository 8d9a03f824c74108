//! Attribution constants and the dual-shape response envelope: one text
//! block with the short human summary plus a machine-readable structured
//! payload.

use crate::errors::ToolError;
use crate::model::{CacheMetadata, SourceMeta};
use rmcp::model::{CallToolResult, Content};

pub const PROVIDER: &str = "MET Norway";
pub const LICENSE_URI: &str = "https://creativecommons.org/licenses/by/4.0/";
pub const CREDIT_LINE: &str = "Data from MET Norway, licensed under CC BY 4.0";

pub const GAZETTEER_PROVIDER: &str = "Kartverket";
pub const GAZETTEER_LICENSE_URI: &str = "https://creativecommons.org/licenses/by/4.0/";
pub const GAZETTEER_CREDIT_LINE: &str =
    "Place names from the Norwegian Mapping Authority, licensed under CC BY 4.0";

pub fn source_metadata(product: &str, cache: &CacheMetadata) -> SourceMeta {
    SourceMeta {
        provider: PROVIDER.to_string(),
        product: product.to_string(),
        license_uri: LICENSE_URI.to_string(),
        credit_line: CREDIT_LINE.to_string(),
        cached: cache.cached,
        age_seconds: cache.age_seconds,
    }
}

pub fn tool_response(structured: serde_json::Value, summary: impl Into<String>) -> CallToolResult {
    let summary = summary.into();
    debug_assert!(!summary.is_empty(), "tool summaries must be non-empty");
    let mut result = CallToolResult::success(vec![Content::text(summary)]);
    result.structured_content = Some(structured);
    result
}

/// The error message, suffixed with the retry hint when one is known.
pub fn error_summary(error: &ToolError) -> String {
    match error.details.retry_after_seconds {
        Some(seconds) => format!("{} Retry after {seconds} seconds.", error.message),
        None => error.message.clone(),
    }
}

/// Error envelope; attribution is never attached to failures.
pub fn error_response(error: &ToolError) -> CallToolResult {
    let mut result = CallToolResult::error(vec![Content::text(error_summary(error))]);
    result.structured_content = Some(serde_json::json!({ "error": error.record() }));
    result
}
