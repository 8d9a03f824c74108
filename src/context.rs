//! Per-call request context, observable from any code running on the call's
//! logical task without being passed explicitly.

use std::future::Future;
use std::time::Instant;

tokio::task_local! {
    static TOOL_CONTEXT: ToolContext;
}

#[derive(Debug, Clone)]
pub struct ToolContext {
    pub request_id: String,
    pub tool: &'static str,
    pub started_at: Instant,
}

impl ToolContext {
    pub fn new(tool: &'static str) -> Self {
        Self { request_id: cuid2::create_id(), tool, started_at: Instant::now() }
    }
}

/// Runs `f` with `ctx` bound for its whole duration, including every
/// asynchronous continuation. Scopes nest: a sub-tool call shadows its
/// parent's binding until it completes.
pub async fn with_tool_context<F: Future>(ctx: ToolContext, f: F) -> F::Output {
    TOOL_CONTEXT.scope(ctx, f).await
}

/// Within a tool call this is always defined.
pub fn current_request_id() -> Option<String> {
    TOOL_CONTEXT.try_with(|ctx| ctx.request_id.clone()).ok()
}

pub fn current_tool() -> Option<&'static str> {
    TOOL_CONTEXT.try_with(|ctx| ctx.tool).ok()
}
