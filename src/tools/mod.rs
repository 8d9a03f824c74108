//! Tool registry: every tool goes through the same instrumentation wrapper,
//! composite tools invoke their sub-tools through it as well, and the rmcp
//! handler only translates wrapper outcomes into protocol envelopes.

pub mod activity;
pub mod air_quality;
pub mod forecast;
pub mod marine;
pub mod nowcast;
pub mod observations;
pub mod places;
pub mod respond;
pub mod route_risk;
pub mod wrapper;

use crate::errors::ToolError;
use crate::gazetteer::{GazetteerStore, PlaceResolver};
use crate::metrics::MetricsRegistry;
use crate::services::upstream::{RequestPolicy, UpstreamClient};
use crate::Settings;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, GetPromptRequestParam, GetPromptResult, ListPromptsResult,
    ListResourcesResult, PaginatedRequestParam, ReadResourceRequestParam, ReadResourceResult,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to set up upstream client: {0}")]
    Upstream(#[from] ToolError),
}

/// Shared, read-only dependencies of every tool call. Clients are stateless
/// and safe for concurrent use; the metrics registry serialises its own
/// updates.
#[derive(Debug)]
pub struct ToolDeps {
    pub proxy: UpstreamClient,
    pub stations: UpstreamClient,
    pub resolver: Option<PlaceResolver>,
    pub metrics: Arc<MetricsRegistry>,
}

impl ToolDeps {
    pub async fn from_settings(settings: &Settings) -> Result<Self, BootstrapError> {
        let proxy = UpstreamClient::new(RequestPolicy::proxy(
            settings.proxy.base_url.clone(),
            settings.proxy.timeout,
            settings.proxy.connect_timeout,
        ))?;

        let client_id = settings
            .stations
            .client_id
            .as_ref()
            .map(|secret| secret.expose_secret().clone());
        if client_id.is_none() {
            warn!("no stations client id configured; stations requests go out unauthenticated");
        }
        let stations = UpstreamClient::new(RequestPolicy::stations(
            settings.stations.base_url.clone(),
            client_id.as_deref(),
            settings.stations.timeout,
        ))?;

        let resolver = match GazetteerStore::open(&settings.gazetteer.path).await {
            Ok(store) => Some(PlaceResolver::new(store)),
            Err(error) => {
                warn!(%error, "gazetteer unavailable; places.resolve_name will answer with an error");
                None
            },
        };

        Ok(Self { proxy, stations, resolver, metrics: Arc::new(MetricsRegistry::new()) })
    }

    pub fn for_tests(proxy: UpstreamClient, stations: UpstreamClient) -> Self {
        Self { proxy, stations, resolver: None, metrics: Arc::new(MetricsRegistry::new()) }
    }
}

#[derive(Clone)]
pub struct McpServer {
    deps: Arc<ToolDeps>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl McpServer {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps, tool_router: Self::tool_router() }
    }

    pub fn deps(&self) -> &ToolDeps {
        &self.deps
    }

    #[tool(
        name = "weather.get_forecast",
        description = "Hourly or 3-hourly weather forecast (Locationforecast 2.0) for a coordinate"
    )]
    async fn get_forecast(
        &self, Parameters(request): Parameters<forecast::ForecastRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = input_value(&request);
        envelope(
            wrapper::run_tool(&self.deps.metrics, forecast::TOOL_NAME, input, || {
                forecast::run(&self.deps.proxy, request)
            })
            .await,
        )
    }

    #[tool(
        name = "weather.get_nowcast",
        description = "Short-term precipitation nowcast (Nowcast 2.0), Nordic coverage, next two hours"
    )]
    async fn get_nowcast(
        &self, Parameters(request): Parameters<nowcast::NowcastRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = input_value(&request);
        envelope(
            wrapper::run_tool(&self.deps.metrics, nowcast::TOOL_NAME, input, || {
                nowcast::run(&self.deps.proxy, request)
            })
            .await,
        )
    }

    #[tool(
        name = "weather.get_air_quality",
        description = "Air quality forecast with AQI category, dominant pollutant and advice"
    )]
    async fn get_air_quality(
        &self, Parameters(request): Parameters<air_quality::AirQualityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = input_value(&request);
        envelope(
            wrapper::run_tool(&self.deps.metrics, air_quality::TOOL_NAME, input, || {
                air_quality::run(&self.deps.proxy, request)
            })
            .await,
        )
    }

    #[tool(
        name = "weather.get_marine",
        description = "Sea state forecast (Oceanforecast 2.0) with vessel-specific risk levels"
    )]
    async fn get_marine(
        &self, Parameters(request): Parameters<marine::MarineRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = input_value(&request);
        envelope(
            wrapper::run_tool(&self.deps.metrics, marine::TOOL_NAME, input, || {
                marine::run(&self.deps.proxy, request)
            })
            .await,
        )
    }

    #[tool(
        name = "weather.get_recent_observations",
        description = "Recent station observations, by station id or nearest to a coordinate"
    )]
    async fn get_recent_observations(
        &self, Parameters(request): Parameters<observations::ObservationsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = input_value(&request);
        envelope(
            wrapper::run_tool(&self.deps.metrics, observations::TOOL_NAME, input, || {
                observations::run(&self.deps.stations, request)
            })
            .await,
        )
    }

    #[tool(
        name = "weather.assess_activity_windows",
        description = "Score hourly comfort for an activity and identify the best windows"
    )]
    async fn assess_activity_windows(
        &self, Parameters(request): Parameters<activity::ActivityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = input_value(&request);
        envelope(
            wrapper::run_tool(&self.deps.metrics, activity::TOOL_NAME, input, || {
                activity::run(&self.deps, request)
            })
            .await,
        )
    }

    #[tool(
        name = "weather.assess_route_risk",
        description = "Aggregate vessel-specific marine risk along a route into a trip verdict"
    )]
    async fn assess_route_risk(
        &self, Parameters(request): Parameters<route_risk::RouteRiskRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = input_value(&request);
        envelope(
            wrapper::run_tool(&self.deps.metrics, route_risk::TOOL_NAME, input, || {
                route_risk::run(&self.deps, request)
            })
            .await,
        )
    }

    #[tool(
        name = "places.resolve_name",
        description = "Resolve a Norwegian place name to ranked coordinates with confidence scores"
    )]
    async fn resolve_name(
        &self, Parameters(request): Parameters<places::ResolveNameRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = input_value(&request);
        envelope(
            wrapper::run_tool(&self.deps.metrics, places::TOOL_NAME, input, || {
                places::run(self.deps.resolver.as_ref(), request)
            })
            .await,
        )
    }
}

fn input_value<T: Serialize>(request: &T) -> serde_json::Value {
    serde_json::to_value(request).unwrap_or_default()
}

/// Wrapper outcome → protocol envelope. Typed failures become error
/// envelopes; fatal ones (a panicking body) become the transport's generic
/// protocol error without leaking internals.
fn envelope<T: wrapper::ToolPayload>(
    outcome: Result<wrapper::ToolReply<T>, ToolError>,
) -> Result<CallToolResult, McpError> {
    match outcome {
        Ok(reply) => match serde_json::to_value(&reply.payload) {
            Ok(structured) => Ok(respond::tool_response(structured, reply.summary)),
            Err(error) => {
                error!(%error, "failed to serialise tool payload");
                Err(McpError::internal_error("Internal server error", None))
            },
        },
        Err(error) if error.is_fatal() => {
            Err(McpError::internal_error("Internal server error", None))
        },
        Err(error) => Ok(respond::error_response(&error)),
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Weather and place tools for Norway and the Nordic seas. Data tools fetch MET \
                 Norway products through a caching proxy and attach provider attribution plus \
                 cache freshness; composite tools score activity comfort and aggregate marine \
                 route risk; places.resolve_name answers fuzzy Norwegian place-name queries."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult { resources: crate::resources::catalog(), next_cursor: None, meta: None })
    }

    async fn read_resource(
        &self, request: ReadResourceRequestParam, _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        crate::resources::read(&request.uri, &self.deps).await
    }

    async fn list_prompts(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult { prompts: crate::resources::prompts(), next_cursor: None, meta: None })
    }

    async fn get_prompt(
        &self, request: GetPromptRequestParam, _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        crate::resources::prompt(&request.name, request.arguments.as_ref())
    }
}
