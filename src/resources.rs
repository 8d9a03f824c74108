//! Static catalogs and prompt templates served over the resource and prompt
//! surfaces.

use crate::tools::respond;
use crate::tools::ToolDeps;
use rmcp::model::{
    AnnotateAble, GetPromptResult, JsonObject, Prompt, PromptMessage, PromptMessageRole,
    RawResource, ReadResourceResult, Resource, ResourceContents,
};
use rmcp::ErrorData as McpError;

pub const LICENSE_URI: &str = "weather://license";
pub const PRODUCTS_URI: &str = "weather://products";
pub const UNITS_URI: &str = "weather://units";
pub const EXAMPLES_EN_URI: &str = "weather://examples/en";
pub const EXAMPLES_NB_URI: &str = "weather://examples/nb";
pub const GAZETTEER_LICENSE_URI: &str = "gazetteer://license";
pub const GAZETTEER_INFO_URI: &str = "gazetteer://info";

fn entry(uri: &str, name: &str, description: &str, mime_type: &str) -> Resource {
    let mut raw = RawResource::new(uri, name.to_string());
    raw.description = Some(description.to_string());
    raw.mime_type = Some(mime_type.to_string());
    raw.no_annotation()
}

pub fn catalog() -> Vec<Resource> {
    vec![
        entry(
            LICENSE_URI,
            "Data licence",
            "Licence and credit line for the weather data",
            "text/plain",
        ),
        entry(PRODUCTS_URI, "Product catalog", "Products, coverage fences and window caps", "application/json"),
        entry(UNITS_URI, "Units", "Units used in structured payloads", "application/json"),
        entry(EXAMPLES_EN_URI, "Example payloads (en)", "Example tool invocations, English", "application/json"),
        entry(EXAMPLES_NB_URI, "Example payloads (nb)", "Example tool invocations, Norwegian Bokmål", "application/json"),
        entry(GAZETTEER_LICENSE_URI, "Gazetteer licence", "Licence for the place-name data", "text/plain"),
        entry(GAZETTEER_INFO_URI, "Gazetteer info", "Record count and build date of the loaded gazetteer", "application/json"),
    ]
}

pub async fn read(uri: &str, deps: &ToolDeps) -> Result<ReadResourceResult, McpError> {
    let text = match uri {
        LICENSE_URI => format!(
            "{}\nLicence: {}\nAttribution is mandatory on redistribution.",
            respond::CREDIT_LINE,
            respond::LICENSE_URI
        ),
        PRODUCTS_URI => products_document().to_string(),
        UNITS_URI => units_document().to_string(),
        EXAMPLES_EN_URI => examples_document("en").to_string(),
        EXAMPLES_NB_URI => examples_document("nb").to_string(),
        GAZETTEER_LICENSE_URI => format!(
            "{}\nLicence: {}",
            respond::GAZETTEER_CREDIT_LINE,
            respond::GAZETTEER_LICENSE_URI
        ),
        GAZETTEER_INFO_URI => {
            let Some(resolver) = &deps.resolver else {
                return Err(McpError::internal_error("no gazetteer loaded", None));
            };
            let info = resolver.store().info().await.map_err(|err| {
                McpError::internal_error(format!("gazetteer info query failed: {err}"), None)
            })?;
            serde_json::to_string(&info)
                .map_err(|err| McpError::internal_error(err.to_string(), None))?
        },
        _ => {
            return Err(McpError::resource_not_found(
                format!("unknown resource uri: {uri}"),
                None,
            ));
        },
    };
    Ok(ReadResourceResult { contents: vec![ResourceContents::text(text, uri)] })
}

fn products_document() -> serde_json::Value {
    serde_json::json!({
        "provider": respond::PROVIDER,
        "products": [
            { "tool": "weather.get_forecast", "product": "Locationforecast 2.0", "coverage": "global", "windowCapHours": null },
            { "tool": "weather.get_nowcast", "product": "Nowcast 2.0", "coverage": "nordic", "windowCapHours": 2 },
            { "tool": "weather.get_air_quality", "product": "Air quality forecast", "coverage": "domestic", "windowCapHours": null },
            { "tool": "weather.get_marine", "product": "Oceanforecast 2.0", "coverage": "coastal", "windowCapHours": 48 },
            { "tool": "weather.get_recent_observations", "product": "Frost observations", "coverage": "station network", "windowCapHours": 168 },
        ],
    })
}

fn units_document() -> serde_json::Value {
    serde_json::json!({
        "temperature": "°C",
        "windSpeed": "m/s",
        "direction": "degrees, meteorological",
        "precipitationRate": "mm/h",
        "humidity": "%",
        "cloudCover": "%",
        "waveHeight": "m",
        "currentSpeed": "m/s",
        "concentration": "µg/m³",
    })
}

fn examples_document(language: &str) -> serde_json::Value {
    serde_json::json!({
        "language": language,
        "examples": [
            {
                "tool": "weather.get_forecast",
                "arguments": {
                    "location": { "lat": 59.9139, "lon": 10.7522 },
                    "timeWindow": { "preset": "next_24h" },
                    "resolution": "hourly",
                    "language": language,
                },
            },
            {
                "tool": "weather.assess_activity_windows",
                "arguments": {
                    "location": { "lat": 63.4305, "lon": 10.3951 },
                    "activityType": "running",
                    "timeWindow": { "preset": "next_24h" },
                    "language": language,
                },
            },
            {
                "tool": "places.resolve_name",
                "arguments": { "query": "Tromsø", "limit": 5, "language": language },
            },
        ],
    })
}

pub fn prompts() -> Vec<Prompt> {
    vec![
        Prompt::new(
            "plan_outdoor_activity",
            Some(
                "Plan an outdoor activity: resolve the place name, score comfort per hour and \
                 suggest the best windows",
            ),
            None,
        ),
        Prompt::new(
            "plan_sea_crossing",
            Some(
                "Assess a small-vessel crossing: resolve both harbours, then aggregate marine \
                 risk along the route",
            ),
            None,
        ),
    ]
}

pub fn prompt(name: &str, arguments: Option<&JsonObject>) -> Result<GetPromptResult, McpError> {
    let argument = |key: &str| {
        arguments
            .and_then(|map| map.get(key))
            .and_then(|value| value.as_str())
            .map(str::to_string)
    };
    match name {
        "plan_outdoor_activity" => {
            let place = argument("location").unwrap_or_else(|| "<place name>".to_string());
            let activity = argument("activity").unwrap_or_else(|| "hiking".to_string());
            Ok(GetPromptResult {
                description: Some("Plan an outdoor activity around the weather".to_string()),
                messages: vec![PromptMessage::new_text(
                    PromptMessageRole::User,
                    format!(
                        "Use places.resolve_name to resolve \"{place}\", then call \
                         weather.assess_activity_windows for activity \"{activity}\" over the \
                         next 48 hours at the resolved coordinate. Summarise the best windows \
                         and what rules them in or out."
                    ),
                )],
            })
        },
        "plan_sea_crossing" => {
            let from = argument("from").unwrap_or_else(|| "<departure>".to_string());
            let to = argument("to").unwrap_or_else(|| "<destination>".to_string());
            let vessel = argument("vessel").unwrap_or_else(|| "kayak".to_string());
            Ok(GetPromptResult {
                description: Some("Assess marine risk along a route".to_string()),
                messages: vec![PromptMessage::new_text(
                    PromptMessageRole::User,
                    format!(
                        "Resolve \"{from}\" and \"{to}\" with places.resolve_name, build a \
                         short waypoint list between them, then call weather.assess_route_risk \
                         for a {vessel}. Report the verdict, the hotspots and the recommendation."
                    ),
                )],
            })
        },
        _ => Err(McpError::invalid_params(format!("unknown prompt: {name}"), None)),
    }
}
