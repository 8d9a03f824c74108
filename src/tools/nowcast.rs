use super::respond;
use super::wrapper::{ToolPayload, ToolReply};
use crate::errors::ToolError;
use crate::model::coverage::{self, CoverageArea};
use crate::model::{
    Coordinate, Lang, NowcastPoint, PrecipClass, Resolution, ResolvedWindow, SourceMeta,
    TimeWindow, WeatherPoint,
};
use crate::services::met::{self, PointResponse, TimeStep};
use crate::services::upstream::{FetchOptions, UpstreamClient};
use chrono::{Duration, Utc};
use rmcp::schemars;

pub const TOOL_NAME: &str = "weather.get_nowcast";
pub const PRODUCT: &str = "Nowcast 2.0";

/// Nowcast data only exists for the immediate future.
const WINDOW_CAP_HOURS: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NowcastRequest {
    pub location: Coordinate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,

    #[serde(default)]
    pub language: Lang,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowcastPayload {
    pub location: Coordinate,
    pub time_window: ResolvedWindow,
    pub points: Vec<NowcastPoint>,
    pub source: SourceMeta,
}

impl ToolPayload for NowcastPayload {
    fn source(&self) -> Option<&SourceMeta> {
        Some(&self.source)
    }
}

pub async fn run(
    proxy: &UpstreamClient, request: NowcastRequest,
) -> Result<ToolReply<NowcastPayload>, ToolError> {
    coverage::validate_coordinates(&request.location)?;
    coverage::require_coverage(CoverageArea::Nordic, &request.location)?;
    let window = coverage::cap_window(
        coverage::resolve_time_window(request.time_window.as_ref(), Utc::now())?,
        Duration::hours(WINDOW_CAP_HOURS),
    );

    let path = format!(
        "weatherapi/nowcast/2.0/complete?lat={:.4}&lon={:.4}",
        request.location.lat, request.location.lon
    );
    let response = proxy.fetch(&path, FetchOptions::default()).await?;
    let wire: PointResponse = serde_json::from_value(response.data).map_err(|err| {
        ToolError::upstream_unavailable(format!("unexpected {PRODUCT} payload: {err}"))
    })?;

    let steps = met::select_steps(wire.properties.timeseries, &window, Resolution::Hourly);
    let points = normalise(steps);
    let source = respond::source_metadata(PRODUCT, &response.cache);
    let summary = summarise(request.language, &request.location, &points);

    Ok(ToolReply {
        payload: NowcastPayload { location: request.location, time_window: window, points, source },
        summary,
    })
}

/// Rate bounds: 0 none, under 2.5 light, under 10 moderate, heavy above.
pub fn classify_precipitation(rate: f64) -> PrecipClass {
    if rate <= 0.0 {
        PrecipClass::None
    } else if rate < 2.5 {
        PrecipClass::Light
    } else if rate < 10.0 {
        PrecipClass::Moderate
    } else {
        PrecipClass::Heavy
    }
}

fn normalise(steps: Vec<TimeStep>) -> Vec<NowcastPoint> {
    steps
        .into_iter()
        .filter_map(|step| {
            let symbol_code = step.symbol_code();
            // The classifier needs a number; a missing rate counts as dry.
            let rate = step.precipitation_rate().unwrap_or(0.0);
            let details = step.data.instant.details;
            let temperature = details.air_temperature?;
            let wind_speed = details.wind_speed?;
            Some(NowcastPoint {
                point: WeatherPoint {
                    time: step.time,
                    temperature,
                    wind_speed,
                    wind_direction: details.wind_from_direction,
                    precipitation_rate: Some(rate),
                    humidity: details.relative_humidity,
                    cloud_cover: details.cloud_area_fraction,
                    symbol_code,
                    temperature_p10: None,
                    temperature_p90: None,
                },
                precipitation_class: classify_precipitation(rate),
            })
        })
        .collect()
}

fn summarise(language: Lang, location: &Coordinate, points: &[NowcastPoint]) -> String {
    let Some(first) = points.first() else {
        return match language {
            Lang::En => "No nowcast data available right now.".to_string(),
            Lang::Nb => "Ingen nåvarseldata tilgjengelig akkurat nå.".to_string(),
        };
    };
    let rate = first.point.precipitation_rate.unwrap_or(0.0);
    match language {
        Lang::En => format!(
            "Nowcast for {:.2}, {:.2}: {:.1}°C, wind {:.1} m/s, precipitation {} ({:.1} mm/h).",
            location.lat, location.lon, first.point.temperature, first.point.wind_speed,
            first.precipitation_class, rate
        ),
        Lang::Nb => format!(
            "Nåvarsel for {:.2}, {:.2}: {:.1}°C, vind {:.1} m/s, nedbør {} ({:.1} mm/t).",
            location.lat, location.lon, first.point.temperature, first.point.wind_speed,
            first.precipitation_class, rate
        ),
    }
}
