use super::respond;
use super::wrapper::{ToolPayload, ToolReply};
use crate::errors::ToolError;
use crate::model::coverage;
use crate::model::{
    Coordinate, Lang, Resolution, ResolvedWindow, SourceMeta, TimeWindow, WeatherPoint,
};
use crate::services::met::{self, PointResponse, TimeStep};
use crate::services::upstream::{FetchOptions, UpstreamClient};
use chrono::Utc;
use rmcp::schemars;

pub const TOOL_NAME: &str = "weather.get_forecast";
pub const PRODUCT: &str = "Locationforecast 2.0";

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRequest {
    #[schemars(description = "Point to forecast for")]
    pub location: Coordinate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,

    #[schemars(description = "Sample spacing, hourly or 3-hourly")]
    #[serde(default)]
    pub resolution: Resolution,

    #[serde(default)]
    pub language: Lang,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPayload {
    pub location: Coordinate,
    pub time_window: ResolvedWindow,
    pub resolution: Resolution,
    pub points: Vec<WeatherPoint>,
    pub source: SourceMeta,
}

impl ToolPayload for ForecastPayload {
    fn source(&self) -> Option<&SourceMeta> {
        Some(&self.source)
    }
}

pub async fn run(
    proxy: &UpstreamClient, request: ForecastRequest,
) -> Result<ToolReply<ForecastPayload>, ToolError> {
    coverage::validate_coordinates(&request.location)?;
    let window = coverage::resolve_time_window(request.time_window.as_ref(), Utc::now())?;

    let response = proxy.fetch(&product_path(&request.location), FetchOptions::default()).await?;
    let wire: PointResponse = serde_json::from_value(response.data).map_err(|err| {
        ToolError::upstream_unavailable(format!("unexpected {PRODUCT} payload: {err}"))
    })?;

    let steps = met::select_steps(wire.properties.timeseries, &window, request.resolution);
    let points = normalise(steps);
    let source = respond::source_metadata(PRODUCT, &response.cache);
    let summary = summarise(request.language, &request.location, &points);

    Ok(ToolReply {
        payload: ForecastPayload {
            location: request.location,
            time_window: window,
            resolution: request.resolution,
            points,
            source,
        },
        summary,
    })
}

pub(crate) fn product_path(location: &Coordinate) -> String {
    let mut path = format!(
        "weatherapi/locationforecast/2.0/complete?lat={:.4}&lon={:.4}",
        location.lat, location.lon
    );
    if let Some(altitude) = location.altitude {
        path.push_str(&format!("&altitude={}", altitude.round() as i64));
    }
    path
}

/// Steps without an instant temperature or wind speed carry nothing a
/// consumer can use and are dropped.
fn normalise(steps: Vec<TimeStep>) -> Vec<WeatherPoint> {
    steps
        .into_iter()
        .filter_map(|step| {
            let symbol_code = step.symbol_code();
            let precipitation_rate = step.precipitation_rate();
            let details = step.data.instant.details;
            let temperature = details.air_temperature?;
            let wind_speed = details.wind_speed?;
            Some(WeatherPoint {
                time: step.time,
                temperature,
                wind_speed,
                wind_direction: details.wind_from_direction,
                precipitation_rate,
                humidity: details.relative_humidity,
                cloud_cover: details.cloud_area_fraction,
                symbol_code,
                temperature_p10: details.air_temperature_percentile_10,
                temperature_p90: details.air_temperature_percentile_90,
            })
        })
        .collect()
}

fn summarise(language: Lang, location: &Coordinate, points: &[WeatherPoint]) -> String {
    let Some(first) = points.first() else {
        return match language {
            Lang::En => "No forecast data available for the requested window.".to_string(),
            Lang::Nb => "Ingen varseldata tilgjengelig for det valgte tidsrommet.".to_string(),
        };
    };
    match language {
        Lang::En => format!(
            "Forecast for {:.2}, {:.2}: {} points. First hour {:.1}°C, wind {:.1} m/s ({}).",
            location.lat,
            location.lon,
            points.len(),
            first.temperature,
            first.wind_speed,
            first.symbol_code
        ),
        Lang::Nb => format!(
            "Varsel for {:.2}, {:.2}: {} punkter. Første time {:.1}°C, vind {:.1} m/s ({}).",
            location.lat,
            location.lon,
            points.len(),
            first.temperature,
            first.wind_speed,
            first.symbol_code
        ),
    }
}
