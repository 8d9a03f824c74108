use super::respond;
use super::wrapper::{ToolPayload, ToolReply};
use crate::errors::ToolError;
use crate::model::coverage;
use crate::model::{
    Coordinate, Lang, ObservationPoint, ResolvedWindow, SourceMeta, Station, TimeWindow,
};
use crate::services::frost::{ObservationsResponse, SourcesResponse};
use crate::services::upstream::{FetchOptions, UpstreamClient};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use itertools::Itertools;
use rmcp::schemars;

pub const TOOL_NAME: &str = "weather.get_recent_observations";
pub const PRODUCT: &str = "Frost observations";

/// The station client is bounded to recent days.
const WINDOW_CAP_HOURS: i64 = 24 * 7;

/// Coordinate mode only considers stations this close.
const MAX_STATION_DISTANCE_KM: f64 = 50.0;

const ELEMENTS: &str =
    "air_temperature,wind_speed,wind_from_direction,relative_humidity,sum(precipitation_amount PT1H)";

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObservationsRequest {
    #[schemars(description = "Coordinate to find the nearest station for")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,

    #[schemars(description = "Explicit station id, bypassing the nearest-station search")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,

    #[serde(default)]
    pub language: Lang,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationsPayload {
    pub station: Station,
    pub time_window: ResolvedWindow,
    pub points: Vec<ObservationPoint>,
    pub source: SourceMeta,
}

impl ToolPayload for ObservationsPayload {
    fn source(&self) -> Option<&SourceMeta> {
        Some(&self.source)
    }
}

pub async fn run(
    stations: &UpstreamClient, request: ObservationsRequest,
) -> Result<ToolReply<ObservationsPayload>, ToolError> {
    let window = recent_window(request.time_window.as_ref(), Utc::now())?;

    let station = match (&request.station, &request.location) {
        (Some(id), _) => Station { id: id.clone(), name: id.clone(), distance_km: None },
        (None, Some(location)) => {
            coverage::validate_coordinates(location)?;
            nearest_station(stations, location).await?
        },
        (None, None) => {
            return Err(ToolError::invalid_input(
                "recent observations need either a `station` id or a `location`",
            ));
        },
    };

    let path = format!(
        "observations/v0.jsonld?sources={}&referencetime={}/{}&elements={}",
        station.id,
        window.from.to_rfc3339_opts(SecondsFormat::Secs, true),
        window.to.to_rfc3339_opts(SecondsFormat::Secs, true),
        ELEMENTS
    );
    let response = stations.fetch(&path, FetchOptions::default()).await?;
    let wire: ObservationsResponse = serde_json::from_value(response.data).map_err(|err| {
        ToolError::upstream_unavailable(format!("unexpected {PRODUCT} payload: {err}"))
    })?;

    let points = normalise(wire);
    // The stations API sits on a distinct host with no shared cache.
    let source = respond::source_metadata(PRODUCT, &response.cache);
    let summary = summarise(request.language, &station, &points);

    Ok(ToolReply {
        payload: ObservationsPayload { station, time_window: window, points, source },
        summary,
    })
}

/// Presets describe an extent, and for observations that extent reaches
/// backwards: `next_24h` means the most recent 24 hours. Explicit absolute
/// windows are taken as given. Either way the duration is capped to a week,
/// keeping the most recent part.
fn recent_window(
    window: Option<&TimeWindow>, now: DateTime<Utc>,
) -> Result<ResolvedWindow, ToolError> {
    let explicit = window.map_or(false, |w| w.preset.is_none() && w.from.is_some());
    let resolved = coverage::resolve_time_window(window, now)?;
    let mut resolved = if !explicit {
        ResolvedWindow { from: now - (resolved.to - resolved.from), to: now }
    } else {
        resolved
    };
    let cap = Duration::hours(WINDOW_CAP_HOURS);
    if resolved.to - resolved.from > cap {
        resolved.from = resolved.to - cap;
    }
    Ok(resolved)
}

async fn nearest_station(
    stations: &UpstreamClient, location: &Coordinate,
) -> Result<Station, ToolError> {
    let path = format!(
        "sources/v0.jsonld?types=SensorSystem&elements={}&geometry=nearest(POINT({} {}))&nearestmaxcount=5",
        ELEMENTS, location.lon, location.lat
    );
    let response = stations.fetch(&path, FetchOptions::default()).await?;
    let wire: SourcesResponse = serde_json::from_value(response.data).map_err(|err| {
        ToolError::upstream_unavailable(format!("unexpected station list payload: {err}"))
    })?;

    wire.data
        .into_iter()
        .filter(|source| source.distance.map_or(false, |km| km <= MAX_STATION_DISTANCE_KM))
        .sorted_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .next()
        .map(|source| Station {
            name: source.name.unwrap_or_else(|| source.id.clone()),
            id: source.id,
            distance_km: source.distance,
        })
        .ok_or_else(|| {
            ToolError::out_of_coverage(
                format!(
                    "no observation station within {MAX_STATION_DISTANCE_KM} km of ({}, {})",
                    location.lat, location.lon
                ),
                *location,
            )
        })
}

fn normalise(wire: ObservationsResponse) -> Vec<ObservationPoint> {
    wire.data
        .into_iter()
        .map(|set| {
            let mut point = ObservationPoint {
                time: set.reference_time,
                temperature: None,
                wind_speed: None,
                wind_direction: None,
                humidity: None,
                precipitation: None,
            };
            for observation in set.observations {
                match observation.element_id.as_str() {
                    "air_temperature" => point.temperature = Some(observation.value),
                    "wind_speed" => point.wind_speed = Some(observation.value),
                    "wind_from_direction" => point.wind_direction = Some(observation.value),
                    "relative_humidity" => point.humidity = Some(observation.value),
                    element if element.starts_with("sum(precipitation_amount") => {
                        point.precipitation = Some(observation.value)
                    },
                    _ => {},
                }
            }
            point
        })
        .sorted_by_key(|point| point.time)
        .collect()
}

fn summarise(language: Lang, station: &Station, points: &[ObservationPoint]) -> String {
    let Some(latest) = points.last() else {
        return match language {
            Lang::En => format!("No recent observations from station {}.", station.id),
            Lang::Nb => format!("Ingen ferske observasjoner fra stasjon {}.", station.id),
        };
    };
    let temperature = latest
        .temperature
        .map(|value| format!("{value:.1}°C"))
        .unwrap_or_else(|| "n/a".to_string());
    match language {
        Lang::En => format!(
            "{} observations from {} ({}); latest at {}: {}.",
            points.len(),
            station.name,
            station.id,
            latest.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            temperature
        ),
        Lang::Nb => format!(
            "{} observasjoner fra {} ({}); siste kl. {}: {}.",
            points.len(),
            station.name,
            station.id,
            latest.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            temperature
        ),
    }
}
