use super::respond;
use super::wrapper::{ToolPayload, ToolReply};
use crate::errors::ToolError;
use crate::model::coverage::{self, CoverageArea};
use crate::model::{
    Coordinate, Lang, MarinePoint, Resolution, ResolvedWindow, RiskLevel, SourceMeta, TimeWindow,
    VesselType,
};
use crate::services::met::{self, PointResponse, TimeStep};
use crate::services::upstream::{FetchOptions, UpstreamClient};
use chrono::{Duration, Utc};
use rmcp::schemars;

pub const TOOL_NAME: &str = "weather.get_marine";
pub const PRODUCT: &str = "Oceanforecast 2.0";

const WINDOW_CAP_HOURS: i64 = 48;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskRow {
    pub wave_m: f64,
    pub current_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VesselThresholds {
    pub low: RiskRow,
    pub moderate: RiskRow,
    pub high: RiskRow,
}

const fn row(wave_m: f64, current_ms: f64) -> RiskRow {
    RiskRow { wave_m, current_ms }
}

pub const fn thresholds_for(vessel: VesselType) -> VesselThresholds {
    match vessel {
        VesselType::Kayak => VesselThresholds {
            low: row(0.3, 0.5),
            moderate: row(0.5, 1.0),
            high: row(0.8, 1.5),
        },
        VesselType::SmallSailboat => VesselThresholds {
            low: row(0.5, 1.0),
            moderate: row(1.0, 2.0),
            high: row(1.5, 3.0),
        },
        VesselType::Motorboat => VesselThresholds {
            low: row(0.8, 1.5),
            moderate: row(1.5, 2.5),
            high: row(2.0, 4.0),
        },
        VesselType::Ship => VesselThresholds {
            low: row(2.0, 3.0),
            moderate: row(3.5, 5.0),
            high: row(5.0, 7.0),
        },
    }
}

/// A point sits at the highest tier whose row either parameter reaches
/// (inclusive); it is `extreme` only when both wave and current reach the
/// high row.
pub fn classify_risk(wave_m: f64, current_ms: f64, thresholds: &VesselThresholds) -> RiskLevel {
    let crosses = |bound: &RiskRow| wave_m >= bound.wave_m || current_ms >= bound.current_ms;
    if wave_m >= thresholds.high.wave_m && current_ms >= thresholds.high.current_ms {
        RiskLevel::Extreme
    } else if crosses(&thresholds.high) {
        RiskLevel::High
    } else if crosses(&thresholds.moderate) {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarineRequest {
    pub location: Coordinate,

    #[schemars(description = "Vessel the risk classification applies to")]
    pub vessel_type: VesselType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,

    #[serde(default)]
    pub language: Lang,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarinePayload {
    pub location: Coordinate,
    pub vessel_type: VesselType,
    pub time_window: ResolvedWindow,
    pub points: Vec<MarinePoint>,
    pub source: SourceMeta,
}

impl ToolPayload for MarinePayload {
    fn source(&self) -> Option<&SourceMeta> {
        Some(&self.source)
    }
}

pub async fn run(
    proxy: &UpstreamClient, request: MarineRequest,
) -> Result<ToolReply<MarinePayload>, ToolError> {
    coverage::validate_coordinates(&request.location)?;
    coverage::require_coverage(CoverageArea::Coastal, &request.location)?;
    let window = coverage::cap_window(
        coverage::resolve_time_window(request.time_window.as_ref(), Utc::now())?,
        Duration::hours(WINDOW_CAP_HOURS),
    );

    let path = format!(
        "weatherapi/oceanforecast/2.0/complete?lat={:.4}&lon={:.4}",
        request.location.lat, request.location.lon
    );
    let response = proxy.fetch(&path, FetchOptions::default()).await?;
    let wire: PointResponse = serde_json::from_value(response.data).map_err(|err| {
        ToolError::upstream_unavailable(format!("unexpected {PRODUCT} payload: {err}"))
    })?;

    let steps = met::select_steps(wire.properties.timeseries, &window, Resolution::Hourly);
    let points = normalise(steps, request.vessel_type);
    let source = respond::source_metadata(PRODUCT, &response.cache);
    let summary = summarise(request.language, &request.location, request.vessel_type, &points);

    Ok(ToolReply {
        payload: MarinePayload {
            location: request.location,
            vessel_type: request.vessel_type,
            time_window: window,
            points,
            source,
        },
        summary,
    })
}

/// Wave and current default to 0.0 when the provider omits them: the risk
/// classifier needs numbers and calm water is the neutral reading.
fn normalise(steps: Vec<TimeStep>, vessel: VesselType) -> Vec<MarinePoint> {
    let thresholds = thresholds_for(vessel);
    steps
        .into_iter()
        .map(|step| {
            let details = step.data.instant.details;
            let wave_height = details.sea_surface_wave_height.unwrap_or(0.0);
            let current_speed = details.sea_water_speed.unwrap_or(0.0);
            let risk = classify_risk(wave_height, current_speed, &thresholds);
            MarinePoint {
                time: step.time,
                wave_height,
                wave_direction: details.sea_surface_wave_from_direction.unwrap_or(0.0),
                water_temperature: details.sea_water_temperature.unwrap_or(0.0),
                current_speed,
                current_direction: details.sea_water_to_direction.unwrap_or(0.0),
                risk,
                note: note_for(risk, vessel),
            }
        })
        .collect()
}

fn note_for(risk: RiskLevel, vessel: VesselType) -> Option<String> {
    match risk {
        RiskLevel::Low | RiskLevel::Moderate => None,
        RiskLevel::High => Some(format!("waves or current above the safe limit for a {vessel}")),
        RiskLevel::Extreme => {
            Some(format!("waves and current far above the safe limit for a {vessel}"))
        },
    }
}

fn summarise(
    language: Lang, location: &Coordinate, vessel: VesselType, points: &[MarinePoint],
) -> String {
    let Some(worst) = points.iter().max_by_key(|point| point.risk) else {
        return match language {
            Lang::En => "No marine data available for the requested window.".to_string(),
            Lang::Nb => "Ingen sjødata tilgjengelig for det valgte tidsrommet.".to_string(),
        };
    };
    match language {
        Lang::En => format!(
            "Sea state at {:.2}, {:.2} for a {}: peak risk {} (waves up to {:.1} m).",
            location.lat,
            location.lon,
            vessel,
            worst.risk,
            points.iter().map(|point| point.wave_height).fold(0.0, f64::max)
        ),
        Lang::Nb => format!(
            "Sjøtilstand ved {:.2}, {:.2} for {}: høyeste risiko {} (bølger opptil {:.1} m).",
            location.lat,
            location.lon,
            vessel,
            worst.risk,
            points.iter().map(|point| point.wave_height).fold(0.0, f64::max)
        ),
    }
}
