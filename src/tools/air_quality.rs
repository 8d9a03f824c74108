use super::respond;
use super::wrapper::{ToolPayload, ToolReply};
use crate::errors::ToolError;
use crate::model::coverage::{self, CoverageArea};
use crate::model::{
    AirQualityPoint, AqiCategory, Coordinate, Lang, ResolvedWindow, SourceMeta, TimeWindow,
};
use crate::services::met::{AirQualityResponse, AirQualityStep};
use crate::services::upstream::{FetchOptions, UpstreamClient};
use chrono::Utc;
use rmcp::schemars;
use std::collections::BTreeMap;

pub const TOOL_NAME: &str = "weather.get_air_quality";
pub const PRODUCT: &str = "Air quality forecast";

/// Sub-index keys published per pollutant.
const POLLUTANT_INDICES: &[(&str, &str)] = &[
    ("AQI_pm10", "pm10"),
    ("AQI_pm25", "pm25"),
    ("AQI_no2", "no2"),
    ("AQI_o3", "o3"),
];

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AirQualityRequest {
    pub location: Coordinate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,

    #[serde(default)]
    pub language: Lang,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualityPayload {
    pub location: Coordinate,
    pub time_window: ResolvedWindow,
    pub points: Vec<AirQualityPoint>,
    pub source: SourceMeta,
}

impl ToolPayload for AirQualityPayload {
    fn source(&self) -> Option<&SourceMeta> {
        Some(&self.source)
    }
}

pub async fn run(
    proxy: &UpstreamClient, request: AirQualityRequest,
) -> Result<ToolReply<AirQualityPayload>, ToolError> {
    coverage::validate_coordinates(&request.location)?;
    coverage::require_coverage(CoverageArea::Domestic, &request.location)?;
    let window = coverage::resolve_time_window(request.time_window.as_ref(), Utc::now())?;

    let path = format!(
        "weatherapi/airqualityforecast/0.1/?lat={:.4}&lon={:.4}",
        request.location.lat, request.location.lon
    );
    let response = proxy.fetch(&path, FetchOptions::default()).await?;
    let wire: AirQualityResponse = serde_json::from_value(response.data).map_err(|err| {
        ToolError::upstream_unavailable(format!("unexpected {PRODUCT} payload: {err}"))
    })?;

    let points = normalise(wire.data.time, &window, request.language);
    let source = respond::source_metadata(PRODUCT, &response.cache);
    let summary = summarise(request.language, &request.location, &points);

    Ok(ToolReply {
        payload: AirQualityPayload {
            location: request.location,
            time_window: window,
            points,
            source,
        },
        summary,
    })
}

/// Category bounds on the numeric sub-index.
pub fn classify_aqi(value: f64) -> AqiCategory {
    if value <= 1.0 {
        AqiCategory::Good
    } else if value <= 2.0 {
        AqiCategory::Fair
    } else if value <= 3.0 {
        AqiCategory::Moderate
    } else if value <= 4.0 {
        AqiCategory::Poor
    } else {
        AqiCategory::VeryPoor
    }
}

pub fn advice_for(category: AqiCategory, language: Lang) -> String {
    match (language, category) {
        (Lang::En, AqiCategory::Good) => "Air quality is good; no precautions needed.",
        (Lang::En, AqiCategory::Fair) => "Air quality is acceptable for most people.",
        (Lang::En, AqiCategory::Moderate) => {
            "Sensitive groups should consider limiting prolonged outdoor exertion."
        },
        (Lang::En, AqiCategory::Poor) => {
            "Sensitive groups should avoid outdoor exertion; others should limit it."
        },
        (Lang::En, AqiCategory::VeryPoor) => "Everyone should avoid outdoor exertion.",
        (Lang::Nb, AqiCategory::Good) => "Luftkvaliteten er god; ingen forholdsregler nødvendig.",
        (Lang::Nb, AqiCategory::Fair) => "Luftkvaliteten er akseptabel for de fleste.",
        (Lang::Nb, AqiCategory::Moderate) => {
            "Følsomme grupper bør vurdere å begrense lengre utendørsaktivitet."
        },
        (Lang::Nb, AqiCategory::Poor) => {
            "Følsomme grupper bør unngå utendørsaktivitet; andre bør begrense den."
        },
        (Lang::Nb, AqiCategory::VeryPoor) => "Alle bør unngå utendørsaktivitet.",
    }
    .to_string()
}

fn normalise(
    steps: Vec<AirQualityStep>, window: &ResolvedWindow, language: Lang,
) -> Vec<AirQualityPoint> {
    steps
        .into_iter()
        .filter(|step| step.from >= window.from && step.from <= window.to)
        .filter_map(|step| {
            let dominant = POLLUTANT_INDICES
                .iter()
                .filter_map(|(key, pollutant)| {
                    step.variables.get(*key).map(|variable| (*pollutant, variable.value))
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let aqi = step
                .variables
                .get("AQI")
                .map(|variable| variable.value)
                .or(dominant.map(|(_, value)| value))?;
            let (dominant_pollutant, _) = dominant?;

            let concentrations: BTreeMap<String, f64> = POLLUTANT_INDICES
                .iter()
                .filter_map(|(_, pollutant)| {
                    step.variables
                        .get(&format!("{pollutant}_concentration"))
                        .map(|variable| (pollutant.to_string(), variable.value))
                })
                .collect();

            let category = classify_aqi(aqi);
            Some(AirQualityPoint {
                time: step.from,
                category,
                aqi,
                dominant_pollutant: dominant_pollutant.to_string(),
                concentrations: (!concentrations.is_empty()).then_some(concentrations),
                advice: advice_for(category, language),
            })
        })
        .collect()
}

fn summarise(language: Lang, location: &Coordinate, points: &[AirQualityPoint]) -> String {
    let Some(first) = points.first() else {
        return match language {
            Lang::En => "No air quality data available for the requested window.".to_string(),
            Lang::Nb => "Ingen luftkvalitetsdata tilgjengelig for det valgte tidsrommet.".to_string(),
        };
    };
    match language {
        Lang::En => format!(
            "Air quality at {:.2}, {:.2} is {} (index {:.1}, dominated by {}). {}",
            location.lat, location.lon, first.category, first.aqi, first.dominant_pollutant,
            first.advice
        ),
        Lang::Nb => format!(
            "Luftkvaliteten ved {:.2}, {:.2} er {} (indeks {:.1}, dominert av {}). {}",
            location.lat, location.lon, first.category, first.aqi, first.dominant_pollutant,
            first.advice
        ),
    }
}
