//! Wire models for the stations API (sources and observations).

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesResponse {
    #[serde(default)]
    pub data: Vec<Source>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Distance from the query point in km, present on nearest-queries.
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservationsResponse {
    #[serde(default)]
    pub data: Vec<ObservationSet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationSet {
    pub source_id: String,
    pub reference_time: DateTime<Utc>,

    #[serde(default)]
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub element_id: String,
    pub value: f64,

    #[serde(default)]
    #[allow(dead_code)]
    pub unit: Option<String>,
}
