//! Wire models for the weather products reached through the caching proxy.
//! Field sets are limited to what the tools consume.

use crate::model::{ResolvedWindow, Resolution};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct PointResponse {
    pub properties: PointProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointProperties {
    pub timeseries: Vec<TimeStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeStep {
    pub time: DateTime<Utc>,
    pub data: StepData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepData {
    pub instant: InstantBlock,

    #[serde(default)]
    pub next_1_hours: Option<NextHours>,

    #[serde(default)]
    pub next_6_hours: Option<NextHours>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstantBlock {
    #[serde(default)]
    pub details: InstantDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstantDetails {
    pub air_temperature: Option<f64>,
    pub air_temperature_percentile_10: Option<f64>,
    pub air_temperature_percentile_90: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_from_direction: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub cloud_area_fraction: Option<f64>,

    /// Nowcast carries the rate directly on the instant block.
    pub precipitation_rate: Option<f64>,

    pub sea_surface_wave_height: Option<f64>,
    pub sea_surface_wave_from_direction: Option<f64>,
    pub sea_water_temperature: Option<f64>,
    pub sea_water_speed: Option<f64>,
    pub sea_water_to_direction: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NextHours {
    #[serde(default)]
    pub summary: Option<SymbolSummary>,

    #[serde(default)]
    pub details: Option<PrecipitationDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolSummary {
    pub symbol_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrecipitationDetails {
    pub precipitation_amount: Option<f64>,
    pub precipitation_rate: Option<f64>,
}

impl TimeStep {
    /// Symbol for the step, preferring the one-hour summary.
    pub fn symbol_code(&self) -> String {
        self.data
            .next_1_hours
            .as_ref()
            .and_then(|next| next.summary.as_ref())
            .or_else(|| self.data.next_6_hours.as_ref().and_then(|next| next.summary.as_ref()))
            .map(|summary| summary.symbol_code.clone())
            .unwrap_or_default()
    }

    /// Precipitation over the next hour in mm/h.
    pub fn precipitation_rate(&self) -> Option<f64> {
        self.data
            .instant
            .details
            .precipitation_rate
            .or_else(|| {
                self.data
                    .next_1_hours
                    .as_ref()
                    .and_then(|next| next.details.as_ref())
                    .and_then(|details| details.precipitation_rate.or(details.precipitation_amount))
            })
    }
}

/// Keeps steps inside `[from, to]` and applies resolution decimation
/// (3-hourly keeps every third hourly sample).
pub fn select_steps(
    timeseries: Vec<TimeStep>, window: &ResolvedWindow, resolution: Resolution,
) -> Vec<TimeStep> {
    let stride = match resolution {
        Resolution::Hourly => 1,
        Resolution::ThreeHourly => 3,
    };
    timeseries
        .into_iter()
        .filter(|step| step.time >= window.from && step.time <= window.to)
        .enumerate()
        .filter_map(|(index, step)| (index % stride == 0).then_some(step))
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirQualityResponse {
    pub data: AirQualityData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirQualityData {
    pub time: Vec<AirQualityStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirQualityStep {
    pub from: DateTime<Utc>,

    #[allow(dead_code)]
    pub to: Option<DateTime<Utc>>,

    #[serde(default)]
    pub variables: BTreeMap<String, AirQualityVariable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirQualityVariable {
    pub value: f64,

    #[serde(default)]
    pub units: Option<String>,
}
