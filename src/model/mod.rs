pub mod coverage;

use chrono::{DateTime, Utc};
use rmcp::schemars;
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};
use validator::Validate;

/// WGS84 point. Immutable for the duration of a call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema, Validate)]
pub struct Coordinate {
    #[schemars(description = "Latitude in decimal degrees, -90..90")]
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[schemars(description = "Longitude in decimal degrees, -180..180")]
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,

    #[schemars(description = "Altitude in metres above sea level, -500..9000")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = -500.0, max = 9000.0))]
    pub altitude: Option<f64>,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, altitude: None }
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
    schemars::JsonSchema,
)]
pub enum WindowPreset {
    #[serde(rename = "next_24h")]
    #[strum(serialize = "next_24h")]
    Next24h,

    #[serde(rename = "next_48h")]
    #[strum(serialize = "next_48h")]
    Next48h,

    #[serde(rename = "next_7d")]
    #[strum(serialize = "next_7d")]
    Next7d,

    #[serde(rename = "full_available")]
    #[strum(serialize = "full_available")]
    FullAvailable,
}

/// Requested time window: either a preset or an absolute `[from, to]` pair
/// of RFC-3339 UTC timestamps. Resolved at tool entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[schemars(description = "Absolute start, RFC-3339 UTC")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[schemars(description = "Absolute end, RFC-3339 UTC")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<WindowPreset>,
}

impl TimeWindow {
    pub fn preset(preset: WindowPreset) -> Self {
        Self { from: None, to: None, preset: Some(preset) }
    }

    pub fn absolute(from: &DateTime<Utc>, to: &DateTime<Utc>) -> Self {
        Self {
            from: Some(from.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            to: Some(to.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            preset: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
    Expired,
    Bypass,
}

/// Freshness data parsed from the reverse proxy's response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub cached: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CacheStatus>,
}

/// Provider attribution attached to every successful data-tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMeta {
    pub provider: String,
    pub product: String,
    pub license_uri: String,
    pub credit_line: String,
    pub cached: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum Resolution {
    #[default]
    #[serde(rename = "hourly")]
    Hourly,

    #[serde(rename = "3-hourly")]
    ThreeHourly,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
    schemars::JsonSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Nb,
}

/// One normalised hour of weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherPoint {
    pub time: DateTime<Utc>,

    /// Air temperature in °C.
    pub temperature: f64,

    /// Wind speed in m/s.
    pub wind_speed: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,

    /// Precipitation rate in mm/h.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f64>,

    pub symbol_code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_p10: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_p90: Option<f64>,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PrecipClass {
    None,
    Light,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowcastPoint {
    #[serde(flatten)]
    pub point: WeatherPoint,

    pub precipitation_class: PrecipClass,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

/// One normalised hour of sea state with a vessel-specific risk level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarinePoint {
    pub time: DateTime<Utc>,

    /// Significant wave height in metres.
    pub wave_height: f64,

    pub wave_direction: f64,

    /// Sea water temperature in °C.
    pub water_temperature: f64,

    /// Current speed in m/s.
    pub current_speed: f64,

    pub current_direction: f64,

    pub risk: RiskLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualityPoint {
    pub time: DateTime<Utc>,

    pub category: AqiCategory,

    /// Numeric sub-index the category was derived from.
    pub aqi: f64,

    pub dominant_pollutant: String,

    /// Per-pollutant concentration in µg/m³.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentrations: Option<BTreeMap<String, f64>>,

    pub advice: String,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComfortScore {
    Good,
    Ok,
    Poor,
}

/// One hour scored against an activity profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComfortSlot {
    pub time: DateTime<Utc>,
    pub score: ComfortScore,
    pub temperature_ok: bool,
    pub wind_ok: bool,
    pub precipitation_ok: bool,
    pub reason: String,
    pub temperature: f64,
    pub wind_speed: f64,
    pub precipitation_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComfortWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub hours: u32,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TripVerdict {
    Safe,
    Caution,
    Dangerous,
    Extreme,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
    schemars::JsonSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VesselType {
    Kayak,
    SmallSailboat,
    Motorboat,
    Ship,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
    schemars::JsonSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Running,
    Cycling,
    Hiking,
    KidsPlayground,
    Commuting,
    Custom,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
    schemars::JsonSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlaceClass {
    City,
    Town,
    Village,
    District,
    Settlement,
    Farm,
}

/// One gazetteer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRecord {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alt_names: Vec<String>,

    pub lat: f64,
    pub lon: f64,
    pub place_class: PlaceClass,

    /// Four-character municipality code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_name: Option<String>,

    /// Relative prominence, 0..10.
    pub importance: f64,

    #[serde(default)]
    pub county_seat: bool,

    #[serde(default)]
    pub municipality_seat: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    ExactPrimary,
    ExactAlt,
    Prefix,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceMatch {
    #[serde(flatten)]
    pub place: PlaceRecord,

    /// 0..1, non-increasing across a result list.
    pub confidence: f64,

    pub match_type: MatchType,
}

/// Observation site returned by the stations API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationPoint {
    pub time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,

    /// Accumulated precipitation over the preceding hour, mm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,
}
