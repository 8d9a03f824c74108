//! Product coverage fences and time-window resolution.

use super::{Coordinate, ResolvedWindow, TimeWindow, WindowPreset};
use crate::errors::ToolError;
use chrono::{DateTime, Duration, Utc};
use strum_macros::Display;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fence {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Fence {
    pub const fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self { lat_min, lat_max, lon_min, lon_max }
    }

    /// Inclusive membership on all four bounds.
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.lat_min..=self.lat_max).contains(&coordinate.lat)
            && (self.lon_min..=self.lon_max).contains(&coordinate.lon)
    }
}

impl std::fmt::Display for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lat {}..{}, lon {}..{}",
            self.lat_min, self.lat_max, self.lon_min, self.lon_max
        )
    }
}

pub const NORDIC: Fence = Fence::new(55.0, 72.0, 4.0, 32.0);
pub const DOMESTIC: Fence = Fence::new(58.0, 71.0, 4.0, 31.0);
pub const COASTAL_EAST: Fence = Fence::new(59.0, 60.5, 10.0, 11.5);
pub const COASTAL_WEST: Fence = Fence::new(58.0, 63.0, 4.5, 8.0);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum CoverageArea {
    Nordic,
    Domestic,
    Coastal,
}

impl CoverageArea {
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        match self {
            Self::Nordic => NORDIC.contains(coordinate),
            Self::Domestic => DOMESTIC.contains(coordinate),
            Self::Coastal => {
                COASTAL_EAST.contains(coordinate) || COASTAL_WEST.contains(coordinate)
            },
        }
    }

    pub fn bounds(&self) -> String {
        match self {
            Self::Nordic => NORDIC.to_string(),
            Self::Domestic => DOMESTIC.to_string(),
            Self::Coastal => format!("{COASTAL_EAST} or {COASTAL_WEST}"),
        }
    }
}

pub fn validate_coordinates(coordinate: &Coordinate) -> Result<(), ToolError> {
    coordinate.validate().map_err(|_| {
        ToolError::invalid_input(format!(
            "coordinates out of range: lat {} must be within -90..90, lon {} within -180..180, \
             altitude within -500..9000",
            coordinate.lat, coordinate.lon
        ))
    })
}

/// Advisory product fence; produces OUT_OF_COVERAGE naming the bounds and
/// carrying the offending coordinate.
pub fn require_coverage(area: CoverageArea, coordinate: &Coordinate) -> Result<(), ToolError> {
    if area.contains(coordinate) {
        return Ok(());
    }
    Err(ToolError::out_of_coverage(
        format!(
            "location ({}, {}) is outside {} coverage ({})",
            coordinate.lat,
            coordinate.lon,
            area,
            area.bounds()
        ),
        *coordinate,
    ))
}

const DEFAULT_WINDOW_HOURS: i64 = 48;
const FULL_AVAILABLE_HOURS: i64 = 240;

/// Resolves a requested window into an absolute UTC interval.
///
/// No input defaults to `[now, now+48h]`. An explicit `from`/`to` pair must
/// be RFC-3339 UTC with `from < to`; a preset takes precedence when both are
/// given.
pub fn resolve_time_window(
    window: Option<&TimeWindow>, now: DateTime<Utc>,
) -> Result<ResolvedWindow, ToolError> {
    let Some(window) = window else {
        return Ok(ResolvedWindow { from: now, to: now + Duration::hours(DEFAULT_WINDOW_HOURS) });
    };

    if let Some(preset) = window.preset {
        let hours = match preset {
            WindowPreset::Next24h => 24,
            WindowPreset::Next48h => 48,
            WindowPreset::Next7d => 24 * 7,
            WindowPreset::FullAvailable => FULL_AVAILABLE_HOURS,
        };
        return Ok(ResolvedWindow { from: now, to: now + Duration::hours(hours) });
    }

    match (&window.from, &window.to) {
        (None, None) => {
            Ok(ResolvedWindow { from: now, to: now + Duration::hours(DEFAULT_WINDOW_HOURS) })
        },
        (Some(from), Some(to)) => {
            let from = parse_utc_timestamp(from)?;
            let to = parse_utc_timestamp(to)?;
            if from >= to {
                return Err(ToolError::invalid_input(format!(
                    "time window start {from} must precede end {to}"
                )));
            }
            Ok(ResolvedWindow { from, to })
        },
        _ => Err(ToolError::invalid_input(
            "time window requires both `from` and `to` when no preset is given",
        )),
    }
}

/// Product windows are bounded: the end is pulled in so the duration never
/// exceeds `cap`.
pub fn cap_window(window: ResolvedWindow, cap: Duration) -> ResolvedWindow {
    let capped_to = window.from + cap;
    ResolvedWindow { from: window.from, to: window.to.min(capped_to) }
}

fn parse_utc_timestamp(value: &str) -> Result<DateTime<Utc>, ToolError> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|err| {
            ToolError::invalid_input(format!("`{value}` is not an RFC-3339 timestamp: {err}"))
        })
        .and_then(|parsed| {
            if parsed.offset().local_minus_utc() != 0 {
                return Err(ToolError::invalid_input(format!(
                    "`{value}` must be expressed in UTC"
                )));
            }
            Ok(parsed.with_timezone(&Utc))
        })
}
