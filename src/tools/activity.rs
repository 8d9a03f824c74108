use super::wrapper::{self, ToolPayload, ToolReply};
use super::{forecast, ToolDeps};
use crate::errors::ToolError;
use crate::model::{
    ActivityType, ComfortScore, ComfortSlot, ComfortWindow, Coordinate, Lang, Resolution,
    ResolvedWindow, SourceMeta, TimeWindow, WeatherPoint,
};
use rmcp::schemars;

pub const TOOL_NAME: &str = "weather.assess_activity_windows";

const HEAVY_RAIN_RATE: f64 = 2.5;

/// Effective comfort thresholds for one assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityProfile {
    pub min_temp: f64,
    pub max_temp: f64,
    pub max_wind: f64,
    pub avoid_rain: bool,
    pub avoid_heavy_rain: bool,
}

pub const fn profile_for(activity: ActivityType) -> ActivityProfile {
    match activity {
        ActivityType::Running => ActivityProfile {
            min_temp: 5.0,
            max_temp: 20.0,
            max_wind: 10.0,
            avoid_rain: false,
            avoid_heavy_rain: true,
        },
        ActivityType::Cycling => ActivityProfile {
            min_temp: 8.0,
            max_temp: 25.0,
            max_wind: 12.0,
            avoid_rain: false,
            avoid_heavy_rain: true,
        },
        ActivityType::Hiking => ActivityProfile {
            min_temp: 5.0,
            max_temp: 25.0,
            max_wind: 15.0,
            avoid_rain: false,
            avoid_heavy_rain: false,
        },
        ActivityType::KidsPlayground => ActivityProfile {
            min_temp: 10.0,
            max_temp: 28.0,
            max_wind: 8.0,
            avoid_rain: false,
            avoid_heavy_rain: true,
        },
        ActivityType::Commuting => ActivityProfile {
            min_temp: -10.0,
            max_temp: 35.0,
            max_wind: 20.0,
            avoid_rain: false,
            avoid_heavy_rain: false,
        },
        // Permissive starting point; preferences shape it.
        ActivityType::Custom => ActivityProfile {
            min_temp: -50.0,
            max_temp: 50.0,
            max_wind: 30.0,
            avoid_rain: false,
            avoid_heavy_rain: false,
        },
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_temp: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_temp: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wind: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avoid_rain: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avoid_heavy_rain: Option<bool>,
}

impl ActivityProfile {
    /// Field-wise override.
    pub fn with_preferences(mut self, preferences: &ActivityPreferences) -> Self {
        if let Some(min_temp) = preferences.min_temp {
            self.min_temp = min_temp;
        }
        if let Some(max_temp) = preferences.max_temp {
            self.max_temp = max_temp;
        }
        if let Some(max_wind) = preferences.max_wind {
            self.max_wind = max_wind;
        }
        if let Some(avoid_rain) = preferences.avoid_rain {
            self.avoid_rain = avoid_rain;
        }
        if let Some(avoid_heavy_rain) = preferences.avoid_heavy_rain {
            self.avoid_heavy_rain = avoid_heavy_rain;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    pub location: Coordinate,

    #[schemars(description = "Activity whose comfort profile applies")]
    pub activity_type: ActivityType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<ActivityPreferences>,

    #[serde(default)]
    pub language: Lang,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPayload {
    pub location: Coordinate,
    pub activity_type: ActivityType,
    pub time_window: ResolvedWindow,
    pub thresholds: ActivityProfile,
    pub slots: Vec<ComfortSlot>,
    pub best_windows: Vec<ComfortWindow>,
    pub source: SourceMeta,
}

impl ToolPayload for ActivityPayload {
    fn source(&self) -> Option<&SourceMeta> {
        Some(&self.source)
    }
}

/// Sweeps an hourly forecast against the activity profile. The forecast is
/// fetched through the regular tool wrapper so the inner call is
/// instrumented like any other.
pub async fn run(
    deps: &ToolDeps, request: ActivityRequest,
) -> Result<ToolReply<ActivityPayload>, ToolError> {
    let profile = request
        .preferences
        .as_ref()
        .map(|preferences| profile_for(request.activity_type).with_preferences(preferences))
        .unwrap_or_else(|| profile_for(request.activity_type));

    let forecast_request = forecast::ForecastRequest {
        location: request.location,
        time_window: request.time_window.clone(),
        resolution: Resolution::Hourly,
        language: request.language,
    };
    let inner_input = serde_json::to_value(&forecast_request).unwrap_or_default();
    let forecast_reply = wrapper::run_tool(&deps.metrics, forecast::TOOL_NAME, inner_input, || {
        forecast::run(&deps.proxy, forecast_request.clone())
    })
    .await?;
    let forecast_payload = forecast_reply.payload;

    let slots: Vec<ComfortSlot> = forecast_payload
        .points
        .iter()
        .map(|point| score_slot(point, &profile, request.language))
        .collect();
    let best_windows = best_windows(&slots);
    let summary =
        summarise(request.language, request.activity_type, &slots, &best_windows);

    Ok(ToolReply {
        payload: ActivityPayload {
            location: request.location,
            activity_type: request.activity_type,
            time_window: forecast_payload.time_window,
            thresholds: profile,
            slots,
            best_windows,
            source: forecast_payload.source,
        },
        summary,
    })
}

fn score_slot(point: &WeatherPoint, profile: &ActivityProfile, language: Lang) -> ComfortSlot {
    let rate = point.precipitation_rate.unwrap_or(0.0);
    let temperature_ok =
        point.temperature >= profile.min_temp && point.temperature <= profile.max_temp;
    let wind_ok = point.wind_speed <= profile.max_wind;
    let precipitation_ok = (!profile.avoid_rain || rate <= 0.0)
        && (!profile.avoid_heavy_rain || rate < HEAVY_RAIN_RATE);

    let violations = [temperature_ok, wind_ok, precipitation_ok]
        .iter()
        .filter(|ok| !**ok)
        .count();
    let score = match violations {
        0 => ComfortScore::Good,
        1 => ComfortScore::Ok,
        _ => ComfortScore::Poor,
    };

    let mut reasons: Vec<String> = Vec::new();
    if !temperature_ok {
        reasons.push(match language {
            Lang::En => format!(
                "temperature {:.1}°C outside {:.0}..{:.0}°C",
                point.temperature, profile.min_temp, profile.max_temp
            ),
            Lang::Nb => format!(
                "temperatur {:.1}°C utenfor {:.0}..{:.0}°C",
                point.temperature, profile.min_temp, profile.max_temp
            ),
        });
    }
    if !wind_ok {
        reasons.push(match language {
            Lang::En => {
                format!("wind {:.1} m/s above {:.0} m/s", point.wind_speed, profile.max_wind)
            },
            Lang::Nb => {
                format!("vind {:.1} m/s over {:.0} m/s", point.wind_speed, profile.max_wind)
            },
        });
    }
    if !precipitation_ok {
        reasons.push(match language {
            Lang::En => format!("precipitation {rate:.1} mm/h"),
            Lang::Nb => format!("nedbør {rate:.1} mm/t"),
        });
    }
    let reason = if reasons.is_empty() {
        match language {
            Lang::En => "all conditions within limits".to_string(),
            Lang::Nb => "alle forhold innenfor grensene".to_string(),
        }
    } else {
        reasons.join("; ")
    };

    ComfortSlot {
        time: point.time,
        score,
        temperature_ok,
        wind_ok,
        precipitation_ok,
        reason,
        temperature: point.temperature,
        wind_speed: point.wind_speed,
        precipitation_rate: rate,
    }
}

/// Maximal runs of consecutive `good` slots of length at least two.
fn best_windows(slots: &[ComfortSlot]) -> Vec<ComfortWindow> {
    let mut windows = Vec::new();
    let mut run_start: Option<usize> = None;
    for (index, slot) in slots.iter().enumerate() {
        match (slot.score, run_start) {
            (ComfortScore::Good, None) => run_start = Some(index),
            (ComfortScore::Good, Some(_)) => {},
            (_, Some(start)) => {
                if index - start >= 2 {
                    windows.push(window_of(&slots[start..index]));
                }
                run_start = None;
            },
            (_, None) => {},
        }
    }
    if let Some(start) = run_start {
        if slots.len() - start >= 2 {
            windows.push(window_of(&slots[start..]));
        }
    }
    windows
}

fn window_of(run: &[ComfortSlot]) -> ComfortWindow {
    ComfortWindow {
        from: run[0].time,
        to: run[run.len() - 1].time,
        hours: run.len() as u32,
    }
}

fn summarise(
    language: Lang, activity: ActivityType, slots: &[ComfortSlot], windows: &[ComfortWindow],
) -> String {
    if slots.is_empty() {
        return match language {
            Lang::En => "No forecast hours to assess for this activity.".to_string(),
            Lang::Nb => "Ingen varseltimer å vurdere for denne aktiviteten.".to_string(),
        };
    }
    let good = slots.iter().filter(|slot| slot.score == ComfortScore::Good).count();
    let shown = windows
        .iter()
        .take(3)
        .map(|window| {
            format!(
                "{}–{} ({} h)",
                window.from.format("%H:%M"),
                window.to.format("%H:%M"),
                window.hours
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    match language {
        Lang::En => {
            if shown.is_empty() {
                format!("{activity}: {good} of {} hours look good; no window of 2+ good hours.", slots.len())
            } else {
                format!("{activity}: {good} of {} hours look good. Best windows: {shown}.", slots.len())
            }
        },
        Lang::Nb => {
            if shown.is_empty() {
                format!("{activity}: {good} av {} timer ser bra ut; ingen sammenhengende vindu på 2+ timer.", slots.len())
            } else {
                format!("{activity}: {good} av {} timer ser bra ut. Beste vinduer: {shown}.", slots.len())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn point(hour: i64, temperature: f64, wind_speed: f64, rate: f64) -> WeatherPoint {
        WeatherPoint {
            time: Utc::now() + Duration::hours(hour),
            temperature,
            wind_speed,
            wind_direction: None,
            precipitation_rate: Some(rate),
            humidity: None,
            cloud_cover: None,
            symbol_code: "cloudy".to_string(),
            temperature_p10: None,
            temperature_p90: None,
        }
    }

    #[test]
    fn test_wind_exactly_at_limit_is_ok() {
        let profile = profile_for(ActivityType::Running);
        let slot = score_slot(&point(0, 10.0, 10.0, 0.0), &profile, Lang::En);
        assert!(slot.wind_ok);
        assert_eq!(slot.score, ComfortScore::Good);
    }

    #[test]
    fn test_violation_counting() {
        let profile = profile_for(ActivityType::Running);

        let one = score_slot(&point(0, 2.0, 5.0, 0.0), &profile, Lang::En);
        assert_eq!(one.score, ComfortScore::Ok);
        assert!(!one.temperature_ok);
        assert!(one.reason.contains("temperature"));

        let two = score_slot(&point(0, 2.0, 12.0, 0.0), &profile, Lang::En);
        assert_eq!(two.score, ComfortScore::Poor);
    }

    #[test]
    fn test_rain_avoidance_flags() {
        let drizzle = point(0, 12.0, 3.0, 0.4);

        let tolerant = profile_for(ActivityType::Running);
        assert!(score_slot(&drizzle, &tolerant, Lang::En).precipitation_ok);

        let strict = tolerant.with_preferences(&ActivityPreferences {
            avoid_rain: Some(true),
            ..ActivityPreferences::default()
        });
        let slot = score_slot(&drizzle, &strict, Lang::En);
        assert!(!slot.precipitation_ok);

        let downpour = point(0, 12.0, 3.0, 3.0);
        assert!(!score_slot(&downpour, &tolerant, Lang::En).precipitation_ok);
        let hiking = profile_for(ActivityType::Hiking);
        assert!(score_slot(&downpour, &hiking, Lang::En).precipitation_ok);
    }

    #[test]
    fn test_best_windows_need_two_consecutive_good_hours() {
        let profile = profile_for(ActivityType::Running);
        let slots: Vec<ComfortSlot> = [
            point(0, 8.0, 5.0, 0.0),  // good
            point(1, 8.0, 5.0, 0.0),  // good
            point(2, 2.0, 12.0, 0.0), // poor
            point(3, 8.0, 5.0, 0.0),  // good, isolated
            point(4, 2.0, 12.0, 0.0), // poor
        ]
        .iter()
        .map(|p| score_slot(p, &profile, Lang::En))
        .collect();

        let windows = best_windows(&slots);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].hours, 2);
        assert_eq!(windows[0].from, slots[0].time);
        assert_eq!(windows[0].to, slots[1].time);
    }

    #[test]
    fn test_all_good_series_yields_one_full_window() {
        let profile = profile_for(ActivityType::Running);
        let slots: Vec<ComfortSlot> = (0..24)
            .map(|hour| score_slot(&point(hour, 8.0, 5.0, 0.0), &profile, Lang::En))
            .collect();
        assert!(slots.iter().all(|slot| slot.score == ComfortScore::Good));

        let windows = best_windows(&slots);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].hours, 24);
    }

    #[test]
    fn test_custom_profile_is_permissive_until_overridden() {
        let profile = profile_for(ActivityType::Custom).with_preferences(&ActivityPreferences {
            max_wind: Some(6.0),
            ..ActivityPreferences::default()
        });
        assert_eq!(profile.max_wind, 6.0);
        assert_eq!(profile.min_temp, -50.0);
        let slot = score_slot(&point(0, -20.0, 7.0, 0.0), &profile, Lang::En);
        assert!(slot.temperature_ok);
        assert!(!slot.wind_ok);
    }
}
