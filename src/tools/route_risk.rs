use super::wrapper::{self, ToolPayload, ToolReply};
use super::{marine, ToolDeps};
use crate::errors::ToolError;
use crate::model::coverage;
use crate::model::{
    Coordinate, Lang, MarinePoint, ResolvedWindow, RiskLevel, SourceMeta, TimeWindow, TripVerdict,
    VesselType,
};
use chrono::{DateTime, Utc};
use rmcp::schemars;

pub const TOOL_NAME: &str = "weather.assess_route_risk";

/// Upper bound on marine sub-calls per trip.
const MAX_WAYPOINTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteRiskRequest {
    #[schemars(description = "Polyline of at least two waypoints")]
    pub route: Vec<Coordinate>,

    pub vessel_type: VesselType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,

    #[serde(default)]
    pub language: Lang,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointAssessment {
    /// Index into the submitted route.
    pub index: usize,
    pub location: Coordinate,
    pub max_risk: RiskLevel,
    pub high_risk_hours: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub waypoint_index: usize,
    pub location: Coordinate,
    pub time: DateTime<Utc>,
    pub wave_height: f64,
    pub current_speed: f64,
    pub risk: RiskLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRiskPayload {
    pub vessel_type: VesselType,
    pub time_window: ResolvedWindow,
    pub waypoints: Vec<WaypointAssessment>,
    pub hotspots: Vec<Hotspot>,
    pub verdict: TripVerdict,
    pub recommendation: String,
    pub source: SourceMeta,
}

impl ToolPayload for RouteRiskPayload {
    fn source(&self) -> Option<&SourceMeta> {
        Some(&self.source)
    }
}

/// Samples the route at bounded waypoints, assesses each through the marine
/// tool sequentially, and rolls the per-waypoint risk into a trip verdict.
/// The first sub-call failure is the composite's failure, untouched.
pub async fn run(
    deps: &ToolDeps, request: RouteRiskRequest,
) -> Result<ToolReply<RouteRiskPayload>, ToolError> {
    if request.route.len() < 2 {
        return Err(ToolError::invalid_input("a route needs at least two waypoints"));
    }

    // Resolved once here; every waypoint is assessed over the same interval.
    let window = coverage::resolve_time_window(request.time_window.as_ref(), Utc::now())?;
    let sub_window = TimeWindow::absolute(&window.from, &window.to);

    let mut waypoints = Vec::new();
    let mut hotspots = Vec::new();
    let mut source: Option<SourceMeta> = None;
    let mut resolved_window = window;

    for index in sample_indices(request.route.len()) {
        let marine_request = marine::MarineRequest {
            location: request.route[index],
            vessel_type: request.vessel_type,
            time_window: Some(sub_window.clone()),
            language: request.language,
        };
        let inner_input = serde_json::to_value(&marine_request).unwrap_or_default();
        let reply = wrapper::run_tool(&deps.metrics, marine::TOOL_NAME, inner_input, || {
            marine::run(&deps.proxy, marine_request.clone())
        })
        .await?;
        let payload = reply.payload;

        let assessment = assess_waypoint(index, payload.location, &payload.points);
        hotspots.extend(payload.points.iter().filter(|point| point.risk >= RiskLevel::High).map(
            |point| Hotspot {
                waypoint_index: index,
                location: payload.location,
                time: point.time,
                wave_height: point.wave_height,
                current_speed: point.current_speed,
                risk: point.risk,
                note: point.note.clone(),
            },
        ));
        if source.is_none() {
            source = Some(payload.source);
            resolved_window = payload.time_window;
        }
        waypoints.push(assessment);
    }

    sort_hotspots(&mut hotspots);
    let verdict = roll_up(&waypoints);
    let recommendation = recommendation_for(verdict, request.vessel_type, request.language);
    let summary = summarise(request.language, &request, verdict, &waypoints, &hotspots, &recommendation);

    Ok(ToolReply {
        payload: RouteRiskPayload {
            vessel_type: request.vessel_type,
            time_window: resolved_window,
            waypoints,
            hotspots,
            verdict,
            recommendation,
            source: source.unwrap_or_else(|| {
                // Unreachable: the route has at least two waypoints and every
                // assessment either succeeded or returned above.
                crate::tools::respond::source_metadata(marine::PRODUCT, &Default::default())
            }),
        },
        summary,
    })
}

/// First and last always, interior indices by even stride, at most five.
pub fn sample_indices(route_len: usize) -> Vec<usize> {
    if route_len <= MAX_WAYPOINTS {
        return (0..route_len).collect();
    }
    let mut indices: Vec<usize> = (0..MAX_WAYPOINTS)
        .map(|step| {
            ((step * (route_len - 1)) as f64 / (MAX_WAYPOINTS - 1) as f64).round() as usize
        })
        .collect();
    indices.dedup();
    indices
}

fn assess_waypoint(
    index: usize, location: Coordinate, points: &[MarinePoint],
) -> WaypointAssessment {
    let max_risk =
        points.iter().map(|point| point.risk).max().unwrap_or(RiskLevel::Low);
    let high_risk_hours =
        points.iter().filter(|point| point.risk >= RiskLevel::High).count();
    WaypointAssessment { index, location, max_risk, high_risk_hours }
}

/// Stable ordering: risk descending, then time, then waypoint index.
fn sort_hotspots(hotspots: &mut [Hotspot]) {
    hotspots.sort_by(|a, b| {
        b.risk
            .cmp(&a.risk)
            .then(a.time.cmp(&b.time))
            .then(a.waypoint_index.cmp(&b.waypoint_index))
    });
}

pub fn roll_up(waypoints: &[WaypointAssessment]) -> TripVerdict {
    if waypoints.iter().any(|w| w.max_risk == RiskLevel::Extreme) {
        return TripVerdict::Extreme;
    }
    if waypoints.iter().filter(|w| w.max_risk >= RiskLevel::High).count() >= 2 {
        return TripVerdict::Dangerous;
    }
    if waypoints.iter().any(|w| w.max_risk == RiskLevel::High) {
        return TripVerdict::Caution;
    }
    if waypoints.iter().any(|w| w.max_risk == RiskLevel::Moderate) {
        return TripVerdict::Caution;
    }
    TripVerdict::Safe
}

fn recommendation_for(verdict: TripVerdict, vessel: VesselType, language: Lang) -> String {
    match (language, verdict) {
        (Lang::En, TripVerdict::Safe) => {
            format!("Conditions look manageable for a {vessel} along the sampled route.")
        },
        (Lang::En, TripVerdict::Caution) => format!(
            "Proceed with caution in a {vessel}: parts of the route reach elevated risk."
        ),
        (Lang::En, TripVerdict::Dangerous) => format!(
            "Not advisable for a {vessel}: several waypoints reach high risk. Consider postponing."
        ),
        (Lang::En, TripVerdict::Extreme) => format!(
            "Do not go out in a {vessel}: conditions are extreme along the route."
        ),
        (Lang::Nb, TripVerdict::Safe) => {
            format!("Forholdene ser håndterbare ut for {vessel} langs ruten.")
        },
        (Lang::Nb, TripVerdict::Caution) => format!(
            "Utvis forsiktighet med {vessel}: deler av ruten har forhøyet risiko."
        ),
        (Lang::Nb, TripVerdict::Dangerous) => format!(
            "Frarådes for {vessel}: flere punkter på ruten når høy risiko. Vurder å utsette."
        ),
        (Lang::Nb, TripVerdict::Extreme) => {
            format!("Ikke dra ut med {vessel}: forholdene langs ruten er ekstreme.")
        },
    }
}

fn summarise(
    language: Lang, request: &RouteRiskRequest, verdict: TripVerdict,
    waypoints: &[WaypointAssessment], hotspots: &[Hotspot], recommendation: &str,
) -> String {
    match language {
        Lang::En => format!(
            "Route verdict for a {} over {} waypoints: {}. {} high-risk hour(s). {}",
            request.vessel_type,
            waypoints.len(),
            verdict,
            hotspots.len(),
            recommendation
        ),
        Lang::Nb => format!(
            "Rutevurdering for {} over {} punkter: {}. {} timer med høy risiko. {}",
            request.vessel_type,
            waypoints.len(),
            verdict,
            hotspots.len(),
            recommendation
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assessment(index: usize, max_risk: RiskLevel, high_risk_hours: usize) -> WaypointAssessment {
        WaypointAssessment {
            index,
            location: Coordinate::new(59.9, 10.7),
            max_risk,
            high_risk_hours,
        }
    }

    #[test]
    fn test_sampling_keeps_ends_and_bounds_count() {
        assert_eq!(sample_indices(2), vec![0, 1]);
        assert_eq!(sample_indices(5), vec![0, 1, 2, 3, 4]);

        let sampled = sample_indices(12);
        assert_eq!(sampled.len(), 5);
        assert_eq!(sampled[0], 0);
        assert_eq!(*sampled.last().unwrap(), 11);
        assert!(sampled.windows(2).all(|pair| pair[0] < pair[1]));

        let large = sample_indices(100);
        assert_eq!(large, vec![0, 25, 50, 74, 99]);
    }

    #[test]
    fn test_roll_up_branches() {
        assert_eq!(roll_up(&[assessment(0, RiskLevel::Low, 0)]), TripVerdict::Safe);
        assert_eq!(
            roll_up(&[assessment(0, RiskLevel::Low, 0), assessment(1, RiskLevel::Moderate, 0)]),
            TripVerdict::Caution
        );
        assert_eq!(
            roll_up(&[assessment(0, RiskLevel::Low, 0), assessment(1, RiskLevel::High, 1)]),
            TripVerdict::Caution
        );
        assert_eq!(
            roll_up(&[assessment(0, RiskLevel::High, 2), assessment(1, RiskLevel::High, 1)]),
            TripVerdict::Dangerous
        );
        assert_eq!(
            roll_up(&[assessment(0, RiskLevel::Extreme, 1)]),
            TripVerdict::Extreme
        );
    }

    #[test]
    fn test_hotspot_ordering_is_stable() {
        let base = Hotspot {
            waypoint_index: 0,
            location: Coordinate::new(59.9, 10.7),
            time: Utc::now(),
            wave_height: 1.0,
            current_speed: 0.2,
            risk: RiskLevel::High,
            note: None,
        };
        let later = Utc::now() + chrono::Duration::hours(3);
        let mut hotspots = vec![
            Hotspot { time: later, waypoint_index: 2, ..base.clone() },
            Hotspot { risk: RiskLevel::Extreme, time: later, ..base.clone() },
            Hotspot { waypoint_index: 1, time: later, ..base.clone() },
            base.clone(),
        ];
        sort_hotspots(&mut hotspots);
        assert_eq!(hotspots[0].risk, RiskLevel::Extreme);
        assert_eq!(hotspots[1].time, base.time);
        assert_eq!(hotspots[2].waypoint_index, 1);
        assert_eq!(hotspots[3].waypoint_index, 2);
    }
}
