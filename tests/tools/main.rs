use chrono::{DateTime, Duration, Utc};
use claims::{assert_err, assert_ok};
use nordvaer::errors::ErrorCode;
use nordvaer::metrics::Outcome;
use nordvaer::model::{
    ComfortScore, Coordinate, Lang, Resolution, RiskLevel, TimeWindow, TripVerdict, VesselType,
    WindowPreset,
};
use nordvaer::services::upstream::{RequestPolicy, UpstreamClient};
use nordvaer::tools::wrapper::run_tool;
use nordvaer::tools::{
    activity, forecast, marine, nowcast, observations, respond, route_risk, ToolDeps,
};
use pretty_assertions::assert_eq;
use std::time::Duration as StdDuration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn proxy_client(base: &str) -> UpstreamClient {
    let policy = RequestPolicy::proxy(
        Url::parse(base).expect("mock server uri"),
        StdDuration::from_secs(5),
        StdDuration::from_secs(2),
    );
    UpstreamClient::new(policy).expect("client")
}

fn stations_client(base: &str) -> UpstreamClient {
    let policy = RequestPolicy::stations(
        Url::parse(base).expect("mock server uri"),
        Some("test-client"),
        StdDuration::from_secs(10),
    );
    UpstreamClient::new(policy).expect("client")
}

/// Hourly series in the Locationforecast/Nowcast/Oceanforecast shape; one
/// entry per hour starting one hour before `start`.
fn hourly_series(
    start: DateTime<Utc>, hours: i64, details: impl Fn(i64) -> serde_json::Value,
) -> serde_json::Value {
    let timeseries: Vec<serde_json::Value> = (-1..hours)
        .map(|hour| {
            serde_json::json!({
                "time": (start + Duration::hours(hour)).to_rfc3339(),
                "data": {
                    "instant": { "details": details(hour) },
                    "next_1_hours": {
                        "summary": { "symbol_code": "cloudy" },
                        "details": { "precipitation_amount": 0.0 }
                    }
                }
            })
        })
        .collect();
    serde_json::json!({ "properties": { "timeseries": timeseries } })
}

fn mild_hour(_hour: i64) -> serde_json::Value {
    serde_json::json!({
        "air_temperature": 8.0,
        "wind_speed": 5.0,
        "wind_from_direction": 200.0,
        "relative_humidity": 70.0,
        "cloud_area_fraction": 80.0,
    })
}

#[tokio::test]
async fn test_forecast_scenario_next_24h_hourly() {
    once_cell::sync::Lazy::force(&nordvaer::setup_tracing::TEST_TRACING);
    let server = MockServer::start().await;
    let start = Utc::now();
    Mock::given(method("GET"))
        .and(path("/weatherapi/locationforecast/2.0/complete"))
        .and(query_param("lat", "59.9100"))
        .and(query_param("lon", "10.7500"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(hourly_series(start, 48, mild_hour))
                .insert_header("x-cache-status", "EXPIRED")
                .insert_header("age", "900"),
        )
        .mount(&server)
        .await;

    let proxy = proxy_client(&server.uri());
    let request = forecast::ForecastRequest {
        location: Coordinate::new(59.91, 10.75),
        time_window: Some(TimeWindow::preset(WindowPreset::Next24h)),
        resolution: Resolution::Hourly,
        language: Lang::En,
    };
    let reply = assert_ok!(forecast::run(&proxy, request).await);

    assert!(reply.payload.points.len() >= 24, "got {} points", reply.payload.points.len());
    for point in &reply.payload.points {
        assert!(point.temperature == 8.0);
        assert!(point.wind_speed == 5.0);
        assert!(!point.symbol_code.is_empty());
    }
    assert_eq!(reply.payload.source.product, "Locationforecast 2.0");
    assert!(!reply.payload.source.license_uri.is_empty());
    assert!(!reply.payload.source.credit_line.is_empty());
    assert_eq!(reply.payload.source.cached, true);
    assert_eq!(reply.payload.source.age_seconds, Some(900));
    assert!(!reply.summary.is_empty());
}

#[tokio::test]
async fn test_nowcast_outside_nordic_fence_is_out_of_coverage() {
    let server = MockServer::start().await;
    let proxy = proxy_client(&server.uri());
    let request = nowcast::NowcastRequest {
        location: Coordinate::new(40.71, -74.01),
        time_window: None,
        language: Lang::En,
    };
    let error = assert_err!(nowcast::run(&proxy, request).await);
    assert_eq!(error.code, ErrorCode::OutOfCoverage);
    assert!(error.message.contains("lat 55..72, lon 4..32"), "{}", error.message);
    assert_eq!(error.details.location.map(|l| (l.lat, l.lon)), Some((40.71, -74.01)));
    // Nothing was fetched for the rejected coordinate.
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);
}

#[tokio::test]
async fn test_nowcast_points_bounded_to_two_hours() {
    let server = MockServer::start().await;
    let start = Utc::now();
    Mock::given(method("GET"))
        .and(path("/weatherapi/nowcast/2.0/complete"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(hourly_series(start, 12, mild_hour)),
        )
        .mount(&server)
        .await;

    let proxy = proxy_client(&server.uri());
    let request = nowcast::NowcastRequest {
        location: Coordinate::new(59.91, 10.75),
        time_window: Some(TimeWindow::preset(WindowPreset::Next24h)),
        language: Lang::En,
    };
    let reply = assert_ok!(nowcast::run(&proxy, request).await);
    let cap = reply.payload.time_window.from + Duration::hours(2);
    assert!(!reply.payload.points.is_empty());
    for point in &reply.payload.points {
        assert!(point.point.time <= cap);
    }
}

#[tokio::test]
async fn test_activity_scenario_all_good_hours() {
    let server = MockServer::start().await;
    let start = Utc::now();
    Mock::given(method("GET"))
        .and(path("/weatherapi/locationforecast/2.0/complete"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(hourly_series(start, 48, mild_hour))
                .insert_header("x-cache-status", "MISS"),
        )
        .mount(&server)
        .await;

    let deps = ToolDeps::for_tests(proxy_client(&server.uri()), stations_client(&server.uri()));
    let request = activity::ActivityRequest {
        location: Coordinate::new(59.91, 10.75),
        activity_type: nordvaer::model::ActivityType::Running,
        time_window: Some(TimeWindow::preset(WindowPreset::Next24h)),
        preferences: None,
        language: Lang::En,
    };
    let reply = assert_ok!(activity::run(&deps, request).await);

    assert!(reply.payload.slots.len() >= 24);
    assert!(reply.payload.slots.iter().all(|slot| slot.score == ComfortScore::Good));
    assert!(reply.payload.slots.iter().all(|slot| {
        slot.temperature_ok && slot.wind_ok && slot.precipitation_ok
    }));
    assert_eq!(reply.payload.best_windows.len(), 1);
    assert_eq!(reply.payload.best_windows[0].hours as usize, reply.payload.slots.len());

    // The inner forecast call went through the wrapper: its metrics moved.
    assert_eq!(deps.metrics.tool_calls(forecast::TOOL_NAME, Outcome::Success), 1);
}

#[tokio::test]
async fn test_route_risk_scenario_one_rough_waypoint() {
    let server = MockServer::start().await;
    let start = Utc::now();

    let calm = |_hour: i64| {
        serde_json::json!({
            "sea_surface_wave_height": 0.1,
            "sea_surface_wave_from_direction": 180.0,
            "sea_water_temperature": 8.0,
            "sea_water_speed": 0.1,
            "sea_water_to_direction": 90.0,
        })
    };
    let rough = |hour: i64| {
        serde_json::json!({
            "sea_surface_wave_height": if hour == 3 { 1.0 } else { 0.1 },
            "sea_surface_wave_from_direction": 180.0,
            "sea_water_temperature": 8.0,
            "sea_water_speed": 0.1,
            "sea_water_to_direction": 90.0,
        })
    };

    Mock::given(method("GET"))
        .and(path("/weatherapi/oceanforecast/2.0/complete"))
        .and(query_param("lat", "59.9000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_series(start, 24, calm)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weatherapi/oceanforecast/2.0/complete"))
        .and(query_param("lat", "59.8500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_series(start, 24, rough)))
        .mount(&server)
        .await;

    let deps = ToolDeps::for_tests(proxy_client(&server.uri()), stations_client(&server.uri()));
    let request = route_risk::RouteRiskRequest {
        route: vec![Coordinate::new(59.9, 10.7), Coordinate::new(59.85, 10.75)],
        vessel_type: VesselType::Kayak,
        time_window: None,
        language: Lang::En,
    };
    let reply = assert_ok!(route_risk::run(&deps, request).await);

    assert_eq!(reply.payload.waypoints.len(), 2);
    assert_eq!(reply.payload.waypoints[0].index, 0);
    assert_eq!(reply.payload.waypoints[1].index, 1);
    assert_eq!(reply.payload.verdict, TripVerdict::Caution);
    assert_eq!(reply.payload.hotspots.len(), 1);
    let hotspot = &reply.payload.hotspots[0];
    assert_eq!((hotspot.location.lat, hotspot.location.lon), (59.85, 10.75));
    assert_eq!(hotspot.waypoint_index, 1);
    assert_eq!(hotspot.risk, RiskLevel::High);
    assert_eq!(hotspot.wave_height, 1.0);

    // Two marine sub-calls went through the wrapper.
    assert_eq!(deps.metrics.tool_calls(marine::TOOL_NAME, Outcome::Success), 2);
}

#[tokio::test]
async fn test_route_risk_passes_first_subcall_error_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weatherapi/oceanforecast/2.0/complete"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&server)
        .await;

    let deps = ToolDeps::for_tests(proxy_client(&server.uri()), stations_client(&server.uri()));
    let request = route_risk::RouteRiskRequest {
        route: vec![Coordinate::new(59.9, 10.7), Coordinate::new(59.85, 10.75)],
        vessel_type: VesselType::Kayak,
        time_window: None,
        language: Lang::En,
    };
    let error = assert_err!(route_risk::run(&deps, request).await);
    assert_eq!(error.code, ErrorCode::RateLimited);
    assert_eq!(error.details.retry_after_seconds, Some(30));
    assert!(error.retryable());
    assert!(respond::error_summary(&error).ends_with("Retry after 30 seconds."));
}

#[tokio::test]
async fn test_observations_coordinate_mode_two_calls() {
    let server = MockServer::start().await;
    let now = Utc::now();
    Mock::given(method("GET"))
        .and(path("/sources/v0.jsonld"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "id": "SN18700", "name": "OSLO - BLINDERN", "distance": 4.2 },
                { "id": "SN99999", "name": "FARAWAY", "distance": 140.0 }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/observations/v0.jsonld"))
        .and(query_param("sources", "SN18700"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "sourceId": "SN18700:0",
                "referenceTime": (now - Duration::hours(1)).to_rfc3339(),
                "observations": [
                    { "elementId": "air_temperature", "value": -3.4 },
                    { "elementId": "wind_speed", "value": 2.2 }
                ]
            }]
        })))
        .mount(&server)
        .await;

    let stations = stations_client(&server.uri());
    let request = observations::ObservationsRequest {
        location: Some(Coordinate::new(59.91, 10.75)),
        station: None,
        time_window: None,
        language: Lang::En,
    };
    let reply = assert_ok!(observations::run(&stations, request).await);
    assert_eq!(reply.payload.station.id, "SN18700");
    assert_eq!(reply.payload.station.distance_km, Some(4.2));
    assert_eq!(reply.payload.points.len(), 1);
    assert_eq!(reply.payload.points[0].temperature, Some(-3.4));
    assert_eq!(reply.payload.source.cached, false);
}

#[tokio::test]
async fn test_observations_without_nearby_station_is_out_of_coverage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sources/v0.jsonld"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{ "id": "SN99999", "name": "FARAWAY", "distance": 140.0 }]
        })))
        .mount(&server)
        .await;

    let stations = stations_client(&server.uri());
    let request = observations::ObservationsRequest {
        location: Some(Coordinate::new(59.91, 10.75)),
        station: None,
        time_window: None,
        language: Lang::En,
    };
    let error = assert_err!(observations::run(&stations, request).await);
    assert_eq!(error.code, ErrorCode::OutOfCoverage);
}

#[tokio::test]
async fn test_wrapper_records_cache_side_effects_end_to_end() {
    let server = MockServer::start().await;
    let start = Utc::now();
    Mock::given(method("GET"))
        .and(path("/weatherapi/locationforecast/2.0/complete"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(hourly_series(start, 30, mild_hour))
                .insert_header("x-cache-status", "HIT"),
        )
        .mount(&server)
        .await;

    let deps = ToolDeps::for_tests(proxy_client(&server.uri()), stations_client(&server.uri()));
    let request = forecast::ForecastRequest {
        location: Coordinate::new(59.91, 10.75),
        time_window: None,
        resolution: Resolution::ThreeHourly,
        language: Lang::Nb,
    };
    let input = serde_json::to_value(&request).expect("input");
    let reply = assert_ok!(
        run_tool(&deps.metrics, forecast::TOOL_NAME, input, || forecast::run(
            &deps.proxy,
            request
        ))
        .await
    );
    assert!(!reply.summary.is_empty());

    assert_eq!(deps.metrics.tool_calls(forecast::TOOL_NAME, Outcome::Success), 1);
    assert!(deps.metrics.cache_hit_ratio() > 0.99);
    let text = deps.metrics.render();
    assert!(text.contains("nordvaer_cache_requests_total{status=\"HIT\"} 1"), "{text}");
}
