//! HTTP access to the upstream services. The caching reverse proxy and the
//! stations API share one client implementation parametrised by a small
//! request policy (base url, timeouts, auth, cache awareness).

use crate::context;
use crate::errors::ToolError;
use crate::model::{CacheMetadata, CacheStatus};
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use std::str::FromStr;
use std::time::{Duration, Instant};
use url::Url;

/// Proxy cache headers; values are matched case-insensitively.
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";
pub const CACHE_AGE_HEADER: &str = "age";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RequestPolicy {
    pub label: &'static str,
    pub base_url: Url,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    auth: Option<HeaderValue>,
    cache_aware: bool,
    health_path: &'static str,
    health_accepts_unauthorized: bool,
}

impl RequestPolicy {
    /// Policy for the caching reverse proxy in front of the weather products.
    pub fn proxy(base_url: Url, timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            label: "proxy",
            base_url,
            timeout,
            connect_timeout,
            auth: None,
            cache_aware: true,
            health_path: "health",
            health_accepts_unauthorized: false,
        }
    }

    /// Policy for the stations API: distinct host, basic auth from a client
    /// id, longer timeout, no shared cache in front.
    pub fn stations(base_url: Url, client_id: Option<&str>, timeout: Duration) -> Self {
        let auth = client_id.map(|id| {
            let token = base64::engine::general_purpose::STANDARD.encode(format!("{id}:"));
            HeaderValue::from_str(&format!("Basic {token}"))
                .unwrap_or_else(|_| HeaderValue::from_static("Basic"))
        });
        Self {
            label: "stations",
            base_url,
            timeout,
            connect_timeout: Duration::from_secs(2),
            auth,
            cache_aware: false,
            health_path: "observations/availableTimeSeries/v0.jsonld",
            health_accepts_unauthorized: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Option<Method>,
    pub headers: Option<HeaderMap>,
    pub body: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
    pub request_id: Option<String>,
}

#[derive(Debug)]
pub struct UpstreamResponse {
    pub data: serde_json::Value,
    pub status: u16,
    pub headers: HeaderMap,
    pub cache: CacheMetadata,
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    policy: RequestPolicy,
}

impl UpstreamClient {
    pub fn new(policy: RequestPolicy) -> Result<Self, ToolError> {
        if policy.base_url.cannot_be_a_base() {
            return Err(ToolError::internal(format!(
                "{} base url cannot be a base: {}",
                policy.label, policy.base_url
            )));
        }
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(5)
            .connect_timeout(policy.connect_timeout)
            .build()
            .map_err(|err| ToolError::internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { http, policy })
    }

    pub fn base_url(&self) -> &Url {
        &self.policy.base_url
    }

    /// Issues one upstream call. Non-2xx statuses and transport failures are
    /// translated into the error taxonomy; on success the proxy cache headers
    /// are parsed when the policy is cache-aware.
    pub async fn fetch(
        &self, path: &str, options: FetchOptions,
    ) -> Result<UpstreamResponse, ToolError> {
        let request_id = options
            .request_id
            .or_else(context::current_request_id)
            .unwrap_or_else(cuid2::create_id);
        let method = options.method.unwrap_or(Method::GET);
        let timeout = options.timeout.unwrap_or(self.policy.timeout);
        let url = self.join(path)?;

        debug!(%request_id, %url, %method, label = self.policy.label, "upstream call");
        let started = Instant::now();

        let mut request = self.http.request(method.clone(), url.clone()).timeout(timeout);
        if let Some(headers) = options.headers {
            request = request.headers(headers);
        }
        if let Some(auth) = &self.policy.auth {
            request = request.header(AUTHORIZATION, auth.clone());
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| classify_transport_error(&err, timeout, &url, &request_id))?;

        let status = response.status();
        let headers = response.headers().clone();
        let cache = if self.policy.cache_aware {
            parse_cache_headers(&headers)
        } else {
            CacheMetadata::default()
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        info!(
            %request_id,
            %url,
            %method,
            status = status.as_u16(),
            latency_ms,
            cached = cache.cached,
            age_seconds = cache.age_seconds,
            label = self.policy.label,
            "upstream call completed"
        );

        if !status.is_success() {
            return Err(ToolError::from_upstream_status(
                status.as_u16(),
                retry_after_seconds(&headers),
                request_id,
            ));
        }

        let data = response.json().await.map_err(|err| {
            ToolError::upstream_unavailable(format!("upstream returned an unreadable body: {err}"))
                .with_request_id(request_id)
        })?;

        Ok(UpstreamResponse { data, status: status.as_u16(), headers, cache })
    }

    /// Short-timeout reachability probe; never fails.
    pub async fn probe_health(&self) -> bool {
        let Ok(url) = self.join(self.policy.health_path) else {
            return false;
        };
        match self.http.get(url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => {
                let status = response.status();
                status == StatusCode::OK
                    || (self.policy.health_accepts_unauthorized
                        && status == StatusCode::UNAUTHORIZED)
            },
            Err(err) => {
                debug!(label = self.policy.label, error = %err, "health probe failed");
                false
            },
        }
    }

    fn join(&self, path: &str) -> Result<Url, ToolError> {
        let base = self.policy.base_url.as_str().trim_end_matches('/');
        let joined = format!("{base}/{}", path.trim_start_matches('/'));
        Url::parse(&joined)
            .map_err(|err| ToolError::internal(format!("invalid upstream url `{joined}`: {err}")))
    }
}

/// `HIT`/`EXPIRED` mean a cached body; `MISS`/`BYPASS` or an unknown value
/// mean a fresh one. The age header must be a non-negative integer.
pub fn parse_cache_headers(headers: &HeaderMap) -> CacheMetadata {
    let status = headers
        .get(CACHE_STATUS_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| CacheStatus::from_str(value.trim()).ok());
    let cached = matches!(status, Some(CacheStatus::Hit) | Some(CacheStatus::Expired));
    let age_seconds = headers
        .get(CACHE_AGE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    CacheMetadata { cached, age_seconds, status }
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn classify_transport_error(
    err: &reqwest::Error, timeout: Duration, url: &Url, request_id: &str,
) -> ToolError {
    let error = if err.is_timeout() {
        ToolError::upstream_unavailable(format!(
            "upstream call to {url} timed out after {} ms",
            timeout.as_millis()
        ))
    } else {
        ToolError::upstream_unavailable(format!("upstream call to {url} failed: {err}"))
    };
    error.with_request_id(request_id)
}
