// Server module - Pingora HTTP front end for the weather handler
//
// Every request is answered locally in `request_filter`; no request is ever
// forwarded upstream.

use async_trait::async_trait;
use http::Method;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::constants::{HEALTH_PATH, METRICS_PATH};
use crate::fetcher::CacheAsideFetcher;

pub mod endpoints;
pub mod init;

pub use endpoints::EndpointResponse;

/// What a request resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Weather,
    Preflight,
    Health,
    Metrics,
    MethodNotAllowed,
    NotFound,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Weather => "weather",
            Route::Preflight => "preflight",
            Route::Health => "health",
            Route::Metrics => "metrics",
            Route::MethodNotAllowed => "method_not_allowed",
            Route::NotFound => "not_found",
        }
    }
}

/// Resolve `method` and `path` against the configured weather routes
///
/// A single trailing slash is ignored. Query strings must already be
/// stripped from `path`.
pub fn route(method: &Method, path: &str, weather_routes: &[String]) -> Route {
    let path = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };

    if weather_routes.iter().any(|r| r == path) {
        return match *method {
            Method::GET => Route::Weather,
            Method::OPTIONS => Route::Preflight,
            _ => Route::MethodNotAllowed,
        };
    }

    let builtin = if path == HEALTH_PATH {
        Route::Health
    } else if path == METRICS_PATH {
        Route::Metrics
    } else {
        return Route::NotFound;
    };

    if *method == Method::GET {
        builtin
    } else {
        Route::MethodNotAllowed
    }
}

/// Per-request state
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    started: Instant,
    method: String,
    path: String,
    route: Option<Route>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            started: Instant::now(),
            method: String::new(),
            path: String::new(),
            route: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn route(&self) -> Option<Route> {
        self.route
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// WeatherService implements the Pingora ProxyHttp trait
/// Routes requests to the cache-aside fetcher and the built-in endpoints
pub struct WeatherService {
    fetcher: Arc<CacheAsideFetcher>,
    routes: Vec<String>,
    /// Service start time (for uptime calculation in /health endpoint)
    start_time: Instant,
}

impl WeatherService {
    pub fn new(fetcher: Arc<CacheAsideFetcher>, routes: Vec<String>) -> Self {
        Self {
            fetcher,
            routes,
            start_time: Instant::now(),
        }
    }

    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    /// Produce the response for a resolved route
    pub async fn respond(&self, route: Route, method: &str, path: &str) -> EndpointResponse {
        match route {
            Route::Weather => self.fetcher.handle_request(None).await.into(),
            Route::Preflight => endpoints::handle_preflight(),
            Route::Health => endpoints::handle_health(self.start_time),
            Route::Metrics => endpoints::handle_metrics(self.fetcher.metrics()),
            Route::MethodNotAllowed => endpoints::handle_method_not_allowed(method, path),
            Route::NotFound => endpoints::handle_not_found(path),
        }
    }
}

async fn write_response(
    session: &mut Session,
    response: EndpointResponse,
    request_id: &str,
) -> Result<()> {
    let mut header = ResponseHeader::build(response.status, None)?;
    for (name, value) in &response.headers {
        header.insert_header(*name, value.as_str())?;
    }
    header.insert_header("X-Request-Id", request_id)?;
    header.insert_header("Content-Length", response.body.len().to_string())?;

    if response.body.is_empty() {
        session
            .write_response_header(Box::new(header), true)
            .await?;
    } else {
        session
            .write_response_header(Box::new(header), false)
            .await?;
        session
            .write_response_body(Some(response.body.into()), true)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl ProxyHttp for WeatherService {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new()
    }

    /// Never reached: `request_filter` answers every request
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        tracing::error!(
            request_id = %ctx.request_id(),
            "Request reached upstream selection"
        );
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "kumo does not proxy requests upstream",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let method = req.method.clone();
        ctx.method = method.as_str().to_string();
        ctx.path = req.uri.path().to_string();

        let resolved = route(&method, &ctx.path, &self.routes);
        ctx.route = Some(resolved);

        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            route = resolved.as_str(),
            "Routing request"
        );

        let response = self.respond(resolved, &ctx.method, &ctx.path).await;
        write_response(session, response, &ctx.request_id).await?;

        Ok(true) // Request handled
    }

    /// Log request completion for metrics and debugging
    async fn logging(
        &self,
        session: &mut Session,
        e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);
        let duration_ms = ctx.elapsed_ms();

        let metrics = self.fetcher.metrics();
        metrics.increment_request_count();
        metrics.increment_status_count(status_code);

        if let Some(error) = e {
            tracing::warn!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                error = %error,
                "Request ended with error"
            );
        }

        tracing::info!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            route = ctx.route.map(|r| r.as_str()).unwrap_or("unrouted"),
            status = status_code,
            duration_ms = duration_ms,
            "Request completed"
        );
    }
}
