//! Request routing and JSON responses.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{ALLOW, CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::{Method, Request, Response, StatusCode, Uri};
use serde::Serialize;
use serde_json::json;
use tracing::Instrument;

use super::ServerOptions;
use crate::core::degraded::degraded_document;
use crate::core::facade::{CacheFacade, Served};
use crate::core::family::MetricFamily;
use crate::error::ProducerError;

/// Response body type.
pub type Body = Full<Bytes>;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
const FORCE_PARAMS: &[&str] = &["refresh", "force_refresh", "nocache"];

/// Shared state behind every connection.
#[derive(Debug)]
pub struct AppState {
    facade: Arc<CacheFacade>,
    options: ServerOptions,
}

impl AppState {
    /// Wrap a facade for serving.
    #[must_use]
    pub const fn new(facade: Arc<CacheFacade>, options: ServerOptions) -> Self {
        Self { facade, options }
    }
}

/// hyper service entry point.
///
/// # Errors
///
/// Never; every failure is turned into a JSON response.
pub async fn handle<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Body>, Infallible> {
    let span = tracing::info_span!("request", method = %req.method(), path = req.uri().path());
    async move {
        let start = Instant::now();
        let response = respond(req.method(), req.uri(), &state).await;
        let cache = response
            .headers()
            .get(&X_CACHE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        tracing::info!(
            status = response.status().as_u16(),
            cache,
            duration_ms = start.elapsed().as_millis() as u64,
            "Request served"
        );
        Ok(response)
    }
    .instrument(span)
    .await
}

/// Route a request to its response.
pub async fn respond(method: &Method, uri: &Uri, state: &AppState) -> Response<Body> {
    if method != Method::GET {
        let mut response = error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET"));
        return response;
    }

    let path = uri.path().trim_end_matches('/');
    let query = uri.query().unwrap_or("");

    match path {
        "" => json_response(StatusCode::OK, &service_info()),
        "/health" => json_response(StatusCode::OK, &json!({"status": "ok"})),
        "/api/agile-metrics" => metrics(MetricFamily::Agile, query, state).await,
        "/api/executive-metrics" => metrics(MetricFamily::Executive, query, state).await,
        "/api/cache/status" => cache_status(query, state),
        _ => match path.strip_prefix("/api/metrics/") {
            Some(name) => match MetricFamily::from_cli_name(name) {
                Ok(family) => metrics(family, query, state).await,
                Err(_) => unknown_family(name),
            },
            None => error_response(StatusCode::NOT_FOUND, "not found"),
        },
    }
}

async fn metrics(family: MetricFamily, query: &str, state: &AppState) -> Response<Body> {
    let force_refresh = wants_refresh(query);
    let facade = &state.facade;

    let served = match state.options.request_timeout {
        Some(limit) => {
            match tokio::time::timeout(limit, facade.get_instant(family, force_refresh)).await {
                Ok(served) => served,
                Err(_) => {
                    tracing::warn!(
                        %family,
                        timeout_secs = limit.as_secs(),
                        "Gave up waiting for metrics; refresh continues in the background"
                    );
                    let document = degraded_document(family, &ProducerError::timeout(limit));
                    return with_cache_label(
                        json_response(StatusCode::GATEWAY_TIMEOUT, &document),
                        "degraded",
                    );
                }
            }
        }
        None => facade.get_instant(family, force_refresh).await,
    };

    if let Served::Failed(error) = &served {
        tracing::warn!(%family, error = %error, "Serving degraded metrics");
    }
    let label = served.cache_label();
    let document = served.into_document(family);
    with_cache_label(json_response(StatusCode::OK, &document), label)
}

fn cache_status(query: &str, state: &AppState) -> Response<Body> {
    match query_value(query, "family") {
        Some(name) => match MetricFamily::from_cli_name(&name) {
            Ok(family) => json_response(StatusCode::OK, &state.facade.status(family)),
            Err(_) => unknown_family(&name),
        },
        None => json_response(StatusCode::OK, &state.facade.status_all()),
    }
}

fn service_info() -> serde_json::Value {
    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/api/agile-metrics",
            "/api/executive-metrics",
            "/api/metrics/{family}",
            "/api/cache/status",
        ],
    })
}

/// Whether the query asks to bypass the snapshot.
fn wants_refresh(query: &str) -> bool {
    FORCE_PARAMS
        .iter()
        .filter_map(|key| query_value(query, key))
        .any(|value| is_truthy(&value))
}

/// Decoded value of `key`, with `+` and percent escapes resolved.
fn query_value(query: &str, key: &str) -> Option<String> {
    let url = reqwest::Url::parse(&format!("http://localhost/?{query}")).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn unknown_family(name: &str) -> Response<Body> {
    let valid: Vec<&str> = MetricFamily::ALL.iter().map(|f| f.cli_name()).collect();
    json_response(
        StatusCode::NOT_FOUND,
        &json!({
            "error": format!("unknown metric family: {name}"),
            "families": valid,
        }),
    )
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &json!({ "error": message }))
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Body> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, Bytes::from(bytes)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response body");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"serialization failed"}"#),
            )
        }
    };
    let mut response = Response::new(Full::new(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn with_cache_label(mut response: Response<Body>, label: &'static str) -> Response<Body> {
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(label));
    response
}
