//! The launch endpoint.
//!
//! Handles `POST /launch` with an `application/x-www-form-urlencoded` body.
//! OAuth parameters are accepted either in the body or in an
//! `Authorization: OAuth` header. The endpoint rebuilds the URL the
//! consumer signed (honoring `X-Forwarded-Proto`/`X-Forwarded-Host` when
//! deployed behind a proxy), runs the validation pipeline and maps the
//! outcome onto an HTTP response.
//!
//! Status mapping for problem reports:
//!
//! | problem code                           | status |
//! |----------------------------------------|--------|
//! | consumer_unknown, signature_*, timestamp_refused, nonce_used | 401 |
//! | parameter_missing, parameter_unsupported | 400 |
//! | completion_rejected                    | 403 |
//! | completion_error                       | 500 |
//! | store_unavailable                      | 503 |

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::post,
};
use tower_http::trace::TraceLayer;
use url::Url;

use ltigate_auth::LaunchValidator;
use ltigate_core::{LaunchRequest, ProblemCode, ProblemReport};

/// Shared state of the launch endpoint.
#[derive(Clone)]
pub struct AppState {
    /// The validation pipeline, shared across requests.
    pub validator: Arc<LaunchValidator>,
}

impl AppState {
    /// Creates the state around a validator.
    #[must_use]
    pub fn new(validator: Arc<LaunchValidator>) -> Self {
        Self { validator }
    }
}

/// Builds the router exposing `POST /launch`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/launch", post(launch_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn launch_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(url) = request_url(&uri, &headers) else {
        return (
            StatusCode::BAD_REQUEST,
            "cannot determine the request URL; missing Host header",
        )
            .into_response();
    };
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let request = LaunchRequest::from_form(method.as_str(), &url, authorization, &body);

    match state.validator.validate(&request).await {
        Ok(context) => (
            StatusCode::OK,
            format!("launch accepted: resource link {}", context.resource_link_id),
        )
            .into_response(),
        Err(report) => problem_response(&report),
    }
}

/// Serializes a problem report as the HTTP error body.
///
/// The report's rendering contract guarantees the consumer secret can never
/// appear here.
#[must_use]
pub fn problem_response(report: &ProblemReport) -> Response {
    (status_for(report), report.to_string()).into_response()
}

/// Maps a problem report onto a response status.
#[must_use]
pub fn status_for(report: &ProblemReport) -> StatusCode {
    match report.code() {
        Some(
            ProblemCode::ConsumerUnknown
            | ProblemCode::SignatureInvalid
            | ProblemCode::SignatureMethodRejected
            | ProblemCode::TimestampRefused
            | ProblemCode::NonceUsed,
        ) => StatusCode::UNAUTHORIZED,
        Some(ProblemCode::ParameterMissing(_) | ProblemCode::ParameterUnsupported(_)) => {
            StatusCode::BAD_REQUEST
        }
        Some(ProblemCode::CompletionRejected) => StatusCode::FORBIDDEN,
        Some(ProblemCode::CompletionError) | None => StatusCode::INTERNAL_SERVER_ERROR,
        Some(ProblemCode::StoreUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Rebuilds the absolute URL the consumer signed.
///
/// Proxy headers win over the request line; the scheme defaults to `http`
/// when nothing asserts otherwise.
fn request_url(uri: &Uri, headers: &HeaderMap) -> Option<Url> {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    let scheme = header_str("x-forwarded-proto")
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");
    let host = header_str("x-forwarded-host")
        .or_else(|| header_str(header::HOST.as_str()))
        .or_else(|| uri.host())?;
    let path_and_query = uri
        .path_and_query()
        .map_or("/", |path_and_query| path_and_query.as_str());
    Url::parse(&format!("{scheme}://{host}{path_and_query}")).ok()
}
