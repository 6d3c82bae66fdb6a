//! HTTP dispatcher: the request recorder and the log viewer
//!
//! Every inbound request is either a viewer request (GET /log) or gets
//! recorded; the record store is the only state shared between the two.

use crate::config::Config;
use crate::html;
use crate::store::{RecordedRequest, RequestStore};
use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// App state shared by the recorder and the viewer
#[derive(Clone)]
struct AppState {
    store: Arc<RequestStore>,
}

/// Build the dispatcher: GET /log is the viewer, everything else is recorded.
///
/// Every response carries the HTML content type, error branches included.
pub fn router(store: Arc<RequestStore>) -> Router {
    let state = AppState { store };

    Router::new()
        // GET alone is the viewer; axum serves HEAD from the get handler
        // unless a head route is registered, so HEAD /log stays recorded
        .route(
            "/log",
            get(view_log).head(record_request).fallback(record_request),
        )
        .fallback(record_request)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        ))
        .with_state(state)
}

/// Bind the listener and serve until the process terminates
pub async fn run(config: &Config, store: Arc<RequestStore>) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        router(store).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// ============================================================================
// Request Recorder
// ============================================================================

/// Record the current request and confirm with the fixed "Log Added" page.
///
/// The request head is snapshotted as-is; the body is never read. Appending
/// cannot fail.
async fn record_request(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Html<&'static str> {
    let (parts, _body) = request.into_parts();
    let record = RecordedRequest::capture(&parts, remote_addr);

    tracing::debug!(
        "Recording {} {} from {}",
        record.method,
        record.url,
        record.remote_addr
    );
    state.store.append(record).await;

    Html(html::LOG_ADDED_PAGE)
}

// ============================================================================
// Log Viewer
// ============================================================================

/// List all recorded requests, or render one in full when `id` is given.
///
/// The `id` key's presence selects the detail branch even when its value is
/// empty; when the key repeats, the first value wins.
async fn view_log(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Html<String>, ViewerError> {
    let raw_id = match pairs.into_iter().find(|(key, _)| key == "id") {
        Some((_, raw_id)) => raw_id,
        None => return Ok(Html(render_list(&state.store.all().await))),
    };

    // Signed parse: a negative id is in range of the parser but never of the
    // store, so it surfaces as out-of-range rather than as a parse failure
    let id: i64 = raw_id
        .parse()
        .map_err(|source| ViewerError::InvalidId { id: raw_id, source })?;

    let record = match state.store.get(id).await {
        Some(record) => record,
        None => {
            return Err(ViewerError::OutOfRange {
                id,
                len: state.store.len().await,
            })
        }
    };

    let document = record.to_pretty_json()?;
    Ok(Html(render_detail(&document)))
}

/// Listing body: one link per record, the href encodes the listing index
fn render_list(records: &[RecordedRequest]) -> String {
    let links: String = records
        .iter()
        .enumerate()
        .map(|(id, record)| format!(r#"<a href="/log?id={}">{}</a><br/>"#, id, record.title()))
        .collect();

    html::LIST_PAGE.replace("{links}", &links)
}

/// Detail body: the document embedded verbatim apart from newlines becoming
/// explicit line breaks
fn render_detail(document: &str) -> String {
    html::DETAIL_PAGE.replace("{detail}", &document.replace('\n', "<br/>"))
}

/// Failures surfaced to viewer clients. Each maps to a status and a fixed
/// localized body; the detail stays in the server log.
#[derive(Debug, Error)]
enum ViewerError {
    #[error("invalid log id {id:?}: {source}")]
    InvalidId {
        id: String,
        source: std::num::ParseIntError,
    },

    #[error("log id {id} out of range ({len} entries)")]
    OutOfRange { id: i64, len: usize },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl IntoResponse for ViewerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ViewerError::InvalidId { .. } => (StatusCode::NOT_FOUND, "ID inválido"),
            ViewerError::OutOfRange { .. } | ViewerError::Serialize(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Error interno del servidor")
            }
        };

        if status.is_server_error() {
            tracing::error!("Viewer request failed: {}", self);
        } else {
            tracing::warn!("Viewer request failed: {}", self);
        }

        (status, body).into_response()
    }
}
