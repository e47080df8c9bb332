//! HTTP server for the csvql API.
//!
//! # API Endpoints
//!
//! | Method | Path         | Description                                   |
//! |--------|--------------|-----------------------------------------------|
//! | GET    | `/health`    | Health check                                  |
//! | GET    | `/graphql`   | Run `read` / `uploadCSV` from query params    |
//! | POST   | `/graphql`   | JSON query body, or multipart file upload     |
//! | GET    | `/api/logs`  | SSE stream for real-time logs                 |
//!
//! Every route answers `OPTIONS` preflight itself through the CORS layer.

use axum::{
    body,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Map, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use super::logs::{log_info, log_warning, LOG_BROADCASTER};
use super::query::{resolve, ResolvedOperation};
use super::types::{QueryParams, QueryRequest, QueryResponse};
use crate::acquire::acquire_upload;
use crate::config::{Config, UploadMode, UPLOAD_PART_NAME};
use crate::dispatch::{Argument, Dispatcher, Operation};
use crate::error::{PipelineError, ServerResult};

/// Largest request body accepted on `/graphql`, JSON or multipart.
const MAX_BODY: usize = 16 * 1024 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
}

/// CORS policy applied to every response, preflight included.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([header::CONTENT_TYPE])
}

/// Build the application router around a dispatcher.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/graphql", get(graphql_get).post(graphql_post))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_BODY))
        .layer(cors_layer())
        .with_state(AppState { dispatcher })
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> ServerResult<()> {
    let port = config.port;
    let read_source = config.read_source.to_string();
    let upload_mode = config.upload_mode;
    let app = router(Arc::new(Dispatcher::new(Arc::new(config))));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 csvql server running on http://localhost:{}", port);
    println!("   POST /graphql    - read / uploadCSV");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");
    println!();
    println!("📄 read source:  {}", read_source);
    println!("📤 upload mode:  {}", upload_mode);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    let config = state.dispatcher.config();
    Json(json!({
        "status": "ok",
        "service": "csvql",
        "version": env!("CARGO_PKG_VERSION"),
        "readSource": config.read_source.to_string(),
        "uploadMode": config.upload_mode.to_string(),
        "endpoints": {
            "graphql": "GET|POST /graphql",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn graphql_get(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    log_info(format!("[{}] GET /graphql", request_id));

    match QueryRequest::try_from(params) {
        Ok(request) => run_query(&state, request, &request_id).await,
        Err(e) => request_failure(&e, &request_id),
    }
}

async fn graphql_post(State(state): State<AppState>, request: Request) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    log_info(format!("[{}] POST /graphql ({})", request_id, content_type));

    if is_multipart(&content_type) {
        // Inline mode takes no file part, so the body is never read.
        if state.dispatcher.config().upload_mode == UploadMode::Inline {
            let err = PipelineError::InvalidArgument(
                "file content must be a string, got file".to_string(),
            );
            return operation_failure(Operation::UploadCsv.field_name(), &err, &request_id);
        }
        return multipart_upload(&state, request, &request_id).await;
    }

    let bytes = match body::to_bytes(request.into_body(), MAX_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = PipelineError::BadRequest(format!("Cannot read body: {}", e));
            return request_failure(&err, &request_id);
        }
    };

    match serde_json::from_slice::<QueryRequest>(&bytes) {
        Ok(query) => run_query(&state, query, &request_id).await,
        Err(e) => {
            let err = PipelineError::BadRequest(format!("Body is not a valid query request: {}", e));
            request_failure(&err, &request_id)
        }
    }
}

/// A multipart POST is an `uploadCSV` call with the file in the `file` part.
async fn multipart_upload(state: &AppState, request: Request, request_id: &str) -> Response {
    let key = Operation::UploadCsv.field_name();

    let mut multipart = match Multipart::from_request(request, state).await {
        Ok(m) => m,
        Err(e) => {
            let err = PipelineError::BadRequest(format!("Multipart error: {}", e));
            return request_failure(&err, request_id);
        }
    };

    let raw = match acquire_upload(&mut multipart, UPLOAD_PART_NAME).await {
        Ok(raw) => raw,
        Err(e) => return operation_failure(key, &e, request_id),
    };

    let resolved = ResolvedOperation {
        operation: Operation::UploadCsv,
        response_key: key.to_string(),
        argument: Argument::File(raw),
    };
    execute(state, resolved, request_id).await
}

async fn run_query(
    state: &AppState,
    request: QueryRequest,
    request_id: &str,
) -> Response {
    let variables = request.variables.unwrap_or_else(Map::new);
    let resolved = match resolve(
        request.query.as_deref(),
        request.operation_name.as_deref(),
        &variables,
    ) {
        Ok(resolved) => resolved,
        Err(e) => return request_failure(&e, request_id),
    };

    // JSON bodies and query strings never carry a file part.
    let requires_multipart = resolved.operation == Operation::UploadCsv
        && state.dispatcher.config().upload_mode == UploadMode::Multipart;
    if requires_multipart {
        let err = PipelineError::BadRequest(
            "uploadCSV requires a multipart/form-data request".to_string(),
        );
        return request_failure(&err, request_id);
    }

    execute(state, resolved, request_id).await
}

async fn execute(state: &AppState, resolved: ResolvedOperation, request_id: &str) -> Response {
    let key = resolved.response_key.clone();
    match state.dispatcher.dispatch(resolved.into_request()).await {
        Ok(text) => Json(QueryResponse::success(&key, text)).into_response(),
        Err(e) => operation_failure(&key, &e, request_id),
    }
}

fn operation_failure(key: &str, err: &PipelineError, request_id: &str) -> Response {
    let status = match err {
        PipelineError::BadRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };
    log_warning(format!("[{}] {} failed: {}", request_id, key, err));
    (status, Json(QueryResponse::operation_error(key, err, request_id))).into_response()
}

fn request_failure(err: &PipelineError, request_id: &str) -> Response {
    log_warning(format!("[{}] rejected: {}", request_id, err));
    (
        StatusCode::BAD_REQUEST,
        Json(QueryResponse::request_error(err, request_id)),
    )
        .into_response()
}

fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
}
