// ==============================================================================
// web server
// ==============================================================================
// routes:
//     POST    /data    sensor node posts a reading, gets a spray decision
//     GET     /data    liveness probe
//     OPTIONS *        cors preflight, answered with {"status":"ok"}
//     GET     /latest  dashboard polls the current LatestState
//     GET     /health  service health + whether the model loaded
//     GET     /        static dashboard page

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Local;
use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeFile, trace::TraceLayer};

use crate::domain::LatestState;
use crate::error::IngestError;
use crate::ingest::{IngestEngine, IngestReply};
use crate::state::StateCell;

/// everything a handler needs; cheap to clone into each request
#[derive(Clone)]
pub struct AppContext {
    pub state: StateCell,
    pub engine: Arc<IngestEngine>,
    pub service_name: Arc<str>,
}

impl AppContext {
    pub fn new(engine: IngestEngine, service_name: &str) -> Self {
        Self {
            state: StateCell::new(),
            engine: Arc::new(engine),
            service_name: Arc::from(service_name),
        }
    }
}

pub fn router(ctx: AppContext, static_dir: &Path) -> Router {
    with_layers(routes(static_dir)).with_state(ctx)
}

fn routes(static_dir: &Path) -> Router<AppContext> {
    Router::new()
        .route(
            "/data",
            get(data_ready_handler).post(data_post_handler),
        )
        .route("/latest", get(latest_handler))
        .route("/health", get(health_handler))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
}

/// innermost first: panics, tracing, cors, then the OPTIONS payload
fn with_layers(routes: Router<AppContext>) -> Router<AppContext> {
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(preflight_ok))
}

pub async fn serve(ctx: AppContext, static_dir: &Path, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = router(ctx, static_dir);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[STARTUP] ✓ Dashboard live at http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// ISO-8601 local time with microseconds
fn iso_now() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

async fn data_post_handler(
    State(ctx): State<AppContext>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestReply>, IngestError> {
    // an oversized or aborted upload is the client's fault
    let body = body.map_err(|e| {
        if e.status().is_client_error() {
            tracing::warn!("[DATA] rejected request body: {}", e.body_text());
            IngestError::Malformed(e.body_text())
        } else {
            tracing::error!("[DATA] failed to read request body: {}", e);
            IngestError::Unexpected(e.to_string())
        }
    })?;

    ctx.engine.ingest(&ctx.state, &body, Local::now()).await.map(Json)
}

async fn data_ready_handler(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ready",
        "message": format!("{} server active", ctx.service_name),
        "timestamp": iso_now(),
    }))
}

/// the cors layer answers every OPTIONS request itself with an empty body;
/// give those replies the ok payload clients expect
async fn preflight_ok(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }

    let (mut parts, _) = next.run(req).await.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(r#"{"status":"ok"}"#))
}

/// json api endpoint for the dashboard
/// returns the current LatestState verbatim
async fn latest_handler(State(ctx): State<AppContext>) -> Json<LatestState> {
    Json(ctx.state.snapshot().await)
}

async fn health_handler(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": format!("{} host", ctx.service_name),
        "model_loaded": ctx.engine.model_loaded(),
        "latest_data_time": ctx.state.last_time().await,
        "timestamp": iso_now(),
    }))
}

/// a panicking handler becomes a 500 in the same shape as other errors
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("[ERROR] handler panicked: {}", detail);

    let body = Json(serde_json::json!({
        "status": "error",
        "message": format!("server error: {}", detail),
    }));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}
