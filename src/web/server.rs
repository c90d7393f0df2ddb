//! Axum HTTP server for the matrix API.
//!
//! Public routes: `/` and `/api/health`. Everything under `/matrix` sits
//! behind the session gate.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    routing::{get, post},
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::context::RequestContext;
use crate::db::Database;
use crate::error::{GatewayError, MatrixError};
use crate::matrix::{MatrixService, MatrixTemplateRecord, MatrixView};
use crate::web::auth::{AuthState, auth_middleware};
use crate::web::types::*;

/// Shared state for all gateway handlers.
pub struct GatewayState {
    pub matrices: MatrixService,
    /// Shutdown signal sender.
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
    /// Running server task, awaited on shutdown so in-flight requests finish.
    pub server_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    /// Server startup time for uptime logging.
    pub startup_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self {
            matrices: MatrixService::new(store),
            shutdown_tx: tokio::sync::RwLock::new(None),
            server_task: tokio::sync::Mutex::new(None),
            startup_time: std::time::Instant::now(),
        }
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
        let task = self.server_task.lock().await.take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::error!("Matrix gateway task failed: {}", e);
        }
    }
}

fn startup_error(reason: String) -> GatewayError {
    GatewayError::StartupFailed {
        name: "gateway".to_string(),
        reason,
    }
}

/// Build the application router with all layers applied.
pub fn build_router(
    state: Arc<GatewayState>,
    auth_state: AuthState,
    cors_origins: &[String],
) -> Result<Router, GatewayError> {
    // Public routes (no auth)
    let public = Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler));

    // Protected routes (require a session)
    let protected = Router::new()
        .route("/matrix/all", get(matrix_list_handler))
        .route("/matrix/create", post(matrix_create_handler))
        .route(
            "/matrix/{id}",
            get(matrix_get_handler)
                .put(matrix_update_handler)
                .delete(matrix_delete_handler),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    let origins = cors_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| startup_error(format!("invalid CORS origin '{}': {}", origin, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
        ]))
        .allow_credentials(true);

    Ok(Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state))
}

/// Start the gateway HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<GatewayState>,
    auth_state: AuthState,
    cors_origins: &[String],
) -> Result<SocketAddr, GatewayError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| startup_error(format!("Failed to bind to {}: {}", addr, e)))?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| startup_error(format!("Failed to get local addr: {}", e)))?;

    let app = build_router(state.clone(), auth_state, cors_origins)?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    let startup_time = state.startup_time;
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                tracing::info!(
                    uptime_secs = startup_time.elapsed().as_secs(),
                    "Matrix gateway shutting down"
                );
            })
            .await
        {
            tracing::error!("Matrix gateway server error: {}", e);
        }
    });
    *state.server_task.lock().await = Some(task);

    tracing::info!(%bound_addr, "Matrix gateway listening");
    Ok(bound_addr)
}

/// Map a core error to an HTTP status and message.
///
/// Storage failures are logged and reported without detail.
fn matrix_error_response(ctx: &RequestContext, err: MatrixError) -> (StatusCode, String) {
    match err {
        MatrixError::Validation { .. }
        | MatrixError::MalformedCoordinate { .. }
        | MatrixError::OutOfRangeCoordinate { .. }
        | MatrixError::DuplicateLevelId { .. }
        | MatrixError::InvalidRiskLevelReference { .. } => {
            tracing::warn!(request_id = %ctx.request_id, error = %err, "rejected matrix request");
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        MatrixError::TemplateNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        MatrixError::Storage(e) => {
            tracing::error!(request_id = %ctx.request_id, error = %e, "matrix storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn parse_matrix_id(raw: &str) -> Result<i64, MatrixError> {
    raw.parse::<i64>()
        .map_err(|_| MatrixError::validation("id", format!("'{}' is not a numeric id", raw)))
}

// --- Public handlers ---

async fn root_handler() -> &'static str {
    "OK"
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// --- Matrix handlers ---

async fn matrix_list_handler(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<MatrixView>>, (StatusCode, String)> {
    state
        .matrices
        .list_all(&ctx)
        .await
        .map(Json)
        .map_err(|e| matrix_error_response(&ctx, e))
}

async fn matrix_get_handler(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Json<MatrixView>, (StatusCode, String)> {
    let id = parse_matrix_id(&id).map_err(|e| matrix_error_response(&ctx, e))?;
    state
        .matrices
        .get(&ctx, id)
        .await
        .map(Json)
        .map_err(|e| matrix_error_response(&ctx, e))
}

async fn matrix_create_handler(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<MatrixTemplateBody>,
) -> Result<(StatusCode, Json<MatrixTemplateRecord>), (StatusCode, String)> {
    let record = state
        .matrices
        .create(&ctx, &body.into_draft())
        .await
        .map_err(|e| matrix_error_response(&ctx, e))?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn matrix_update_handler(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<MatrixTemplateBody>,
) -> Result<Json<MatrixTemplateRecord>, (StatusCode, String)> {
    let id = parse_matrix_id(&id).map_err(|e| matrix_error_response(&ctx, e))?;
    state
        .matrices
        .replace(&ctx, id, &body.into_draft())
        .await
        .map(Json)
        .map_err(|e| matrix_error_response(&ctx, e))
}

async fn matrix_delete_handler(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let id = parse_matrix_id(&id).map_err(|e| matrix_error_response(&ctx, e))?;
    state
        .matrices
        .delete(&ctx, id)
        .await
        .map_err(|e| matrix_error_response(&ctx, e))?;
    Ok(StatusCode::NO_CONTENT)
}
