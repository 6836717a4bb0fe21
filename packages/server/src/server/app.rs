//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domains::cleanse::CleanseService;
use crate::server::middleware::{owner_middleware, OWNER_HEADER};
use crate::server::routes::{
    download_handler, health_handler, list_jobs_handler, start_job_handler, stop_job_handler,
    stream_handler, upload_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub service: Arc<CleanseService>,
}

/// Build the Axum application router
pub fn build_app(service: Arc<CleanseService>, allowed_origins: Vec<String>) -> Router {
    let app_state = AxumAppState { service };

    let origins = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(OWNER_HEADER)]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/uploads/:file_name", post(upload_handler))
        .route("/api/jobs", post(start_job_handler).get(list_jobs_handler))
        .route("/api/jobs/:job_id/stream", get(stream_handler))
        .route("/api/jobs/:job_id/stop", post(stop_job_handler))
        .route("/api/jobs/:job_id/download", get(download_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(owner_middleware))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
