use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // The form builder and fill-out UI are served from another origin
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/v1/forms", form_routes().layer(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn form_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(handlers::forms::list_forms).post(handlers::forms::create_form),
        )
        .route(
            "/{id}",
            get(handlers::forms::get_form).put(handlers::forms::update_form),
        )
        .route("/{id}/publish", post(handlers::forms::publish_form))
        .route("/{id}/unpublish", post(handlers::forms::unpublish_form))
        .route(
            "/{id}/pages/{page}/validate",
            post(handlers::forms::validate_page),
        )
        .route("/{id}/validate", post(handlers::forms::validate_form))
        .route(
            "/{id}/submissions",
            get(handlers::submissions::list_submissions)
                .post(handlers::submissions::submit_form),
        )
        .route(
            "/{id}/submissions/{submission_id}/score",
            get(handlers::submissions::score_submission),
        )
        .route("/{id}/analytics", get(handlers::forms::get_analytics))
}
