use crate::state::AppState;
use crate::{api, middleware as request_log};
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};

pub fn build_http_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(api::healthz))
        .route("/v1/machines", get(api::list_machines))
        .route("/v1/incidents", get(api::list_incidents))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(request_log::request_logging))
}
