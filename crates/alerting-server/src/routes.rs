use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::state::AppState;

/// The alerts API, served for the default space and under `/s/:space_id`.
pub fn router(state: Arc<AppState>) -> Router {
    let alerts = Router::new()
        .route("/alert", post(create_rule))
        .route(
            "/alert/:id",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
        .route("/alert/:id/_enable", post(enable_rule))
        .route("/alert/:id/_disable", post(disable_rule))
        .route("/alert/:id/_update_api_key", post(update_rule_api_key))
        .route("/_find", get(find_rules))
        .route("/list_alert_types", get(list_rule_types))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    Router::new()
        .nest("/api/alerts", alerts.clone())
        .nest("/s/:space_id/api/alerts", alerts)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
