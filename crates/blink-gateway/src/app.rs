use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_short_url_handler, delete_short_url_handler, get_metrics_handler, health_handler,
    redirect_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/private/v1/short-urls", post(create_short_url_handler))
            .route(
                "/private/v1/short-urls/{id}",
                delete(delete_short_url_handler),
            )
            .route(
                "/private/v1/short-urls/{id}/metrics",
                get(get_metrics_handler),
            )
            .route("/public/v1/short-urls/{id}", get(redirect_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
