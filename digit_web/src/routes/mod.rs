pub mod error;
mod health;
mod info;
mod metrics;
mod predict;
mod preview;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/digits", get(info::list_digits))
        .route("/model", get(info::model_info))
        .route(predict::UPLOAD_ROUTE, post(predict::predict_upload))
        .route(predict::CANVAS_ROUTE, post(predict::predict_canvas))
        .route("/preview/upload", post(preview::preview_upload))
        .route("/preview/canvas", post(preview::preview_canvas))
}
