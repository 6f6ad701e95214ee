use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use digit_recognition::{preprocessing::PreprocessError, RecognitionError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No image or drawing to classify.")]
    NoInput,
    #[error("Invalid canvas payload: {0}")]
    CanvasPayload(#[from] serde_json::Error),
    #[error("Invalid canvas pixels: {0}")]
    CanvasEncoding(#[from] base64::DecodeError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("Failed to encode metrics: {0}")]
    Metrics(String),
    #[error("HTTP builder failed: {0}")]
    HttpBuilder(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn preprocess_status(err: &PreprocessError) -> StatusCode {
    match err {
        PreprocessError::Empty => StatusCode::BAD_REQUEST,
        PreprocessError::Decode(_) | PreprocessError::CanvasSize { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PreprocessError::Io(_) | PreprocessError::Shape(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoInput => StatusCode::BAD_REQUEST,
            ApiError::CanvasPayload(_) | ApiError::CanvasEncoding(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Recognition(RecognitionError::Preprocess(err)) => preprocess_status(err),
            ApiError::Recognition(_) | ApiError::Metrics(_) | ApiError::HttpBuilder(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
