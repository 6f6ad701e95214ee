use crate::{routes::error::ApiError, server::SharedState};
use axum::{body::Bytes, extract::State, response::Json};
use base64::{engine::general_purpose::STANDARD, Engine};
use digit_recognition::{CanvasImage, Classification, DigitInput};
use serde::Deserialize;
use std::time::Instant;
use tracing::instrument;

pub const UPLOAD_ROUTE: &str = "/predict/upload";
pub const CANVAS_ROUTE: &str = "/predict/canvas";

/// Canvas export: row-major RGBA bytes, base64 encoded.
#[derive(Debug, Deserialize)]
pub struct CanvasPayload {
    pub width: u32,
    pub height: u32,
    pub rgba: String,
}

impl CanvasPayload {
    pub fn parse(body: &[u8]) -> Result<CanvasImage, ApiError> {
        if body.is_empty() {
            return Err(ApiError::NoInput);
        }
        let payload: CanvasPayload = serde_json::from_slice(body)?;
        if payload.rgba.is_empty() {
            return Err(ApiError::NoInput);
        }

        Ok(CanvasImage {
            width: payload.width,
            height: payload.height,
            rgba: STANDARD.decode(payload.rgba.as_bytes())?,
        })
    }
}

async fn classify(
    state: &SharedState,
    input: DigitInput,
    route: &str,
) -> Result<Json<Classification>, ApiError> {
    let start = Instant::now();
    let recognition = state.recognizer.recognize(input).await?;
    state
        .metrics
        .record_prediction_duration(start.elapsed().as_millis() as u64, route);

    let classification = recognition.classification;
    state.metrics.record_prediction(classification.outcome.as_str());
    tracing::info!("{}", classification.message);

    Ok(Json(classification))
}

#[instrument(skip(state, image_data), fields(bytes = image_data.len()))]
pub async fn predict_upload(
    State(state): State<SharedState>,
    image_data: Bytes,
) -> Result<Json<Classification>, ApiError> {
    state.metrics.record_request(UPLOAD_ROUTE);
    if image_data.is_empty() {
        return Err(ApiError::NoInput);
    }

    classify(&state, DigitInput::Upload(image_data), UPLOAD_ROUTE).await
}

#[instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn predict_canvas(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<Classification>, ApiError> {
    state.metrics.record_request(CANVAS_ROUTE);
    let canvas = CanvasPayload::parse(&body)?;

    classify(&state, DigitInput::Canvas(canvas), CANVAS_ROUTE).await
}
