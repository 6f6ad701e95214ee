use crate::{
    routes::{error::ApiError, predict::CanvasPayload},
    server::SharedState,
};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::Response,
};
use digit_recognition::DigitInput;
use tracing::instrument;

fn png_response(png: Vec<u8>) -> Result<Response, ApiError> {
    Response::builder()
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(png))
        .map_err(|e| ApiError::HttpBuilder(e.to_string()))
}

#[instrument(skip(state, image_data), fields(bytes = image_data.len()))]
pub async fn preview_upload(
    State(state): State<SharedState>,
    image_data: Bytes,
) -> Result<Response, ApiError> {
    state.metrics.record_request("/preview/upload");
    if image_data.is_empty() {
        return Err(ApiError::NoInput);
    }

    let png = state
        .recognizer
        .preview(DigitInput::Upload(image_data))
        .await?;
    png_response(png)
}

#[instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn preview_canvas(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    state.metrics.record_request("/preview/canvas");
    let canvas = CanvasPayload::parse(&body)?;

    let png = state
        .recognizer
        .preview(DigitInput::Canvas(canvas))
        .await?;
    png_response(png)
}
