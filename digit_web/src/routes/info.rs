use crate::{config::ModelCardConfig, server::SharedState};
use axum::{extract::State, response::Json};
use digit_recognition::DigitLabel;
use serde::Serialize;

#[derive(Serialize)]
pub struct ModelInfo {
    #[serde(flatten)]
    card: ModelCardConfig,
    input_shape: [usize; 4],
    confidence_threshold: f32,
    classes: usize,
}

pub async fn list_digits(State(state): State<SharedState>) -> Json<Vec<DigitLabel>> {
    state.metrics.record_request("/digits");
    Json(state.recognizer.labels().all().to_vec())
}

pub async fn model_info(State(state): State<SharedState>) -> Json<ModelInfo> {
    state.metrics.record_request("/model");
    let preprocessor = state.recognizer.preprocessor();

    Json(ModelInfo {
        card: state.model_card.clone(),
        input_shape: preprocessor.layout.shape(preprocessor.input_size),
        confidence_threshold: state.recognizer.classifier().confidence_threshold(),
        classes: state.recognizer.labels().all().len(),
    })
}
