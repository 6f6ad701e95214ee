use crate::{
    classification::{Classification, ClassificationError, Classifier},
    labels::DigitLabels,
    model_service::{ModelError, ModelService},
    preprocessing::{encode_preview, CanvasImage, DigitTensor, PreprocessError, Preprocessor},
};
use bytes::Bytes;
use image::GrayImage;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error("Error during prediction: {0}")]
    Model(#[from] ModelError),
    #[error("Error during prediction: {0}")]
    Classification(#[from] ClassificationError),
    #[error("Error during prediction: preprocessing task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone)]
pub enum DigitInput {
    Upload(Bytes),
    Canvas(CanvasImage),
}

impl DigitInput {
    pub fn kind(&self) -> &'static str {
        match self {
            DigitInput::Upload(_) => "upload",
            DigitInput::Canvas(_) => "canvas",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recognition {
    pub classification: Classification,
    pub preview: GrayImage,
}

#[derive(Clone)]
pub struct DigitRecognizer {
    preprocessor: Preprocessor,
    model_service: Arc<dyn ModelService>,
    classifier: Classifier,
    labels: DigitLabels,
}

impl DigitRecognizer {
    pub fn new(
        preprocessor: Preprocessor,
        model_service: Arc<dyn ModelService>,
        classifier: Classifier,
        labels: DigitLabels,
    ) -> Self {
        Self {
            preprocessor,
            model_service,
            classifier,
            labels,
        }
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn labels(&self) -> &DigitLabels {
        &self.labels
    }

    /// Decoding and resizing run on the blocking pool.
    async fn run_blocking<T, F>(&self, input: DigitInput, then: F) -> Result<T, RecognitionError>
    where
        T: Send + 'static,
        F: FnOnce(DigitTensor) -> Result<T, PreprocessError> + Send + 'static,
    {
        let preprocessor = self.preprocessor;
        let result = tokio::task::spawn_blocking(move || {
            let tensor = match input {
                DigitInput::Upload(image_data) => preprocessor.preprocess_upload(&image_data),
                DigitInput::Canvas(canvas) => preprocessor.preprocess_canvas(canvas),
            }?;
            then(tensor)
        })
        .await
        .map_err(|e| RecognitionError::Task(e.to_string()))?;

        Ok(result?)
    }

    #[instrument(skip(self, input), fields(kind = input.kind()))]
    pub async fn recognize(&self, input: DigitInput) -> Result<Recognition, RecognitionError> {
        let DigitTensor { input, preview } = self.run_blocking(input, Ok).await?;

        let output = self.model_service.predict(input).await?;
        let classification = self
            .classifier
            .classify(&output, |digit| self.labels.name(digit))?;

        tracing::debug!(
            outcome = classification.outcome.as_str(),
            digit = ?classification.digit,
            confidence = classification.confidence,
            "Classified input"
        );

        Ok(Recognition {
            classification,
            preview,
        })
    }

    /// PNG of the preprocessed image, without running the model.
    #[instrument(skip(self, input), fields(kind = input.kind()))]
    pub async fn preview(&self, input: DigitInput) -> Result<Vec<u8>, RecognitionError> {
        self.run_blocking(input, |tensor| encode_preview(&tensor.preview)).await
    }
}
