pub mod classification;
pub mod config;
pub mod labels;
pub mod model_service;
pub mod ort_service;
pub mod preprocessing;
pub mod recognizer;

pub use classification::{Classification, Classifier, Outcome};
pub use labels::{DigitLabel, DigitLabels};
pub use model_service::{ModelError, ModelService};
pub use ort_service::OrtModelService;
pub use preprocessing::{CanvasImage, Preprocessor, TensorLayout};
pub use recognizer::{DigitInput, DigitRecognizer, Recognition, RecognitionError};
