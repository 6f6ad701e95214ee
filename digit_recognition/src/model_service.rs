use async_trait::async_trait;
use ndarray::{Array, Ix4};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to build session: {0}")]
    Session(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to extract output: {0}")]
    Output(String),
    #[error("inference task failed: {0}")]
    Runtime(String),
}

#[async_trait]
pub trait ModelService: Send + Sync + 'static {
    /// Returns the output row of the single batch element.
    async fn predict(&self, input: Array<f32, Ix4>) -> Result<Vec<f32>, ModelError>;
}
