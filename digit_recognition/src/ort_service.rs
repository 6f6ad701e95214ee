use crate::{
    config::{ModelConfig, Validatable},
    model_service::{ModelError, ModelService},
};
use async_trait::async_trait;
use ndarray::{Array, Ix4};
#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: Arc<str>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelError> {
        #[cfg(feature = "tensorrt")]
        let environment = ort::init().with_execution_providers([
            TensorRTExecutionProvider::default()
                .with_engine_cache(true)
                .build(),
        ]);
        #[cfg(not(feature = "tensorrt"))]
        let environment = ort::init();
        environment
            .commit()
            .map_err(|e| ModelError::Session(format!("failed to init runtime: {}", e)))?;

        let num_instances = model_config.num_instances.max(1);
        let model_path = model_config.get_path();
        let sessions = (0..num_instances)
            .map(|_| {
                Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(&model_path)
            })
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| ModelError::Session(e.to_string()))?;

        let output_names: Vec<String> = sessions[0]
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();
        let output_name = resolve_output_name(&output_names, model_config.output_name.as_ref())?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}, reading output {:?}",
            num_instances,
            model_path,
            output_name
        );

        Ok(Self {
            sessions: Arc::new(
                sessions
                    .into_iter()
                    .map(|session| Arc::new(Mutex::new(session)))
                    .collect(),
            ),
            counter: Arc::new(AtomicUsize::new(0)),
            output_name: output_name.into(),
        })
    }

    fn next_session(&self) -> (usize, Arc<Mutex<Session>>) {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        (index, self.sessions[index].clone())
    }
}

/// Configured name if the model declares it, otherwise the first output.
fn resolve_output_name(
    output_names: &[String],
    configured: Option<&String>,
) -> Result<String, ModelError> {
    match configured {
        Some(name) if output_names.contains(name) => Ok(name.clone()),
        Some(name) => Err(ModelError::Session(format!(
            "model has no output named {:?}, available: {:?}",
            name, output_names
        ))),
        None => output_names
            .first()
            .cloned()
            .ok_or_else(|| ModelError::Session("model declares no outputs".to_string())),
    }
}

fn run_inference(
    session: &Mutex<Session>,
    input: &Array<f32, Ix4>,
    output_name: &str,
) -> Result<Vec<f32>, ModelError> {
    let mut session = session
        .lock()
        .map_err(|e| ModelError::Runtime(format!("session mutex poisoned: {}", e)))?;

    let owned_buffer;
    let input_view = if input.view().is_standard_layout() {
        input.view()
    } else {
        owned_buffer = input.as_standard_layout().to_owned();
        owned_buffer.view()
    };

    let tensor_ref = TensorRef::from_array_view(input_view)
        .map_err(|e| ModelError::Inference(format!("failed to build tensor: {}", e)))?;

    let outputs = session
        .run(ort::inputs![tensor_ref])
        .map_err(|e| ModelError::Inference(e.to_string()))?;

    let (shape, data) = outputs[output_name]
        .try_extract_tensor::<f32>()
        .map_err(|e| ModelError::Output(e.to_string()))?;

    tracing::debug!(?shape, "Extracted model output");

    Ok(data.to_vec())
}

#[async_trait]
impl ModelService for OrtModelService {
    async fn predict(&self, input: Array<f32, Ix4>) -> Result<Vec<f32>, ModelError> {
        let (index, session) = self.next_session();
        let output_name = self.output_name.clone();
        tracing::debug!("Handling request with session {}", index);

        tokio::task::spawn_blocking(move || run_inference(&session, &input, &output_name))
            .await
            .map_err(|e| ModelError::Runtime(e.to_string()))?
    }
}
