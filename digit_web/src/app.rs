use crate::{
    config::Config,
    server::{build_router, HttpServer, SharedState},
    telemetry::Metrics,
};
use anyhow::Context;
use digit_recognition::{
    config::Validatable, DigitLabels, DigitRecognizer, ModelService, OrtModelService,
};
use std::sync::Arc;
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let model_service: Arc<dyn ModelService> = match OrtModelService::new(&config.model) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("Failed to initialize model service: {:?}", e);
            return Err(e.into());
        }
    };

    let labels = match &config.labels {
        Some(labels_config) => {
            let path = labels_config.get_path();
            DigitLabels::from_file(&path)
                .with_context(|| format!("failed to load labels from {:?}", path))?
        }
        None => DigitLabels::mnist(),
    };

    let recognizer = DigitRecognizer::new(
        config.model.preprocessor(),
        model_service,
        config.classifier.classifier()?,
        labels,
    );

    let state = SharedState {
        recognizer: Arc::new(recognizer),
        metrics: Arc::new(Metrics::new()?),
        model_card: config.model_card.clone(),
    };

    let router = build_router(state, config.server.max_body_bytes);
    let server = HttpServer::new(router, &config.server.get_address()).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe())?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
