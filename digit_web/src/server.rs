use crate::{config::ModelCardConfig, routes::api_routes, telemetry::Metrics};
use axum::{extract::DefaultBodyLimit, Router};
use digit_recognition::DigitRecognizer;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

#[derive(Clone)]
pub struct SharedState {
    pub recognizer: Arc<DigitRecognizer>,
    pub metrics: Arc<Metrics>,
    pub model_card: ModelCardConfig,
}

pub fn build_router(state: SharedState, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(router: Router, addr: &str) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub fn run(
        self,
        mut shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok(())
        });

        Ok(server_handle)
    }
}
