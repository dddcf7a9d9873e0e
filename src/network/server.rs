use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Configuration;
use crate::error::AppError;
use crate::network::routes::{router, AppState};
use crate::pipeline::ColorAnalysisService;

pub struct Server {
    address: String,
    port: u16,
    router: Router,
}

impl Server {
    pub fn new(configuration: &Configuration, analysis: ColorAnalysisService) -> Self {
        Self {
            address: configuration.bind_address(),
            port: configuration.port,
            router: router(AppState::new(analysis, configuration)),
        }
    }

    pub async fn start(self) -> Result<(), AppError> {
        info!("Starting HTTP server on {}", self.address);
        let listener = TcpListener::bind(&self.address)
            .await
            .map_err(|e| AppError::Bind(e, self.port))?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until Ctrl-C.
    pub async fn serve(self, listener: TcpListener) -> Result<(), AppError> {
        if let Ok(address) = listener.local_addr() {
            info!("Listening on {}", address);
        }
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(AppError::Serve)?;
        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
