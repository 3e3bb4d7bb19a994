//! HTTP surface of the service.
//!
//! `AppState` owns everything shared across requests: the configuration, the
//! pooled HTTP client behind the fetcher and the statistics. It is built once
//! at startup and cloned cheaply into every handler.

mod csv;
mod routes;

#[cfg(test)]
mod tests;

use crate::core::ServiceConfig;
use crate::fetcher::http_fetcher::HttpFetcherError;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::handler::ScrapeHandler;
use crate::stats::StatsTracker;
use log::info;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use routes::router;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub handler: ScrapeHandler,
}

impl AppState {
    /// Builds the shared HTTP client and the handler around it.
    pub fn initialize(config: ServiceConfig) -> Result<Self, HttpFetcherError> {
        let fetcher = HttpFetcher::from_config(&config)?;
        info!(
            "HTTP client ready (redirect limit {}, {} user agents)",
            config.max_redirects,
            config.user_agents.len()
        );
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    pub fn with_fetcher(config: ServiceConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let handler = ScrapeHandler::new(fetcher, &config, StatsTracker::new());
        Self {
            config: Arc::new(config),
            handler,
        }
    }

    pub fn stats(&self) -> &StatsTracker {
        self.handler.stats()
    }

    pub fn shutdown(&self) {
        self.stats().log_summary();
        info!("Shutdown complete");
    }
}

/// Binds the configured address and serves until `shutdown` resolves.
pub async fn serve<F>(state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(state.config.bind_addr()).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
