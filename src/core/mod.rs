pub mod config;
mod errors;
pub mod retry;

pub use config::{ConfigError, ServiceConfig};
pub use errors::{ErrorCode, ScrapeError, ScrapeOutcome};
