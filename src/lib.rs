pub mod api;
pub mod core;
pub mod fetcher;
pub mod handler;
pub mod http;
pub mod parser;
pub mod stats;

pub use api::{router, AppState};
pub use core::{ErrorCode, ScrapeError, ScrapeOutcome, ServiceConfig};
pub use fetcher::{FetchError, FetchOutcome, Fetcher, HttpFetcher};
pub use handler::{ScrapeHandler, ScrapeReply};
pub use http::{FieldValue, Fields, ScrapePayload, ScrapeResult};
pub use parser::{Extractor, HtmlExtractor};
pub use stats::StatsTracker;
