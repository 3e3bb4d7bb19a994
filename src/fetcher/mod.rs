mod fetcher;
mod outcome;
pub mod http_fetcher;
pub mod mock_fetcher;

pub(crate) use fetcher::ensure_fetchable;
pub use fetcher::{FetchError, Fetcher};
pub use http_fetcher::HttpFetcher;
pub use mock_fetcher::{MockFetcher, MockResponse};
pub use outcome::FetchOutcome;
