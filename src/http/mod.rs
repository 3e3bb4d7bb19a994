pub(crate) mod request;
pub(crate) mod response;

pub use request::{RequestLimits, ScrapePayload, ScrapeRequest, MAX_PRODUCT_LIMIT, MAX_URL_LEN};
pub use response::{FieldValue, Fields, ScrapeResult, ScrapeStatus};
