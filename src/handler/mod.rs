mod scrape_handler;
mod stages;


pub use scrape_handler::{ScrapeHandler, ScrapeReply, SiteAnalysis};
pub use stages::{Stage, StageTracker};
