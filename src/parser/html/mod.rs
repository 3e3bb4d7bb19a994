mod defaults;
mod html_parser;
pub(crate) mod products;
pub(crate) mod text;

pub use html_parser::{HtmlExtractor, DEFAULT_TEXT_LIMIT};
pub use products::Product;
