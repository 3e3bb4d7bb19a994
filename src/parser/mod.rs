pub mod analyzer;
mod base;
pub mod html;
pub mod rules;
mod xpath;

pub use analyzer::SiteSignals;
pub use base::{ExtractError, Extractor};
pub use html::HtmlExtractor;
pub use rules::{ExtractionPlan, ExtractionRule, NodeTarget, RawRule, RuleError, RuleKind, RuleSet};
