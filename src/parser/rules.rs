use super::xpath;
use regex::{Regex, RegexBuilder};
use scraper::Selector;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub const MAX_RULES: usize = 32;
pub const MAX_FIELD_NAME_LEN: usize = 64;
pub const PRODUCTS_FIELD: &str = "products";
const REGEX_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error("too many rules ({0}, at most {max})", max = MAX_RULES)]
    TooMany(usize),

    #[error("invalid field name '{0}'")]
    InvalidFieldName(String),

    #[error("field '{0}' must set exactly one of css, xpath or regex")]
    AmbiguousKind(String),

    #[error("field '{field}': invalid CSS selector '{selector}': {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    #[error("field '{field}': unsupported XPath '{expression}': {reason}")]
    InvalidXPath {
        field: String,
        expression: String,
        reason: String,
    },

    #[error("field '{field}': invalid regex: {reason}")]
    InvalidRegex { field: String, reason: String },

    #[error("field '{0}': attr is only allowed with css rules")]
    MisplacedAttr(String),

    #[error("field '{name}' is reserved when product_limit is set", name = PRODUCTS_FIELD)]
    ReservedField,
}

/// Wire form of a rule: a bare CSS selector string or an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRule {
    Css(String),
    Spec(RuleSpec),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub css: Option<String>,
    pub xpath: Option<String>,
    pub regex: Option<String>,
    pub attr: Option<String>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTarget {
    Text,
    /// Direct text children only, as XPath `text()` selects them.
    OwnText,
    Attr(String),
}

#[derive(Debug, Clone)]
pub enum RuleKind {
    CssSelector {
        selector: String,
        target: NodeTarget,
    },
    XPath {
        expression: String,
        selector: String,
        target: NodeTarget,
    },
    Regex {
        pattern: Regex,
    },
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub kind: RuleKind,
    pub all: bool,
}

impl ExtractionRule {
    pub fn compile(field: &str, raw: &RawRule) -> Result<Self, RuleError> {
        let spec = match raw {
            RawRule::Css(selector) => RuleSpec {
                css: Some(selector.clone()),
                ..Default::default()
            },
            RawRule::Spec(spec) => spec.clone(),
        };

        let kind = match (spec.css, spec.xpath, spec.regex) {
            (Some(selector), None, None) => {
                let selector = selector.trim().to_string();
                check_selector(field, &selector)?;
                let target = match spec.attr {
                    Some(attr) => NodeTarget::Attr(attr.trim().to_string()),
                    None => NodeTarget::Text,
                };
                RuleKind::CssSelector { selector, target }
            }
            (None, Some(expression), None) => {
                if spec.attr.is_some() {
                    return Err(RuleError::MisplacedAttr(field.to_string()));
                }
                let query = xpath::translate(&expression).map_err(|reason| {
                    RuleError::InvalidXPath {
                        field: field.to_string(),
                        expression: expression.clone(),
                        reason,
                    }
                })?;
                check_selector(field, &query.selector)?;
                RuleKind::XPath {
                    expression,
                    selector: query.selector,
                    target: query.target,
                }
            }
            (None, None, Some(pattern)) => {
                if spec.attr.is_some() {
                    return Err(RuleError::MisplacedAttr(field.to_string()));
                }
                let pattern = RegexBuilder::new(&pattern)
                    .size_limit(REGEX_SIZE_LIMIT)
                    .build()
                    .map_err(|e| RuleError::InvalidRegex {
                        field: field.to_string(),
                        reason: e.to_string(),
                    })?;
                RuleKind::Regex { pattern }
            }
            _ => return Err(RuleError::AmbiguousKind(field.to_string())),
        };

        Ok(Self {
            kind,
            all: spec.all,
        })
    }
}

fn check_selector(field: &str, selector: &str) -> Result<(), RuleError> {
    if selector.is_empty() {
        return Err(RuleError::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
            reason: "empty selector".to_string(),
        });
    }
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| RuleError::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
            reason: e.to_string(),
        })
}

fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_FIELD_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Validated rules keyed by field name, in name order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<(String, ExtractionRule)>,
}

impl RuleSet {
    pub fn compile(raw: &BTreeMap<String, RawRule>) -> Result<Self, RuleError> {
        if raw.len() > MAX_RULES {
            return Err(RuleError::TooMany(raw.len()));
        }

        let rules = raw
            .iter()
            .map(|(field, rule)| {
                if !is_valid_field_name(field) {
                    return Err(RuleError::InvalidFieldName(field.clone()));
                }
                Ok((field.clone(), ExtractionRule::compile(field, rule)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.rules.iter().any(|(name, _)| name == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExtractionRule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }
}

/// Everything the extractor needs to know about one scrape.
#[derive(Debug, Clone, Default)]
pub struct ExtractionPlan {
    pub rules: RuleSet,
    pub product_limit: Option<usize>,
}

impl ExtractionPlan {
    pub fn new(rules: RuleSet, product_limit: Option<usize>) -> Result<Self, RuleError> {
        if product_limit.is_some() && rules.contains(PRODUCTS_FIELD) {
            return Err(RuleError::ReservedField);
        }
        Ok(Self {
            rules,
            product_limit,
        })
    }
}
