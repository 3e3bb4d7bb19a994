use super::defaults::default_fields;
use super::products::extract_products;
use super::text::{collapse_whitespace, element_text, resolve_http_url};
use crate::fetcher::FetchOutcome;
use crate::http::{FieldValue, Fields};
use crate::parser::analyzer::{analyze_document, SiteSignals};
use crate::parser::rules::PRODUCTS_FIELD;
use crate::parser::{ExtractError, ExtractionPlan, ExtractionRule, Extractor, NodeTarget, RuleKind};
use log::{debug, trace};
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub const DEFAULT_TEXT_LIMIT: usize = 5000;

const ACCEPTED_CONTENT_TYPES: [&str; 5] = [
    "text/html",
    "application/xhtml+xml",
    "text/xml",
    "application/xml",
    "text/plain",
];

/// Attributes holding URLs, resolved against the final URL when extracted.
const URL_ATTRIBUTES: [&str; 4] = ["href", "src", "data-src", "action"];

/// Extracts fields from HTML (or XML / plain text) responses.
///
/// Every call parses the body afresh, so identical content and rules always
/// give identical fields.
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    text_limit: usize,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self {
            text_limit: DEFAULT_TEXT_LIMIT,
        }
    }

    pub fn with_text_limit(mut self, text_limit: usize) -> Self {
        self.text_limit = text_limit;
        self
    }

    fn decode_body<'a>(&self, outcome: &'a FetchOutcome) -> Result<&'a str, ExtractError> {
        if let Some(content_type) = &outcome.content_type {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !essence.is_empty() && !ACCEPTED_CONTENT_TYPES.contains(&essence.as_str()) {
                return Err(ExtractError::UnsupportedContentType(essence));
            }
        }

        std::str::from_utf8(&outcome.body).map_err(|e| {
            ExtractError::ParseError(format!(
                "body of {} is not valid UTF-8: {e}",
                outcome.final_url
            ))
        })
    }

    fn apply_rule(
        &self,
        document: &Html,
        body: &str,
        base: &Url,
        field: &str,
        rule: &ExtractionRule,
    ) -> Result<FieldValue, ExtractError> {
        let values: Vec<String> = match &rule.kind {
            RuleKind::CssSelector { selector, target } | RuleKind::XPath { selector, target, .. } => {
                let selector = Selector::parse(selector).map_err(|e| {
                    ExtractError::RuleApplication(format!("field '{field}': {e}"))
                })?;
                let mut values = document
                    .select(&selector)
                    .filter_map(|element| node_value(&element, target, base))
                    .filter(|value| !value.is_empty());
                if rule.all {
                    values.collect()
                } else {
                    values.next().into_iter().collect()
                }
            }
            RuleKind::Regex { pattern } => {
                let mut values = pattern.captures_iter(body).filter_map(|captures| {
                    captures
                        .get(1)
                        .or_else(|| captures.get(0))
                        .map(|m| m.as_str().to_string())
                        .filter(|value| !value.is_empty())
                });
                if rule.all {
                    values.collect()
                } else {
                    values.next().into_iter().collect()
                }
            }
        };

        trace!("Field '{}' matched {} value(s)", field, values.len());

        Ok(if rule.all {
            FieldValue::List(values)
        } else {
            values
                .into_iter()
                .next()
                .map(FieldValue::Text)
                .unwrap_or(FieldValue::Missing)
        })
    }
}

fn node_value(element: &ElementRef<'_>, target: &NodeTarget, base: &Url) -> Option<String> {
    match target {
        NodeTarget::Text => Some(element_text(element)),
        NodeTarget::OwnText => {
            let own: String = element
                .children()
                .filter_map(|node| node.value().as_text())
                .map(|text| &**text)
                .collect();
            Some(collapse_whitespace(&own))
        }
        NodeTarget::Attr(name) => {
            let value = element.value().attr(name)?.trim();
            if URL_ATTRIBUTES.contains(&name.as_str()) {
                if let Some(url) = resolve_http_url(base, value) {
                    return Some(url.to_string());
                }
            }
            Some(value.to_string())
        }
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, outcome: &FetchOutcome, plan: &ExtractionPlan) -> Result<Fields, ExtractError> {
        let body = self.decode_body(outcome)?;
        let document = Html::parse_document(body);
        let base = &outcome.final_url;

        let mut fields = if plan.rules.is_empty() {
            default_fields(&document, base, self.text_limit)
        } else {
            plan.rules
                .iter()
                .map(|(field, rule)| {
                    let value = self.apply_rule(&document, body, base, field, rule)?;
                    Ok::<_, ExtractError>((field.to_string(), value))
                })
                .collect::<Result<Fields, ExtractError>>()?
        };

        if let Some(limit) = plan.product_limit {
            let products = extract_products(&document, base, limit);
            debug!("Found {} products on {}", products.len(), base);
            fields.insert(
                PRODUCTS_FIELD.to_string(),
                FieldValue::Records(products.into_iter().map(|p| p.into_record()).collect()),
            );
        }

        Ok(fields)
    }

    fn analyze(&self, outcome: &FetchOutcome) -> Result<SiteSignals, ExtractError> {
        let body = self.decode_body(outcome)?;
        let document = Html::parse_document(body);
        Ok(analyze_document(&document, &outcome.final_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{RawRule, RuleSet};
    use serde_json::json;
    use std::collections::BTreeMap;

    const PAGE: &str = r#"<html>
      <head><title>Catalog</title></head>
      <body>
        <div id="main">
          <h2 class="headline"> Spring   sale </h2>
          <ul>
            <li class="item"><a href="/p/1" data-price="10">First</a></li>
            <li class="item"><a href="/p/2" data-price="20">Second</a></li>
            <li class="item"><a href="https://cdn.example.net/p/3">Third</a></li>
          </ul>
          <p>Order SKU-1001 or SKU-1002 today.</p>
        </div>
      </body>
    </html>"#;

    fn outcome(body: &str) -> FetchOutcome {
        FetchOutcome::new(Url::parse("https://example.com/start").unwrap(), 200, body)
            .with_content_type("text/html; charset=utf-8")
            .with_final_url(Url::parse("https://example.com/catalog/").unwrap())
    }

    fn plan(rules: serde_json::Value, product_limit: Option<usize>) -> ExtractionPlan {
        let raw: BTreeMap<String, RawRule> = serde_json::from_value(rules).unwrap();
        ExtractionPlan::new(RuleSet::compile(&raw).unwrap(), product_limit).unwrap()
    }

    fn extract(rules: serde_json::Value) -> Fields {
        HtmlExtractor::new()
            .extract(&outcome(PAGE), &plan(rules, None))
            .unwrap()
    }

    #[test]
    fn test_css_rules() {
        let fields = extract(json!({
            "headline": "h2.headline",
            "names": {"css": "li.item a", "all": true},
            "prices": {"css": "li.item a", "attr": "data-price", "all": true},
            "first_link": {"css": "li.item a", "attr": "href"}
        }));

        assert_eq!(fields["headline"], FieldValue::Text("Spring sale".to_string()));
        assert_eq!(
            fields["names"],
            FieldValue::List(vec!["First".into(), "Second".into(), "Third".into()])
        );
        assert_eq!(fields["prices"], FieldValue::List(vec!["10".into(), "20".into()]));
        assert_eq!(
            fields["first_link"],
            FieldValue::Text("https://example.com/p/1".to_string())
        );
    }

    #[test]
    fn test_xpath_rules() {
        let fields = extract(json!({
            "headline": {"xpath": "//div[@id='main']/h2/text()"},
            "links": {"xpath": "//ul/li/a/@href", "all": true},
            "second": {"xpath": "//ul/li[2]/a"}
        }));

        assert_eq!(fields["headline"], FieldValue::Text("Spring sale".to_string()));
        assert_eq!(
            fields["links"],
            FieldValue::List(vec![
                "https://example.com/p/1".into(),
                "https://example.com/p/2".into(),
                "https://cdn.example.net/p/3".into(),
            ])
        );
        assert_eq!(fields["second"], FieldValue::Text("Second".to_string()));
    }

    #[test]
    fn test_regex_rules() {
        let fields = extract(json!({
            "sku": {"regex": "SKU-(\\d+)"},
            "skus": {"regex": "SKU-(\\d+)", "all": true},
            "whole": {"regex": "SKU-\\d+"}
        }));

        assert_eq!(fields["sku"], FieldValue::Text("1001".to_string()));
        assert_eq!(
            fields["skus"],
            FieldValue::List(vec!["1001".into(), "1002".into()])
        );
        assert_eq!(fields["whole"], FieldValue::Text("SKU-1001".to_string()));
    }

    #[test]
    fn test_regex_skips_empty_matches() {
        let page = outcome("<p>price: n/a</p><p>price: 42</p>");
        let fields = HtmlExtractor::new()
            .extract(
                &page,
                &plan(
                    json!({
                        "price": {"regex": "price: (\\d*)"},
                        "digits": {"regex": "\\d*", "all": true}
                    }),
                    None,
                ),
            )
            .unwrap();

        assert_eq!(fields["price"], FieldValue::Text("42".to_string()));
        assert_eq!(fields["digits"], FieldValue::List(vec!["42".into()]));
    }

    #[test]
    fn test_xpath_text_selects_own_text_nodes() {
        let page = outcome("<div><p>Hello <b>world</b></p></div>");
        let fields = HtmlExtractor::new()
            .extract(
                &page,
                &plan(
                    json!({
                        "own": {"xpath": "//p/text()"},
                        "full": {"xpath": "//p"},
                        "nested": {"xpath": "//div/text()"}
                    }),
                    None,
                ),
            )
            .unwrap();

        assert_eq!(fields["own"], FieldValue::Text("Hello".to_string()));
        assert_eq!(fields["full"], FieldValue::Text("Hello world".to_string()));
        assert_eq!(fields["nested"], FieldValue::Missing);
    }

    #[test]
    fn test_unmatched_rules() {
        let fields = extract(json!({
            "missing": ".does-not-exist",
            "none": {"css": ".does-not-exist", "all": true}
        }));

        assert_eq!(fields["missing"], FieldValue::Missing);
        assert_eq!(fields["none"], FieldValue::List(vec![]));
        assert!(fields.values().all(FieldValue::is_empty));
    }

    #[test]
    fn test_default_fields_without_rules() {
        let fields = extract(json!({}));

        assert_eq!(fields["title"], FieldValue::Text("Catalog".to_string()));
        assert_eq!(fields["links"].as_list().unwrap().len(), 3);
        assert!(fields.contains_key("text"));
        assert!(!fields.contains_key(PRODUCTS_FIELD));
    }

    #[test]
    fn test_products_field() {
        let fields = HtmlExtractor::new()
            .extract(&outcome(PAGE), &plan(json!({"headline": "h2"}), Some(2)))
            .unwrap();

        let FieldValue::Records(products) = &fields[PRODUCTS_FIELD] else {
            panic!("products should be records");
        };
        assert!(products.len() <= 2);
        assert!(fields.contains_key("headline"));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let rules = json!({"names": {"css": "li a", "all": true}, "sku": {"regex": "SKU-(\\d+)"}});
        let first = serde_json::to_string(&extract(rules.clone())).unwrap();
        let second = serde_json::to_string(&extract(rules)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_content_types() {
        let extractor = HtmlExtractor::new();
        let empty = ExtractionPlan::default();

        let png = outcome("\u{89}PNG").with_content_type("image/png");
        assert!(matches!(
            extractor.extract(&png, &empty),
            Err(ExtractError::UnsupportedContentType(t)) if t == "image/png"
        ));

        let mut undeclared = outcome("<p>hi</p>");
        undeclared.content_type = None;
        assert!(extractor.extract(&undeclared, &empty).is_ok());

        let plain = outcome("just text").with_content_type("Text/Plain");
        assert!(extractor.extract(&plain, &empty).is_ok());
    }

    #[test]
    fn test_undecodable_body() {
        let mut binary = outcome("");
        binary.body = vec![0xff, 0xfe, 0x00, 0x80];

        assert!(matches!(
            HtmlExtractor::new().extract(&binary, &ExtractionPlan::default()),
            Err(ExtractError::ParseError(_))
        ));
    }

    #[test]
    fn test_malformed_markup() {
        let broken = outcome("<div><p>unterminated <b>bold <a href='/x'>x</div></td>");
        let fields = HtmlExtractor::new()
            .extract(&broken, &plan(json!({"link": {"css": "a", "attr": "href"}}), None))
            .unwrap();

        assert_eq!(fields["link"], FieldValue::Text("https://example.com/x".to_string()));
    }

    #[test]
    fn test_text_limit() {
        let fields = HtmlExtractor::new()
            .with_text_limit(5)
            .extract(&outcome("<body>abcdefghij</body>"), &ExtractionPlan::default())
            .unwrap();
        assert_eq!(fields["text"], FieldValue::Text("abcde".to_string()));
    }
}
