use super::html::products::extract_products;
use super::html::text::css;
use scraper::Html;
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

const ECOMMERCE_KEYWORDS: [&str; 7] = ["cart", "shop", "product", "price", "buy", "sale", "discount"];
const FRAMEWORK_MARKERS: [&str; 3] = ["react", "vue", "angular"];
const SAMPLE_PRODUCTS: usize = 3;

/// What a single page says about the site behind it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteSignals {
    pub is_dynamic: bool,
    pub is_ecommerce: bool,
    pub detected_patterns: Vec<String>,
    pub recommended_method: &'static str,
    pub sample_products: Vec<BTreeMap<String, String>>,
}

pub(crate) fn analyze_document(document: &Html, base: &Url) -> SiteSignals {
    let mut signals = SiteSignals::default();

    let products = extract_products(document, base, SAMPLE_PRODUCTS);
    let priced = products.iter().filter(|p| p.price.is_some()).count();
    if priced > 0 {
        signals.is_ecommerce = true;
        signals
            .detected_patterns
            .push(format!("{priced} products with prices found"));
        signals.sample_products = products.iter().cloned().map(|p| p.into_record()).collect();
    }
    if products.len() > 1 {
        signals
            .detected_patterns
            .push(format!("{} product-like items found", products.len()));
    }

    let classes: Vec<String> = document
        .select(&css("[class]"))
        .filter_map(|element| element.value().attr("class"))
        .map(str::to_lowercase)
        .collect();
    for keyword in ECOMMERCE_KEYWORDS {
        if classes.iter().any(|class| class.contains(keyword)) {
            signals
                .detected_patterns
                .push(format!("'{keyword}' pattern found"));
        }
    }

    signals.is_dynamic = document.select(&css("script")).any(|script| {
        let source = script.text().collect::<String>().to_lowercase();
        FRAMEWORK_MARKERS.iter().any(|marker| source.contains(marker))
    });
    if signals.is_dynamic {
        signals
            .detected_patterns
            .push("JavaScript framework detected".to_string());
    }

    signals.recommended_method = if signals.is_dynamic {
        "browser"
    } else {
        "static"
    };
    signals
}
