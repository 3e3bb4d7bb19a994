//! Heuristic product listing extraction.
//!
//! Candidate containers are searched with a fixed list of e-commerce
//! selectors, then by repeated `div` class names, and finally by the parents
//! of the first links on the page.

use super::text::{css, element_text, resolve_http_url, truncate_chars};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use url::Url;

const MAX_TITLE_CHARS: usize = 200;
const LINK_FALLBACK_SCAN: usize = 50;
const CONTAINER_KEYWORDS: [&str; 4] = ["product", "item", "card", "tile"];
const PRICE_ATTRIBUTES: [&str; 3] = ["data-price", "content", "value"];

/// Container selectors in priority order, each with the descendants a
/// container must hold to count.
const CONTAINER_QUERIES: &[(&str, &[&str])] = &[
    (r#"[class*="product"]"#, &["a"]),
    (r#"[class*="item"]"#, &["a"]),
    (r#"[class*="card"]"#, &["a"]),
    (r#"[class*="tile"]"#, &["a"]),
    (r#"[class*="grid"] > div"#, &["a"]),
    (r#"[class*="list"] > div"#, &["a"]),
    ("article", &[]),
    (r#"li[class*="product"]"#, &[]),
    ("div[data-product]", &[]),
    (".product-item", &[]),
    (".product-card", &[]),
    (".product-tile", &[]),
    (".grid-item", &[]),
    (".collection-item", &[]),
    (".shop-item", &[]),
    ("div", &["a", "span"]),
    ("div", &["a", "p"]),
    ("section", &["a"]),
];

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    r#"[class*="title"]"#,
    r#"[class*="name"]"#,
    r#"[class*="heading"]"#,
    r#"[data-testid*="title"]"#,
    r#"[data-testid*="name"]"#,
];

const PRICE_SELECTORS: &[&str] = &[
    r#"[class*="price"]"#,
    r#"[class*="cost"]"#,
    r#"[class*="amount"]"#,
    r#"[data-testid*="price"]"#,
    "[data-price]",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Product {
    pub title: Option<String>,
    pub price: Option<String>,
    pub link: String,
    pub image: Option<String>,
}

impl Product {
    pub fn into_record(self) -> BTreeMap<String, String> {
        let mut record = BTreeMap::new();
        if let Some(title) = self.title {
            record.insert("title".to_string(), title);
        }
        if let Some(price) = self.price {
            record.insert("price".to_string(), price);
        }
        record.insert("link".to_string(), self.link);
        if let Some(image) = self.image {
            record.insert("image".to_string(), image);
        }
        record
    }

    fn same_listing(&self, other: &Product) -> bool {
        self.title == other.title && self.price == other.price
    }
}

pub(crate) fn extract_products(document: &Html, base: &Url, limit: usize) -> Vec<Product> {
    let mut products: Vec<Product> = Vec::new();

    for container in find_containers(document, limit)
        .into_iter()
        .take(limit.saturating_mul(2))
    {
        if products.len() >= limit {
            break;
        }
        if let Some(product) = product_from(container, base) {
            push_unique(&mut products, product);
        }
    }

    if products.len() < 3 {
        for link in document.select(&css("a[href]")).take(LINK_FALLBACK_SCAN) {
            if products.len() >= limit {
                break;
            }
            let href = link.value().attr("href").unwrap_or_default().to_lowercase();
            if ["#", "javascript:", "mailto:", "tel:"]
                .iter()
                .any(|skip| href.contains(skip))
            {
                continue;
            }
            let Some(parent) = link.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            if let Some(product) = product_from(parent, base) {
                push_unique(&mut products, product);
            }
        }
    }

    products.truncate(limit);
    products
}

fn push_unique(products: &mut Vec<Product>, product: Product) {
    if !products.iter().any(|seen| seen.same_listing(&product)) {
        products.push(product);
    }
}

fn find_containers(document: &Html, limit: usize) -> Vec<ElementRef<'_>> {
    for &(selector, required) in CONTAINER_QUERIES {
        let required: Vec<Selector> = required.iter().map(|&r| css(r)).collect();
        let containers: Vec<ElementRef<'_>> = document
            .select(&css(selector))
            .filter(|element| {
                required
                    .iter()
                    .all(|inner| element.select(inner).next().is_some())
            })
            .collect();
        if containers.len() >= 2 {
            return containers;
        }
    }

    repeated_div_classes(document, limit)
}

/// `div`s sharing a product-like class string at least three times.
fn repeated_div_classes(document: &Html, limit: usize) -> Vec<ElementRef<'_>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ElementRef<'_>>> = HashMap::new();

    for div in document.select(&css("div[class]")) {
        let classes = div.value().classes().collect::<Vec<_>>().join(" ");
        if classes.is_empty() {
            continue;
        }
        let group = groups.entry(classes.clone()).or_insert_with(|| {
            order.push(classes);
            Vec::new()
        });
        group.push(div);
    }

    order
        .into_iter()
        .find_map(|classes| {
            let lowered = classes.to_lowercase();
            let divs = groups.remove(&classes)?;
            (divs.len() >= 3 && CONTAINER_KEYWORDS.iter().any(|k| lowered.contains(k)))
                .then(|| divs.into_iter().take(limit).collect())
        })
        .unwrap_or_default()
}

fn product_from(container: ElementRef<'_>, base: &Url) -> Option<Product> {
    let title = product_title(container);
    let price = product_price(container);
    if title.is_none() && price.is_none() {
        return None;
    }

    let link = container
        .select(&css("a[href]"))
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| base.join(href).ok())
        .unwrap_or_else(|| base.clone());

    let image = container.select(&css("img")).next().and_then(|img| {
        let img = img.value();
        img.attr("src")
            .or_else(|| img.attr("data-src"))
            .and_then(|src| resolve_http_url(base, src))
    });

    Some(Product {
        title,
        price: price.map(|value| format!("${value:.2}")),
        link: link.to_string(),
        image: image.map(String::from),
    })
}

fn product_title(container: ElementRef<'_>) -> Option<String> {
    let substantial = |text: &String| text.chars().count() > 5;

    let from_selectors = TITLE_SELECTORS.iter().find_map(|&selector| {
        container
            .select(&css(selector))
            .next()
            .map(|element| element_text(&element))
            .filter(substantial)
    });
    if let Some(title) = from_selectors {
        return Some(truncate_chars(&title, MAX_TITLE_CHARS));
    }

    let from_link = container
        .select(&css("a"))
        .next()
        .map(|link| element_text(&link))
        .filter(substantial);
    if let Some(title) = from_link {
        return Some(truncate_chars(&title, MAX_TITLE_CHARS));
    }

    container
        .text()
        .map(str::trim)
        .find(|text| (11..MAX_TITLE_CHARS).contains(&text.chars().count()))
        .map(str::to_string)
}

fn product_price(container: ElementRef<'_>) -> Option<f64> {
    PRICE_SELECTORS.iter().find_map(|&selector| {
        let element = container.select(&css(selector)).next()?;
        clean_price(&element_text(&element)).or_else(|| {
            PRICE_ATTRIBUTES
                .iter()
                .filter_map(|attr| element.value().attr(attr))
                .find_map(clean_price)
        })
    })
}

fn price_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"[$₹£€]\s*[\d,]+\.?\d*",
            r"[\d,]+\.?\d*\s*[$₹£€]",
            r"(?i)Rs\.?\s*[\d,]+\.?\d*",
            r"(?i)USD\s*[\d,]+\.?\d*",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Positive amount found in `text`, ignoring currency symbols and thousands
/// separators.
pub(crate) fn clean_price(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if let Some(value) = positive_amount(&digits) {
        return Some(value);
    }

    price_patterns().iter().find_map(|pattern| {
        let matched = pattern.find(text)?.as_str();
        let digits: String = matched
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        positive_amount(&digits)
    })
}

fn positive_amount(digits: &str) -> Option<f64> {
    digits
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}
