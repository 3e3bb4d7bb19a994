use super::text::{collapse_whitespace, css, element_text, resolve_http_url, truncate_chars};
use crate::http::{FieldValue, Fields};
use scraper::{Html, Node};
use std::collections::HashSet;
use url::Url;

const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Fields produced when a scrape carries no rules: `title`, `description`,
/// `links`, `images` and `text`.
pub(crate) fn default_fields(document: &Html, base: &Url, text_limit: usize) -> Fields {
    let mut fields = Fields::new();
    fields.insert("title".to_string(), title(document));
    fields.insert("description".to_string(), description(document));
    fields.insert("links".to_string(), FieldValue::List(links(document, base)));
    fields.insert("images".to_string(), FieldValue::List(images(document, base)));
    fields.insert(
        "text".to_string(),
        FieldValue::Text(visible_text(document, text_limit)),
    );
    fields
}

fn title(document: &Html) -> FieldValue {
    ["title", "h1"]
        .into_iter()
        .find_map(|tag| {
            document
                .select(&css(tag))
                .map(|element| element_text(&element))
                .find(|text| !text.is_empty())
        })
        .map(FieldValue::Text)
        .unwrap_or(FieldValue::Missing)
}

fn description(document: &Html) -> FieldValue {
    [
        r#"meta[name="description"]"#,
        r#"meta[property="og:description"]"#,
    ]
    .into_iter()
    .find_map(|selector| {
        document
            .select(&css(selector))
            .filter_map(|element| element.value().attr("content"))
            .map(collapse_whitespace)
            .find(|text| !text.is_empty())
    })
    .map(FieldValue::Text)
    .unwrap_or(FieldValue::Missing)
}

pub(crate) fn links(document: &Html, base: &Url) -> Vec<String> {
    let anchors = css("a[href]");
    let hrefs = document
        .select(&anchors)
        .filter_map(|element| element.value().attr("href"));
    unique_urls(base, hrefs)
}

fn images(document: &Html, base: &Url) -> Vec<String> {
    let imgs = css("img");
    let sources = document.select(&imgs).filter_map(|element| {
        let img = element.value();
        img.attr("src").or_else(|| img.attr("data-src"))
    });
    unique_urls(base, sources)
}

fn unique_urls<'a>(base: &Url, references: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    references
        .filter_map(|reference| resolve_http_url(base, reference))
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn visible_text(document: &Html, limit: usize) -> String {
    let Some(body) = document.select(&css("body")).next() else {
        return String::new();
    };

    let mut pieces = Vec::new();
    for node in body.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|element| HIDDEN_ELEMENTS.contains(&element.name()))
                .unwrap_or(false)
        });
        if !hidden {
            pieces.push(&**text);
        }
    }

    truncate_chars(&collapse_whitespace(&pieces.join(" ")), limit)
}
