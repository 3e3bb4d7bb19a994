use crate::http::{FieldValue, Fields, ScrapeResult};
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::convert::Infallible;

const HEADER: &str = "field,value\r\n";

/// Flattens fields into `(field, value)` rows: one row per list entry and
/// `products[i].key` rows for records.
pub(crate) fn rows(fields: &Fields) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    for (name, value) in fields {
        match value {
            FieldValue::Missing => rows.push((name.clone(), String::new())),
            FieldValue::Text(text) => rows.push((name.clone(), text.clone())),
            FieldValue::List(values) => {
                rows.extend(values.iter().map(|v| (name.clone(), v.clone())));
            }
            FieldValue::Records(records) => {
                for (index, record) in records.iter().enumerate() {
                    rows.extend(
                        record
                            .iter()
                            .map(|(key, v)| (format!("{name}[{index}].{key}"), v.clone())),
                    );
                }
            }
        }
    }
    rows
}

/// Quotes a cell when it holds a separator, quote or line break.
fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn line(field: &str, value: &str) -> String {
    format!("{},{}\r\n", escape(field), escape(value))
}

/// Streams a successful result as a CSV attachment.
pub(crate) fn csv_response(result: &ScrapeResult) -> Response {
    let mut lines = vec![HEADER.to_string()];
    if let Some(fields) = &result.fields {
        lines.extend(rows(fields).iter().map(|(field, value)| line(field, value)));
    }

    let filename = format!("scraped_{}.csv", result.timestamp.format("%Y%m%d_%H%M%S"));
    let body = Body::from_stream(futures::stream::iter(
        lines.into_iter().map(Ok::<_, Infallible>),
    ));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
