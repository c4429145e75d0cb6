//! JSON-API style page envelopes.
//!
//! Sources answer with:
//! ```json
//! {
//!     "links": { "next": "https://..." },
//!     "data": [ { "field": "value" } ]
//! }
//! ```
//! `data` may also be a single object, or an empty value.

use eventhub_core::error::AppError;
use eventhub_core::models::Fields;
use serde_json::Value;

use crate::transport::Transport;

/// One decoded page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonApiPage {
    /// Location of the following page; empty on the last page.
    pub next: String,
    pub data: Vec<Fields>,
}

/// Fetches and decodes one page.
pub async fn fetch_page(transport: &dyn Transport, url: &str) -> Result<JsonApiPage, AppError> {
    let body = transport.get(url).await?;
    parse_page(&body)
}

/// Decodes a page envelope.
///
/// # Errors
///
/// Returns `AppError::SerializationError` for malformed JSON and
/// `AppError::DecodingError` when the `data` member is missing.
///
/// # Examples
///
/// ```
/// use eventhub_client::jsonapi::parse_page;
///
/// let page = parse_page(r#"{"links":{"next":""},"data":{"id":7,"name":"Ann"}}"#).unwrap();
/// assert!(page.next.is_empty());
/// assert_eq!(page.data[0]["id"], "7");
/// ```
pub fn parse_page(body: &str) -> Result<JsonApiPage, AppError> {
    let envelope: Value = serde_json::from_str(body)?;

    let next = envelope
        .pointer("/links/next")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let data = envelope
        .get("data")
        .ok_or_else(|| AppError::DecodingError("response has no data member".to_string()))?;

    let data = match data {
        Value::Array(values) => values.iter().filter_map(parse_record).collect(),
        Value::Object(_) => parse_record(data).into_iter().collect(),
        _ => Vec::new(),
    };

    Ok(JsonApiPage { next, data })
}

/// Empty objects and non-objects yield no record.
fn parse_record(value: &Value) -> Option<Fields> {
    let object = value.as_object()?;
    if object.is_empty() {
        return None;
    }
    Some(
        object
            .iter()
            .map(|(name, value)| (name.clone(), stringify(value)))
            .collect(),
    )
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}
