//! Source descriptors and their location templates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;
use crate::models::Fields;

/// Page size used when a caller asks for a page of size 0.
pub const BATCH_SIZE: usize = 25;

const OFFSET_PLACEHOLDER: &str = "%offset%";
const SIZE_PLACEHOLDER: &str = "%size%";
const KEY_PLACEHOLDER: &str = "%key%";

/// HTTP method used to replay an activity to its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateMethod {
    #[default]
    Get,
    Post,
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMethod::Get => f.write_str("GET"),
            UpdateMethod::Post => f.write_str("POST"),
        }
    }
}

/// One configured remote source.
///
/// The name doubles as the store namespace. `id_field` names the imported
/// field whose value becomes the item key.
///
/// # Examples
///
/// ```
/// use eventhub_core::source::SourceDescriptor;
///
/// let source = SourceDescriptor::new(
///     "members",
///     "field_qrcode",
///     "https://example.com/sample?offset=%offset%&limit=%size%",
///     "https://example.com/sample/%key%",
/// );
/// assert_eq!(
///     source.fetching_url(0, 0),
///     "https://example.com/sample?offset=0&limit=25"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub id_field: String,
    pub fetching_url: String,
    #[serde(default)]
    pub update_url: String,
    #[serde(default)]
    pub update_method: UpdateMethod,
}

impl SourceDescriptor {
    pub fn new(
        name: impl Into<String>,
        id_field: impl Into<String>,
        fetching_url: impl Into<String>,
        update_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id_field: id_field.into(),
            fetching_url: fetching_url.into(),
            update_url: update_url.into(),
            update_method: UpdateMethod::default(),
        }
    }

    pub fn with_update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = method;
        self
    }

    /// Location of the page starting at `offset`.
    ///
    /// A `size` of 0 falls back to [`BATCH_SIZE`]. Offsets are substituted
    /// verbatim, negative values included.
    pub fn fetching_url(&self, offset: i64, size: usize) -> String {
        let size = if size == 0 { BATCH_SIZE } else { size };
        self.fetching_url
            .replace(OFFSET_PLACEHOLDER, &offset.to_string())
            .replace(SIZE_PLACEHOLDER, &size.to_string())
    }

    /// Location used to replay an activity for `key`.
    ///
    /// `params` are merged into the template's query string; a parameter
    /// already present in the template is replaced. The resulting query is
    /// encoded in key order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the substituted template is not a valid URL.
    pub fn update_url(&self, key: &str, params: &Fields) -> Result<Url, AppError> {
        let raw = self.update_url.replace(KEY_PLACEHOLDER, key);
        let mut url =
            Url::parse(&raw).map_err(|e| AppError::InvalidUrl(format!("{}: {}", raw, e)))?;

        let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in url.query_pairs() {
            query
                .entry(name.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        for (name, value) in params {
            query.insert(name.clone(), vec![value.clone()]);
        }

        if query.is_empty() {
            url.set_query(None);
        } else {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (name, values) in &query {
                for value in values {
                    pairs.append_pair(name, value);
                }
            }
        }

        Ok(url)
    }

    /// Checks that the update template yields a URL once a key is substituted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the template is blank or does not parse.
    pub fn check_update_url(&self) -> Result<(), AppError> {
        if self.update_url.trim().is_empty() {
            return Err(AppError::InvalidUrl(format!(
                "source {} has no update_url",
                self.name
            )));
        }
        self.update_url("key", &Fields::new()).map(|_| ())
    }
}
