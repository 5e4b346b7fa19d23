//! Legacy flat-array format and its migration to the summary/details shape.
//!
//! Older libraries were stored as a bare JSON array of books, each with an
//! optional single `image`. Migration assigns ids by array position.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::book::{AdditionalInfo, BookDetail, BookId, BookSummary};
use super::library::Library;

/// One book record in the legacy format
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyBook {
    /// Identifier as written by older exports; may be missing or a string
    #[serde(default)]
    pub id: Option<Value>,

    #[serde(default, deserialize_with = "falsy_string")]
    pub author: String,

    #[serde(default, deserialize_with = "falsy_string")]
    pub title: String,

    #[serde(default, deserialize_with = "falsy_string")]
    pub description: String,

    #[serde(default, deserialize_with = "falsy_string")]
    pub image: String,

    #[serde(default, deserialize_with = "falsy_string")]
    pub comments: String,
}

impl LegacyBook {
    /// The record's own id, when it is a positive integer (or a string
    /// holding one)
    pub fn provisional_id(&self) -> Option<BookId> {
        self.id.as_ref().and_then(loose_id)
    }

    /// Split into a summary/detail pair under `id`.
    ///
    /// The legacy image becomes both the main image and the sole gallery
    /// entry.
    pub fn into_pair(self, id: BookId) -> (BookSummary, BookDetail) {
        let images = if self.image.is_empty() {
            Vec::new()
        } else {
            vec![self.image.clone()]
        };

        let summary = BookSummary {
            id,
            author: self.author,
            title: self.title,
            description: self.description,
            main_image: self.image,
        };

        let detail = BookDetail {
            extended_description: String::new(),
            images,
            additional_info: AdditionalInfo::default(),
            comments: self.comments,
        };

        (summary, detail)
    }
}

/// Migrate a legacy array into a library, numbering entries `1..=n` by
/// position. Only call this on data already known to be a legacy array.
pub fn migrate(records: Vec<LegacyBook>) -> Library {
    let mut library = Library::new();

    for (index, record) in records.into_iter().enumerate() {
        let (summary, detail) = record.into_pair(BookId::from_position(index));
        library.details.insert(summary.id, detail);
        library.summary.push(summary);
    }

    library
}

/// Read an id written as a positive integer or a string holding one
pub fn loose_id(value: &Value) -> Option<BookId> {
    let raw = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };

    u32::try_from(raw)
        .ok()
        .filter(|raw| *raw > 0)
        .map(BookId::new)
}

/// Parse the elements of a legacy array
pub fn parse_records(values: Vec<Value>) -> Result<Vec<LegacyBook>, serde_json::Error> {
    values.into_iter().map(serde_json::from_value).collect()
}

/// Legacy files used JavaScript truthiness: `null`, `false`, `0` and
/// missing values meant "empty". Other numbers are kept as text.
fn falsy_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}
