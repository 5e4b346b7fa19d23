//! Book records: the lightweight summary row and the extended detail record.
//!
//! Both records share a [`BookId`]. Field names follow the persisted JSON
//! shape (`mainImage`, `extendedDescription`, `additionalInfo`).

use serde::{Deserialize, Deserializer, Serialize};

/// Book identifier, unique within one library.
///
/// Identifiers are positive and dense (`1..=n`) right after a re-index;
/// in-place edits never change them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(u32);

impl BookId {
    /// Create an id from a raw value
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Id assigned to the entry at a 0-based display position
    pub fn from_position(index: usize) -> Self {
        Self(index as u32 + 1)
    }

    /// Get the raw value
    pub fn get(self) -> u32 {
        self.0
    }

    /// The following id, or `None` past `u32::MAX`
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BookId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Listing record for a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: BookId,

    #[serde(default, deserialize_with = "nullable_string")]
    pub author: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub title: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,

    /// Encoded image shown in listings; empty when the book has no picture
    #[serde(default, deserialize_with = "nullable_string")]
    pub main_image: String,
}

impl BookSummary {
    /// Blank summary for a freshly added entry
    pub fn blank(id: BookId) -> Self {
        Self {
            id,
            author: String::new(),
            title: String::new(),
            description: String::new(),
            main_image: String::new(),
        }
    }

    /// Whether a main image is set
    pub fn has_main_image(&self) -> bool {
        !self.main_image.is_empty()
    }

    /// Apply a partial update
    pub fn apply(&mut self, patch: SummaryPatch) {
        if let Some(author) = patch.author {
            self.author = author;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
    }

    /// Case-insensitive substring match over author, title and description.
    /// `needle` must already be lowercase.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.author.to_lowercase().contains(needle)
            || self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

/// Publication metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalInfo {
    #[serde(default, deserialize_with = "nullable_string")]
    pub publisher: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub year: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub isbn: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub pages: String,
}

/// Extended record for a book, keyed by the same id as its summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    #[serde(default, deserialize_with = "nullable_string")]
    pub extended_description: String,

    /// Gallery of data-URI encoded images, in display order
    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub additional_info: AdditionalInfo,

    #[serde(default, deserialize_with = "nullable_string")]
    pub comments: String,
}

impl BookDetail {
    /// Apply a partial update
    pub fn apply(&mut self, patch: DetailPatch) {
        if let Some(extended_description) = patch.extended_description {
            self.extended_description = extended_description;
        }
        if let Some(publisher) = patch.publisher {
            self.additional_info.publisher = publisher;
        }
        if let Some(year) = patch.year {
            self.additional_info.year = year;
        }
        if let Some(isbn) = patch.isbn {
            self.additional_info.isbn = isbn;
        }
        if let Some(pages) = patch.pages {
            self.additional_info.pages = pages;
        }
        if let Some(comments) = patch.comments {
            self.comments = comments;
        }
    }
}

/// Partial update for a [`BookSummary`]; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct SummaryPatch {
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl SummaryPatch {
    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.title.is_none() && self.description.is_none()
    }
}

/// Partial update for a [`BookDetail`]; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct DetailPatch {
    pub extended_description: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<String>,
    pub isbn: Option<String>,
    pub pages: Option<String>,
    pub comments: Option<String>,
}

impl DetailPatch {
    pub fn is_empty(&self) -> bool {
        self.extended_description.is_none()
            && self.publisher.is_none()
            && self.year.is_none()
            && self.isbn.is_none()
            && self.pages.is_none()
            && self.comments.is_none()
    }
}

/// Accept `null` wherever a string is expected and treat it as empty.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_uses_camel_case_keys() {
        let mut summary = BookSummary::blank(BookId::new(3));
        summary.main_image = "data:image/png;base64,AA==".to_string();

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["mainImage"], "data:image/png;base64,AA==");
        assert!(json.get("main_image").is_none());
    }

    #[test]
    fn test_detail_tolerates_missing_and_null_fields() {
        let detail: BookDetail =
            serde_json::from_str(r#"{"comments": null, "images": ["x"]}"#).unwrap();

        assert_eq!(detail.comments, "");
        assert_eq!(detail.extended_description, "");
        assert_eq!(detail.images, vec!["x".to_string()]);
        assert_eq!(detail.additional_info, AdditionalInfo::default());
    }

    #[test]
    fn test_summary_patch_leaves_unset_fields() {
        let mut summary = BookSummary::blank(BookId::new(1));
        summary.author = "Hugo".to_string();

        summary.apply(SummaryPatch {
            title: Some("Les Misérables".to_string()),
            ..Default::default()
        });

        assert_eq!(summary.author, "Hugo");
        assert_eq!(summary.title, "Les Misérables");
        assert_eq!(summary.description, "");
    }

    #[test]
    fn test_detail_patch_updates_additional_info() {
        let mut detail = BookDetail::default();
        detail.apply(DetailPatch {
            publisher: Some("Gallimard".to_string()),
            year: Some("1951".to_string()),
            ..Default::default()
        });

        assert_eq!(detail.additional_info.publisher, "Gallimard");
        assert_eq!(detail.additional_info.year, "1951");
        assert_eq!(detail.additional_info.isbn, "");
    }

    #[test]
    fn test_book_id_parse_and_display() {
        let id: BookId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(BookId::from_position(0), BookId::new(1));
        assert!("abc".parse::<BookId>().is_err());
    }

    #[test]
    fn test_book_id_next_stops_at_max() {
        assert_eq!(BookId::new(7).next(), Some(BookId::new(8)));
        assert_eq!(BookId::new(u32::MAX).next(), None);
    }
}
