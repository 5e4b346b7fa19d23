//! Import/export of library JSON.
//!
//! Two external shapes are understood:
//! - legacy: a bare array of flat book objects
//! - current: an object with `summary` and `details` keys
//!
//! Imports are always re-indexed before they are handed back. Exports are
//! the current shape, verbatim.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde_json::Value;

use super::store::StoreError;
use crate::domain::legacy::{self, LegacyBook};
use crate::domain::{BookId, Library};

/// Shape of a raw JSON document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Bare array of legacy book records
    Legacy,

    /// Object carrying both `summary` and `details`
    Current,

    /// Anything else
    Unknown,
}

impl Shape {
    /// Classify a raw JSON value
    pub fn of(raw: &Value) -> Self {
        match raw {
            Value::Array(_) => Shape::Legacy,
            Value::Object(map) if map.contains_key("summary") && map.contains_key("details") => {
                Shape::Current
            }
            _ => Shape::Unknown,
        }
    }
}

/// A library decoded from storage
#[derive(Debug, Clone)]
pub struct Decoded {
    pub library: Library,

    /// True when the stored data was in the legacy shape and was migrated
    pub migrated: bool,
}

/// Decode data returned by a gateway.
///
/// Legacy arrays go through positional migration; objects are accepted as
/// they are (missing keys default to empty, loose ids are normalized) and
/// are not re-indexed.
pub fn decode_stored(mut raw: Value) -> Result<Decoded, StoreError> {
    normalize_summary_ids(&mut raw);

    match raw {
        Value::Array(values) => {
            let records = legacy::parse_records(values).map_err(invalid)?;
            Ok(Decoded {
                library: legacy::migrate(records),
                migrated: true,
            })
        }
        Value::Object(_) => Ok(Decoded {
            library: serde_json::from_value(raw).map_err(invalid)?,
            migrated: false,
        }),
        other => Err(StoreError::InvalidFormat(format!(
            "stored library is a JSON {}",
            kind(&other)
        ))),
    }
}

/// Normalize an imported document into a re-indexed library
pub fn import_value(mut raw: Value) -> Result<Library, StoreError> {
    normalize_summary_ids(&mut raw);
    let mut library = match (Shape::of(&raw), raw) {
        (Shape::Legacy, Value::Array(values)) => {
            from_legacy_with_own_ids(legacy::parse_records(values).map_err(invalid)?)
        }
        (Shape::Current, raw) => serde_json::from_value(raw).map_err(invalid)?,
        (_, raw) => {
            return Err(StoreError::InvalidFormat(format!(
                "expected an array of books or an object with summary and details, got a JSON {}",
                kind(&raw)
            )))
        }
    };

    library.reindex();
    Ok(library)
}

/// Parse and normalize an imported document
pub fn import_str(json: &str) -> Result<Library, StoreError> {
    let raw: Value = serde_json::from_str(json).map_err(invalid)?;
    import_value(raw)
}

/// Build a library from legacy records keyed by their own ids.
///
/// Records without a usable id, or repeating an id already taken by an
/// earlier record, receive a fresh id that no record claims. The result is
/// not re-indexed.
pub fn from_legacy_with_own_ids(records: Vec<LegacyBook>) -> Library {
    let claimed: BTreeSet<BookId> = records
        .iter()
        .filter_map(LegacyBook::provisional_id)
        .collect();
    let mut fresh = FreshIds::new(&claimed);
    let mut taken = BTreeSet::new();
    let mut library = Library::new();

    for record in records {
        let id = match record.provisional_id() {
            Some(id) if taken.insert(id) => id,
            _ => fresh.take(),
        };

        let (summary, detail) = record.into_pair(id);
        library.details.insert(id, detail);
        library.summary.push(summary);
    }

    library
}

/// Rewrite the summary ids of a current-format object as integers.
///
/// Ids written as strings are parsed. Rows with a missing or unusable id get
/// a fresh id that neither another row nor a detail key claims, so they
/// start without a detail record. Anything that is not a current-format
/// object is left for deserialization to reject.
fn normalize_summary_ids(raw: &mut Value) {
    let Some(map) = raw.as_object_mut() else {
        return;
    };

    let mut claimed: BTreeSet<BookId> = map
        .get("details")
        .and_then(Value::as_object)
        .map(|details| details.keys().filter_map(|key| key.parse().ok()).collect())
        .unwrap_or_default();

    let Some(rows) = map.get_mut("summary").and_then(Value::as_array_mut) else {
        return;
    };

    claimed.extend(
        rows.iter()
            .filter_map(|row| row.get("id"))
            .filter_map(legacy::loose_id),
    );
    let mut fresh = FreshIds::new(&claimed);

    for row in rows.iter_mut().filter_map(Value::as_object_mut) {
        let id = row
            .get("id")
            .and_then(legacy::loose_id)
            .unwrap_or_else(|| fresh.take());
        row.insert("id".to_string(), Value::from(id.get()));
    }
}

/// Hands out the smallest unclaimed ids, in increasing order. The counter
/// never passes the number of claims plus the ids handed out.
struct FreshIds<'a> {
    candidate: u32,
    claimed: &'a BTreeSet<BookId>,
}

impl<'a> FreshIds<'a> {
    fn new(claimed: &'a BTreeSet<BookId>) -> Self {
        Self {
            candidate: 1,
            claimed,
        }
    }

    fn take(&mut self) -> BookId {
        loop {
            let id = BookId::new(self.candidate);
            self.candidate = self.candidate.saturating_add(1);
            if !self.claimed.contains(&id) {
                return id;
            }
        }
    }
}

/// Serialize a library as pretty-printed current-format JSON
pub fn export_json(library: &Library) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(library)
}

/// File name for an export: `<library>_<YYYY-MM-DD>.json`
pub fn export_file_name(library_name: &str, date: NaiveDate) -> String {
    format!("{}_{}.json", library_name, date.format("%Y-%m-%d"))
}

fn invalid(err: serde_json::Error) -> StoreError {
    StoreError::InvalidFormat(err.to_string())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_classification() {
        assert_eq!(Shape::of(&json!([])), Shape::Legacy);
        assert_eq!(Shape::of(&json!({"summary": [], "details": {}})), Shape::Current);
        assert_eq!(Shape::of(&json!({"summary": []})), Shape::Unknown);
        assert_eq!(Shape::of(&json!("books")), Shape::Unknown);
    }

    #[test]
    fn test_import_legacy_single_book() {
        let library = import_value(json!([
            {"author": "A", "title": "T", "description": "D", "image": "x"}
        ]))
        .unwrap();

        assert_eq!(library.len(), 1);
        assert_eq!(library.summary[0].id, BookId::new(1));
        assert_eq!(library.summary[0].main_image, "x");
        assert_eq!(library.details[&BookId::new(1)].images, vec!["x".to_string()]);
    }

    #[test]
    fn test_import_legacy_uses_own_ids_before_reindex() {
        let library = from_legacy_with_own_ids(
            legacy::parse_records(vec![
                json!({"id": 5, "title": "Five", "comments": "c5"}),
                json!({"id": 2, "title": "Two", "comments": "c2"}),
            ])
            .unwrap(),
        );

        assert_eq!(library.summary[0].id, BookId::new(5));
        assert_eq!(library.details[&BookId::new(5)].comments, "c5");
        assert_eq!(library.details[&BookId::new(2)].comments, "c2");
    }

    #[test]
    fn test_import_legacy_duplicate_and_missing_ids_keep_their_details() {
        let library = import_value(json!([
            {"id": 3, "title": "First", "comments": "one"},
            {"id": 3, "title": "Second", "comments": "two"},
            {"title": "Third", "comments": "three"}
        ]))
        .unwrap();

        assert!(library.is_dense());
        assert_eq!(library.details[&BookId::new(1)].comments, "one");
        assert_eq!(library.details[&BookId::new(2)].comments, "two");
        assert_eq!(library.details[&BookId::new(3)].comments, "three");
    }

    #[test]
    fn test_import_legacy_at_the_id_ceiling() {
        let library = import_value(json!([
            {"id": u32::MAX, "title": "Last", "comments": "max"},
            {"title": "No id", "comments": "fresh"}
        ]))
        .unwrap();

        assert!(library.is_dense());
        assert_eq!(library.details[&BookId::new(1)].comments, "max");
        assert_eq!(library.details[&BookId::new(2)].comments, "fresh");
    }

    #[test]
    fn test_fresh_legacy_ids_avoid_later_explicit_ids() {
        let library = from_legacy_with_own_ids(
            legacy::parse_records(vec![
                json!({"title": "No id"}),
                json!({"id": 1, "title": "One"}),
            ])
            .unwrap(),
        );

        assert_eq!(library.summary[0].id, BookId::new(2));
        assert_eq!(library.summary[1].id, BookId::new(1));
    }

    #[test]
    fn test_import_current_format_with_missing_id() {
        let library = import_value(json!({
            "summary": [
                {"title": "No id"},
                {"id": 1, "title": "One"}
            ],
            "details": {
                "1": {"comments": "belongs to one"}
            }
        }))
        .unwrap();

        assert!(library.is_dense());
        assert_eq!(library.summary[0].title, "No id");
        assert!(!library.details.contains_key(&BookId::new(1)));
        assert_eq!(library.details[&BookId::new(2)].comments, "belongs to one");
    }

    #[test]
    fn test_import_current_format_with_string_id_keeps_detail() {
        let library = import_value(json!({
            "summary": [{"id": "7", "title": "Seven"}],
            "details": {"7": {"comments": "kept"}}
        }))
        .unwrap();

        assert_eq!(library.summary[0].id, BookId::new(1));
        assert_eq!(library.details[&BookId::new(1)].comments, "kept");
    }

    #[test]
    fn test_decode_stored_normalizes_loose_ids_without_reindexing() {
        let decoded = decode_stored(json!({
            "summary": [{"id": "5", "title": "Five"}, {"title": "No id"}],
            "details": {"5": {"comments": "five"}}
        }))
        .unwrap();

        let library = decoded.library;
        assert_eq!(library.summary[0].id, BookId::new(5));
        assert_eq!(library.summary[1].id, BookId::new(1));
        assert_eq!(library.details[&BookId::new(5)].comments, "five");
    }

    #[test]
    fn test_import_current_format_is_reindexed() {
        let library = import_value(json!({
            "summary": [
                {"id": 4, "author": "", "title": "B", "description": "", "mainImage": ""},
                {"id": 9, "author": "", "title": "A", "description": "", "mainImage": ""}
            ],
            "details": {
                "9": {"extendedDescription": "nine", "images": [], "additionalInfo": {}, "comments": ""}
            }
        }))
        .unwrap();

        assert!(library.is_dense());
        assert_eq!(library.summary[1].title, "A");
        assert_eq!(library.details[&BookId::new(2)].extended_description, "nine");
        assert!(!library.details.contains_key(&BookId::new(1)));
    }

    #[test]
    fn test_import_rejects_unknown_shapes() {
        for raw in [json!(42), json!({"books": []}), json!(null), json!("text")] {
            assert!(matches!(import_value(raw), Err(StoreError::InvalidFormat(_))));
        }
        assert!(matches!(import_str("{not json"), Err(StoreError::InvalidFormat(_))));
        assert!(matches!(
            import_value(json!({"summary": "nope", "details": {}})),
            Err(StoreError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_decode_stored_migrates_legacy() {
        let decoded = decode_stored(json!([{"title": "Old"}])).unwrap();
        assert!(decoded.migrated);
        assert_eq!(decoded.library.summary[0].id, BookId::new(1));

        let decoded = decode_stored(json!({"summary": [], "details": {}})).unwrap();
        assert!(!decoded.migrated);

        assert!(decode_stored(json!(true)).is_err());
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name("Poésie", date), "Poésie_2024-03-09.json");
    }
}
