//! The library aggregate: an ordered summary list plus a detail map.
//!
//! Display order is the order of `summary` (newest first). Details are
//! keyed by [`BookId`]; JSON object keys are strings on disk and are
//! converted to integers at deserialization time.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::book::{BookDetail, BookId, BookSummary};

/// One named collection of books
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Listing records in display order
    #[serde(default)]
    pub summary: Vec<BookSummary>,

    /// Extended records keyed by id
    #[serde(default)]
    pub details: BTreeMap<BookId, BookDetail>,
}

impl Library {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.summary.len()
    }

    /// Check if the library has no entries
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }

    /// Relabel every entry by its display position (`1..=n`).
    ///
    /// Each detail record moves from the entry's old id to its new id. An
    /// entry whose old id had no detail record ends up without one. Order is
    /// never changed. Returns the next free id (`n + 1`).
    pub fn reindex(&mut self) -> BookId {
        let mut summary = Vec::with_capacity(self.summary.len());
        let mut details = BTreeMap::new();

        for (index, entry) in self.summary.iter().enumerate() {
            let new_id = BookId::from_position(index);

            if let Some(detail) = self.details.get(&entry.id) {
                details.insert(new_id, detail.clone());
            }

            summary.push(BookSummary {
                id: new_id,
                ..entry.clone()
            });
        }

        self.summary = summary;
        self.details = details;

        BookId::from_position(self.summary.len())
    }

    /// Highest id in the summary list
    pub fn max_id(&self) -> Option<BookId> {
        self.summary.iter().map(|entry| entry.id).max()
    }

    /// Next id to allocate for a library that was just loaded; `None` when
    /// the highest id is `u32::MAX`
    pub fn next_free_id(&self) -> Option<BookId> {
        match self.max_id() {
            Some(max) => max.next(),
            None => Some(BookId::new(1)),
        }
    }

    /// Display position of an id
    pub fn position(&self, id: BookId) -> Option<usize> {
        self.summary.iter().position(|entry| entry.id == id)
    }

    /// Check if an id is present in the summary list
    pub fn contains(&self, id: BookId) -> bool {
        self.position(id).is_some()
    }

    /// Get a summary by id
    pub fn summary(&self, id: BookId) -> Option<&BookSummary> {
        self.summary.iter().find(|entry| entry.id == id)
    }

    /// Get a mutable summary by id
    pub fn summary_mut(&mut self, id: BookId) -> Option<&mut BookSummary> {
        self.summary.iter_mut().find(|entry| entry.id == id)
    }

    /// Get the detail record for an id, or an empty one if it is missing
    pub fn detail_or_default(&self, id: BookId) -> Cow<'_, BookDetail> {
        match self.details.get(&id) {
            Some(detail) => Cow::Borrowed(detail),
            None => Cow::Owned(BookDetail::default()),
        }
    }

    /// Get the detail record for an id, inserting an empty one if missing
    pub fn detail_entry(&mut self, id: BookId) -> &mut BookDetail {
        self.details.entry(id).or_default()
    }

    /// Insert an entry at the front of the display order
    pub fn prepend(&mut self, summary: BookSummary, detail: BookDetail) {
        self.details.insert(summary.id, detail);
        self.summary.insert(0, summary);
    }

    /// Remove an entry and its detail record
    pub fn remove(&mut self, id: BookId) -> Option<(BookSummary, Option<BookDetail>)> {
        let position = self.position(id)?;
        let summary = self.summary.remove(position);
        let detail = self.details.remove(&id);
        Some((summary, detail))
    }

    /// Search entries (case-insensitive substring over author, title and
    /// description). An empty or blank query matches everything.
    pub fn search(&self, query: &str) -> Vec<&BookSummary> {
        let needle = query.trim().to_lowercase();

        self.summary
            .iter()
            .filter(|entry| needle.is_empty() || entry.matches(&needle))
            .collect()
    }

    /// Ids present in the summary list without a detail record
    pub fn missing_details(&self) -> Vec<BookId> {
        self.summary
            .iter()
            .map(|entry| entry.id)
            .filter(|id| !self.details.contains_key(id))
            .collect()
    }

    /// Whether ids are exactly `1..=n` in display order
    pub fn is_dense(&self) -> bool {
        self.summary
            .iter()
            .enumerate()
            .all(|(index, entry)| entry.id == BookId::from_position(index))
    }
}
