//! The library store: the single active library and every operation on it.
//!
//! Each operation leaves the in-memory library consistent (every summary id
//! resolves to a detail record or to the empty default) and then persists it
//! through the gateway. A failed save is reported but the in-memory change
//! stays applied until the next successful save.
//!
//! Ids returned by the store are valid until the next structural operation
//! (add, delete, import, load); after one of those, re-read the summary.

use std::borrow::Cow;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{Gateway, PersistenceError};
use crate::domain::{BookDetail, BookId, BookSummary, DetailPatch, Library, SummaryPatch};

use super::images::ImageLimits;
use super::interchange;

/// Errors returned by store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No library selected")]
    NoActiveLibrary,

    #[error("Library not found: {0}")]
    LibraryNotFound(String),

    #[error("Library already exists: {0}")]
    LibraryExists(String),

    #[error("Invalid library name: {0:?}")]
    InvalidName(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(BookId),

    #[error("Entry {id} has no image at position {index}")]
    ImageNotFound { id: BookId, index: usize },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl StoreError {
    /// Everything except a failed gateway call leaves state untouched
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StoreError::Persistence(_))
    }

    /// Whether this is one of the "not found" conditions
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::LibraryNotFound(_)
                | StoreError::EntryNotFound(_)
                | StoreError::ImageNotFound { .. }
        )
    }
}

/// The library currently being edited
#[derive(Debug, Clone)]
pub struct ActiveLibrary {
    name: String,
    library: Library,
    next_id: BookId,
}

impl ActiveLibrary {
    fn new(name: String, library: Library) -> Result<Self, StoreError> {
        let next_id = library.next_free_id().ok_or_else(|| {
            StoreError::InvalidFormat(format!(
                "library {} already uses the highest possible id",
                name
            ))
        })?;

        Ok(Self {
            name,
            library,
            next_id,
        })
    }

    /// Name the library is saved under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The in-memory library
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Next id to allocate
    pub fn next_id(&self) -> BookId {
        self.next_id
    }

    fn require(&self, id: BookId) -> Result<(), StoreError> {
        if self.library.contains(id) {
            Ok(())
        } else {
            Err(StoreError::EntryNotFound(id))
        }
    }

    fn reindex(&mut self) {
        self.next_id = self.library.reindex();
        debug!(entries = self.library.len(), "Re-indexed entries");
    }
}

/// Session object owning the active library
pub struct LibraryStore<G: Gateway> {
    gateway: G,
    limits: ImageLimits,
    active: Option<ActiveLibrary>,
}

impl<G: Gateway> LibraryStore<G> {
    /// Create a store with no library selected
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            limits: ImageLimits::default(),
            active: None,
        }
    }

    /// Override the image limits
    pub fn with_limits(mut self, limits: ImageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Get the gateway
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The active library, if any
    pub fn active(&self) -> Option<&ActiveLibrary> {
        self.active.as_ref()
    }

    /// Name of the active library, if any
    pub fn current_name(&self) -> Option<&str> {
        self.active.as_ref().map(ActiveLibrary::name)
    }

    /// The active library's contents
    pub fn library(&self) -> Result<&Library, StoreError> {
        Ok(&self.active_ref()?.library)
    }

    /// Names of all stored libraries
    pub async fn list_libraries(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.gateway.list().await?)
    }

    /// Create and select an empty library, persisting it immediately.
    ///
    /// Any unsaved state of the previously active library is discarded.
    #[instrument(skip(self))]
    pub async fn create_library(&mut self, name: &str) -> Result<(), StoreError> {
        let name = validate_library_name(name)?;

        if self.gateway.load(&name).await?.is_some() {
            return Err(StoreError::LibraryExists(name));
        }

        self.active = Some(ActiveLibrary::new(name.clone(), Library::new())?);
        self.persist().await?;

        info!(library = %name, "Created library");
        Ok(())
    }

    /// Load and select a stored library.
    ///
    /// Legacy data is migrated and written back in the current shape. On
    /// failure the previously active library stays selected.
    #[instrument(skip(self))]
    pub async fn load_library(&mut self, name: &str) -> Result<(), StoreError> {
        let name = validate_library_name(name)?;

        let raw = self
            .gateway
            .load(&name)
            .await?
            .ok_or_else(|| StoreError::LibraryNotFound(name.clone()))?;

        let decoded = interchange::decode_stored(raw)?;
        let entries = decoded.library.len();
        self.active = Some(ActiveLibrary::new(name.clone(), decoded.library)?);

        if decoded.migrated {
            info!(library = %name, entries, "Migrated legacy library to current format");
            self.persist().await?;
        }

        info!(library = %name, entries, "Loaded library");
        Ok(())
    }

    /// Deselect the active library without saving
    pub fn close_library(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(library = %active.name, "Closed library");
        }
    }

    /// Rename the active library: save under the new name, then remove the
    /// old one. Renaming to the current name does nothing.
    #[instrument(skip(self))]
    pub async fn rename_library(&mut self, new_name: &str) -> Result<(), StoreError> {
        let new_name = validate_library_name(new_name)?;
        let old_name = self.active_ref()?.name.clone();

        if new_name == old_name {
            return Ok(());
        }

        if self.gateway.load(&new_name).await?.is_some() {
            return Err(StoreError::LibraryExists(new_name));
        }

        self.gateway
            .save(&new_name, &self.active_ref()?.library)
            .await?;
        self.active_mut()?.name = new_name.clone();
        self.gateway.delete(&old_name).await?;

        info!(from = %old_name, to = %new_name, "Renamed library");
        Ok(())
    }

    /// Delete the active library from storage and deselect it.
    /// Returns the deleted name.
    pub async fn delete_library(&mut self) -> Result<String, StoreError> {
        let name = self.active_ref()?.name.clone();

        self.gateway.delete(&name).await?;
        self.active = None;

        info!(library = %name, "Deleted library");
        Ok(name)
    }

    /// Add a blank entry at the front of the list.
    ///
    /// Returns the id the new entry holds after re-indexing.
    pub async fn add_entry(&mut self) -> Result<BookId, StoreError> {
        let active = self.active_mut()?;

        // Re-indexing resets next_id, so it is not advanced here
        let allocated = active.next_id;
        active
            .library
            .prepend(BookSummary::blank(allocated), BookDetail::default());
        active.reindex();

        // Prepended entries always sit at position 0
        let id = BookId::from_position(0);
        debug!(allocated = %allocated, %id, "Added entry");

        self.persist().await?;
        Ok(id)
    }

    /// Remove an entry and its detail record, then re-index.
    ///
    /// An unknown id returns [`StoreError::EntryNotFound`] and changes
    /// nothing.
    #[instrument(skip(self))]
    pub async fn delete_entry(&mut self, id: BookId) -> Result<BookSummary, StoreError> {
        let active = self.active_mut()?;

        let (summary, _) = active
            .library
            .remove(id)
            .ok_or(StoreError::EntryNotFound(id))?;
        active.reindex();

        info!(%id, title = %summary.title, "Deleted entry");
        self.persist().await?;
        Ok(summary)
    }

    /// Apply partial updates to an entry's summary and detail records.
    ///
    /// Ids are not changed. A missing detail record is created from the
    /// empty default before the patch is applied.
    #[instrument(skip(self, summary_patch, detail_patch))]
    pub async fn update_entry(
        &mut self,
        id: BookId,
        summary_patch: SummaryPatch,
        detail_patch: DetailPatch,
    ) -> Result<(), StoreError> {
        let active = self.active_mut()?;
        active.require(id)?;

        if let Some(summary) = active.library.summary_mut(id) {
            summary.apply(summary_patch);
        }
        active.library.detail_entry(id).apply(detail_patch);

        debug!(%id, "Updated entry");
        self.persist().await
    }

    /// Summary and detail for an entry; the detail falls back to the empty
    /// default when it is missing
    pub fn entry(&self, id: BookId) -> Result<(&BookSummary, Cow<'_, BookDetail>), StoreError> {
        let library = &self.active_ref()?.library;
        let summary = library.summary(id).ok_or(StoreError::EntryNotFound(id))?;
        Ok((summary, library.detail_or_default(id)))
    }

    /// Entries matching `query` in display order
    pub fn search(&self, query: &str) -> Result<Vec<&BookSummary>, StoreError> {
        Ok(self.active_ref()?.library.search(query))
    }

    /// Append data-URI images to an entry's gallery.
    ///
    /// Images that are not base64 image data URIs or exceed the size limit
    /// are skipped. If the entry has no main image yet, the first gallery
    /// image becomes its main image; this never happens again afterwards.
    /// Returns the number of images added.
    #[instrument(skip(self, images))]
    pub async fn add_images<I>(&mut self, id: BookId, images: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = String>,
    {
        let limits = self.limits;
        let active = self.active_mut()?;
        active.require(id)?;

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for (position, image) in images.into_iter().enumerate() {
            match limits.validate(&image) {
                Ok(()) => accepted.push(image),
                Err(reason) => {
                    warn!(%id, position, %reason, "Skipping image");
                    rejected.push(format!("#{}: {}", position + 1, reason));
                }
            }
        }

        if accepted.is_empty() {
            return Err(StoreError::InvalidImage(if rejected.is_empty() {
                "no images given".to_string()
            } else {
                rejected.join("; ")
            }));
        }

        let count = accepted.len();
        let detail = active.library.detail_entry(id);
        detail.images.extend(accepted);
        let first = detail.images.first().cloned();

        if let (Some(summary), Some(first)) = (active.library.summary_mut(id), first) {
            if !summary.has_main_image() {
                summary.main_image = first;
            }
        }

        info!(%id, count, "Added images");
        self.persist().await?;
        Ok(count)
    }

    /// Remove one image from an entry's gallery. The main image is left as
    /// it is. Returns the removed image.
    #[instrument(skip(self))]
    pub async fn remove_image(&mut self, id: BookId, index: usize) -> Result<String, StoreError> {
        let active = self.active_mut()?;
        active.require(id)?;

        let images = &mut active.library.detail_entry(id).images;
        if index >= images.len() {
            return Err(StoreError::ImageNotFound { id, index });
        }
        let removed = images.remove(index);

        debug!(%id, index, "Removed image");
        self.persist().await?;
        Ok(removed)
    }

    /// Replace the active library's contents with imported JSON.
    ///
    /// The import is normalized and re-indexed first; an unrecognized shape
    /// leaves the library untouched. Returns the number of entries.
    pub async fn import_data(&mut self, raw: Value) -> Result<usize, StoreError> {
        self.active_ref()?;
        let library = interchange::import_value(raw)?;

        let active = self.active_mut()?;
        active.next_id = BookId::from_position(library.len());
        active.library = library;

        let entries = active.library.len();
        info!(library = %active.name, entries, "Imported library data");

        self.persist().await?;
        Ok(entries)
    }

    /// Parse and import a JSON document
    pub async fn import_json(&mut self, json: &str) -> Result<usize, StoreError> {
        self.active_ref()?;
        let raw: Value = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidFormat(e.to_string()))?;
        self.import_data(raw).await
    }

    /// The active library exactly as it would be exported
    pub fn export_data(&self) -> Result<&Library, StoreError> {
        self.library()
    }

    /// Pretty-printed current-format JSON of the active library
    pub fn export_json(&self) -> Result<String, StoreError> {
        interchange::export_json(self.library()?)
            .map_err(|e| StoreError::Persistence(PersistenceError::Serialization(e)))
    }

    /// Persist the active library; does nothing when none is selected
    pub async fn save_current(&self) -> Result<(), StoreError> {
        if self.active.is_none() {
            return Ok(());
        }
        self.persist().await
    }

    fn active_ref(&self) -> Result<&ActiveLibrary, StoreError> {
        self.active.as_ref().ok_or(StoreError::NoActiveLibrary)
    }

    fn active_mut(&mut self) -> Result<&mut ActiveLibrary, StoreError> {
        self.active.as_mut().ok_or(StoreError::NoActiveLibrary)
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let active = self.active_ref()?;

        if let Err(e) = self.gateway.save(&active.name, &active.library).await {
            warn!(
                library = %active.name,
                error = %e,
                "Save failed; in-memory changes are kept until the next successful save"
            );
            return Err(e.into());
        }

        debug!(library = %active.name, gateway = self.gateway.name(), "Saved library");
        Ok(())
    }
}

/// Trim a library name and check it is usable as a storage key
pub fn validate_library_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();

    let invalid = trimmed.is_empty()
        || trimmed.starts_with('.')
        || trimmed.contains(['/', '\\'])
        || trimmed.chars().any(char::is_control);

    if invalid {
        Err(StoreError::InvalidName(name.to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}
