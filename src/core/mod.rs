//! Core catalog logic.
//!
//! This module contains:
//! - Store: The active library session and its operations
//! - Interchange: Import/export of legacy and current JSON shapes
//! - Images: Data-URI checks and size limits for gallery images

pub mod images;
pub mod interchange;
pub mod store;

// Re-export commonly used types
pub use images::{ImageLimits, ImageRejection, DEFAULT_MAX_IMAGE_BYTES};
pub use interchange::{export_file_name, import_value, Shape};
pub use store::{validate_library_name, ActiveLibrary, LibraryStore, StoreError};
