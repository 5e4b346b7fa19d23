//! Domain types for the book catalog.
//!
//! This module contains the core data structures:
//! - Book: Summary and detail records sharing one id
//! - Library: The aggregate with re-indexing and lookups
//! - Legacy: The flat-array format and its migration

pub mod book;
pub mod legacy;
pub mod library;

// Re-export commonly used types
pub use book::{AdditionalInfo, BookDetail, BookId, BookSummary, DetailPatch, SummaryPatch};
pub use legacy::{migrate, LegacyBook};
pub use library::Library;
