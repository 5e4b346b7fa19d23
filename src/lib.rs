//! bookshelf - Personal book library catalog
//!
//! Keeps named libraries of books, each an ordered list of summary rows plus
//! a map of detail records (extended description, photo gallery,
//! publication info, comments), stored as one JSON file per library.
//!
//! # Architecture
//!
//! - Identifiers are dense (`1..=n`, display order) after every structural
//!   change; detail records follow their entry when ids are reassigned
//! - Libraries saved in the older flat-array format are migrated on load
//! - Imports accept both shapes and are always re-indexed
//!
//! # Modules
//!
//! - `domain`: Data structures (BookSummary, BookDetail, Library)
//! - `core`: Library store, import/export, image limits
//! - `adapters`: Persistence gateways (file, memory)
//! - `config`: Path and limit configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! bookshelf create Romans
//! bookshelf add
//! bookshelf edit 1 --author "Marguerite Duras" --title "L'Amant"
//! bookshelf list --query duras
//! bookshelf export
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::adapters::{FileGateway, Gateway, MemoryGateway, PersistenceError};
pub use crate::core::{LibraryStore, StoreError};
pub use crate::domain::{BookDetail, BookId, BookSummary, DetailPatch, Library, SummaryPatch};
