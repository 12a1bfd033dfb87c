//! Session index: per-location activity windows derived from the journal.
//!
//! The index is a cache over the journal. [`SessionBuilder::rebuild_index_db`]
//! reconstructs it from scratch by replay, so losing the database file never
//! loses history.

pub mod builder;
pub mod finder;
pub mod store;

pub use {
    builder::{RebuildStats, SessionBuilder},
    finder::{SessionFinder, index_db_file, index_location},
    store::{Session, SessionStore},
};
