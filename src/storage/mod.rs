//! This module defines the storage interface for the log history and its
//! implementations: an embedded `sled` store and a remote table service.
pub mod history;
pub mod local;
pub mod table;

pub use history::HistoryStore;
pub use local::SledHistoryStore;
pub use table::{TableCredentials, TableHistoryStore};
