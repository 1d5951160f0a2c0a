//! Data store adapters

mod postgrest;
mod sqlite;

pub use postgrest::PostgrestStore;
pub use sqlite::SqliteStore;
