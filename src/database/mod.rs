/*!
 * Database module for the durable translation cache.
 *
 * SQLite storage keyed by document path, base revision and content hash,
 * shared by every run on the machine.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::CacheRecord;
pub use repository::{CacheStats, Repository};
