/// Persistence of the last known state per site
///
/// The store is the only thing that makes deduplication work between runs,
/// so every read and write error is propagated to the caller.

pub mod migrations;
pub mod models;
pub mod repository;

pub use models::StateRecord;
pub use repository::{LibsqlStateStore, StateStore};
