/// Project type catalog
///
/// Project types (mod, tile set, sound pack) persisted in SQLite and served from
/// a lock-free in-memory registry.

pub mod registry;
pub mod storage;

pub use registry::ProjectTypeRegistry;
pub use storage::ProjectTypeStorage;
