//! In-memory backends for testing.
//!
//! Both backends keep their state in `Arc<RwLock<_>>`, so clones share
//! data. Nothing is persisted.
//!
//! # Example
//!
//! ```rust
//! use robostore::storage::inmemory::InMemoryTable;
//! use robostore::store::ItemStore;
//!
//! let store = ItemStore::new(InMemoryTable::new());
//! ```

mod objects;
mod table;

pub use objects::InMemoryObjectStore;
pub use table::InMemoryTable;
