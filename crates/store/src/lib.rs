//! Backing store boundary.
//!
//! Defines the request/response contract a context uses to load and persist
//! entity rows, plus two adapters: an in-memory store for tests/dev and a
//! JSON-file store.

pub mod backing;
pub mod in_memory;
pub mod json_file;

pub use backing::{BackingStore, StoreError, StoreResult};
pub use in_memory::{InMemoryBackingStore, StoreStats};
pub use json_file::JsonFileStore;
