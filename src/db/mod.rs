//! Storage for gathered content.
//!
//! - [`content_store`] - URL-keyed, deduplicating document store on libsql
//!   (local SQLite file or in-memory)
//! - [`vectorstore`] - Vector store abstraction used by the notes index

#![allow(missing_docs)]

pub mod content_store;
pub mod vectorstore;

pub use content_store::{ContentStore, StoreProvider, StoreStats};
pub use vectorstore::{InMemoryVectorStore, VectorMatch, VectorRecord, VectorStore};
