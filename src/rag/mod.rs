//! Semantic index over finished task notes.
//!
//! Optional: when enabled, notes are embedded and stored in a vector store
//! after each successful task so later runs can search them.

pub mod index;

pub use index::{Embedder, NotesIndex};
