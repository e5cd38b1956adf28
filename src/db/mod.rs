//! Vector storage backends.
//!
//! One collection per deployment, bound to a single embedding model.
//! [`vectorstore`] defines the [`vectorstore::VectorStore`] trait and the
//! provider factory; [`memory`] is the embedded implementation (in-memory
//! with optional JSON persistence).

pub mod memory;
pub mod vectorstore;

pub use memory::InMemoryVectorStore;
pub use vectorstore::{VectorStore, VectorStoreProvider};
