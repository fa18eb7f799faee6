//! Vector store abstraction and backends.
//!
//! The indexing/search pipeline talks to a dyn-safe [`VectorStore`]
//! trait; `qdrant` provides the production backend and `memory` a
//! process-local backend for tests.

pub mod error;
pub mod memory;
pub mod qdrant;
pub mod vector_store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;
pub use vector_store::{
    CollectionDetail, CollectionSummary, FieldCondition, FieldValue, ScoredVectorPoint,
    VectorFilter, VectorPoint, VectorStore,
};
