//! Document store module
//!
//! Persistence boundary for rooms, students, applications and identities.
//! Backends guarantee per-document atomicity only: a `save` either fully
//! replaces one document or fails, and nothing spans two documents.

mod document;
mod error;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Application, Identity, Room, Student};

pub use document::{Condition, Document, Filter, UniqueKey};
pub use error::StoreError;
pub use memory::MemoryCollection;
pub use postgres::PgCollection;

/// Storage operations for one document type.
///
/// `save` is a compare-and-swap on the document's version: it succeeds only
/// if the stored version equals the version carried by the document, and
/// returns the document with its version bumped.
#[async_trait]
pub trait Collection<T: Document>: Send + Sync {
    /// Get a document by id
    async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError>;

    /// First document matching the filter
    async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError>;

    /// All documents matching the filter
    async fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError>;

    /// Store a new document, enforcing its unique keys
    async fn insert(&self, doc: T) -> Result<T, StoreError>;

    /// Replace an existing document (compare-and-swap on version)
    async fn save(&self, doc: T) -> Result<T, StoreError>;

    /// Remove a document, returning whether it existed
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// The four collections shared by every engine
#[derive(Clone)]
pub struct Stores {
    pub rooms: Arc<dyn Collection<Room>>,
    pub students: Arc<dyn Collection<Student>>,
    pub applications: Arc<dyn Collection<Application>>,
    pub identities: Arc<dyn Collection<Identity>>,
}

impl Stores {
    /// Process-local collections
    pub fn in_memory() -> Self {
        Self {
            rooms: Arc::new(MemoryCollection::<Room>::new()),
            students: Arc::new(MemoryCollection::<Student>::new()),
            applications: Arc::new(MemoryCollection::<Application>::new()),
            identities: Arc::new(MemoryCollection::<Identity>::new()),
        }
    }

    /// Collections backed by Postgres document tables
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            rooms: Arc::new(PgCollection::<Room>::new(pool.clone())),
            students: Arc::new(PgCollection::<Student>::new(pool.clone())),
            applications: Arc::new(PgCollection::<Application>::new(pool.clone())),
            identities: Arc::new(PgCollection::<Identity>::new(pool)),
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
