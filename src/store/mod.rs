//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is everything the pipeline and the import /
//! export commands need from persistent storage, enabling pluggable
//! backends:
//!
//! - [`SqliteStore`]: the production backend (`sqlx` + SQLite).
//! - [`InMemoryStore`]: `RwLock`-guarded vectors for tests.
//!
//! `endpoints()` must return records in the backend's native iteration
//! order (insertion order for both backends), since that order becomes the
//! corpus order.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EndpointRecord, ModuleRecord, NewEndpoint, StoredEndpoint};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract storage backend for endpoint and module records.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`modules`](DocumentStore::modules) | All module records |
/// | [`endpoints`](DocumentStore::endpoints) | All endpoint records, native order |
/// | [`module_by_name`](DocumentStore::module_by_name) | Look a module up by name |
/// | [`upsert_module`](DocumentStore::upsert_module) | Get or create a module by name |
/// | [`insert_endpoints`](DocumentStore::insert_endpoints) | Bulk insert imported endpoints |
/// | [`get_endpoint`](DocumentStore::get_endpoint) | One endpoint with its raw payload |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn modules(&self) -> Result<Vec<ModuleRecord>>;

    async fn endpoints(&self) -> Result<Vec<EndpointRecord>>;

    async fn module_by_name(&self, name: &str) -> Result<Option<ModuleRecord>>;

    /// Return the id of the module called `name`, creating it if needed.
    async fn upsert_module(&self, name: &str) -> Result<String>;

    /// Insert endpoints, returning how many were written.
    async fn insert_endpoints(&self, endpoints: &[NewEndpoint]) -> Result<usize>;

    async fn get_endpoint(&self, id: &str) -> Result<Option<StoredEndpoint>>;
}
