//! In-memory [`DocumentStore`] implementation for tests.
//!
//! Uses `Vec`s behind `std::sync::RwLock`; iteration order is insertion
//! order, matching the SQLite backend.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{EndpointRecord, ModuleRecord, NewEndpoint, StoredEndpoint};

use super::DocumentStore;

/// In-memory store for tests and embedding in other programs.
#[derive(Default)]
pub struct InMemoryStore {
    modules: RwLock<Vec<ModuleRecord>>,
    endpoints: RwLock<Vec<StoredEndpoint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store directly from records, bypassing the importer.
    pub fn with_records(modules: Vec<ModuleRecord>, endpoints: Vec<EndpointRecord>) -> Self {
        Self {
            modules: RwLock::new(modules),
            endpoints: RwLock::new(
                endpoints
                    .into_iter()
                    .map(|record| StoredEndpoint { record, raw: None })
                    .collect(),
            ),
        }
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn modules(&self) -> Result<Vec<ModuleRecord>> {
        Ok(self.modules.read().map_err(|_| poisoned())?.clone())
    }

    async fn endpoints(&self) -> Result<Vec<EndpointRecord>> {
        Ok(self
            .endpoints
            .read()
            .map_err(|_| poisoned())?
            .iter()
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn module_by_name(&self, name: &str) -> Result<Option<ModuleRecord>> {
        Ok(self
            .modules
            .read()
            .map_err(|_| poisoned())?
            .iter()
            .find(|m| m.name == name)
            .cloned())
    }

    async fn upsert_module(&self, name: &str) -> Result<String> {
        let mut modules = self.modules.write().map_err(|_| poisoned())?;
        if let Some(existing) = modules.iter().find(|m| m.name == name) {
            return Ok(existing.id.clone());
        }
        let id = uuid::Uuid::new_v4().to_string();
        modules.push(ModuleRecord {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn insert_endpoints(&self, endpoints: &[NewEndpoint]) -> Result<usize> {
        let mut stored = self.endpoints.write().map_err(|_| poisoned())?;
        for endpoint in endpoints {
            if stored.iter().any(|s| s.record.id == endpoint.id) {
                bail!("duplicate endpoint id: {}", endpoint.id);
            }
        }
        stored.extend(endpoints.iter().map(|endpoint| StoredEndpoint {
            record: endpoint.to_record(),
            raw: Some(endpoint.raw.clone()),
        }));
        Ok(endpoints.len())
    }

    async fn get_endpoint(&self, id: &str) -> Result<Option<StoredEndpoint>> {
        Ok(self
            .endpoints
            .read()
            .map_err(|_| poisoned())?
            .iter()
            .find(|s| s.record.id == id)
            .cloned())
    }
}
