//! Immutable database registry.
//!
//! The engines resolve databases through a [`DatabaseRegistry`] built once per
//! run. The registry never changes after construction, so handles can be
//! shared freely across worker threads without coordination.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::handle::DatabaseHandle;

/// Name of the administrative database every deployment exposes.
pub const ADMIN_DB: &str = "admin";

/// Name of the node-local database holding the replication log.
pub const LOCAL_DB: &str = "local";

/// An immutable map from database name to handle.
///
/// Built with [`RegistryBuilder`]; cheap to clone and share.
#[derive(Clone)]
pub struct DatabaseRegistry {
    databases: Arc<BTreeMap<String, Arc<dyn DatabaseHandle>>>,
}

impl DatabaseRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            databases: BTreeMap::new(),
        }
    }

    /// Returns the handle registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseNotFound`] if no database was registered
    /// under that name.
    pub fn get(&self, name: &str) -> StoreResult<Arc<dyn DatabaseHandle>> {
        self.databases
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::DatabaseNotFound(name.to_string()))
    }

    /// Returns the administrative database handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseNotFound`] if the deployment was
    /// registered without an `admin` database.
    pub fn admin(&self) -> StoreResult<Arc<dyn DatabaseHandle>> {
        self.get(ADMIN_DB)
    }

    /// Returns the node-local database handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseNotFound`] if the deployment was
    /// registered without a `local` database.
    pub fn local(&self) -> StoreResult<Arc<dyn DatabaseHandle>> {
        self.get(LOCAL_DB)
    }

    /// Returns the registered database names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }
}

impl std::fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseRegistry")
            .field("databases", &self.names())
            .finish()
    }
}

/// Builder for [`DatabaseRegistry`].
pub struct RegistryBuilder {
    databases: BTreeMap<String, Arc<dyn DatabaseHandle>>,
}

impl RegistryBuilder {
    /// Registers a database handle under its own name.
    #[must_use]
    pub fn database(mut self, handle: Arc<dyn DatabaseHandle>) -> Self {
        self.databases.insert(handle.name().to_string(), handle);
        self
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> DatabaseRegistry {
        DatabaseRegistry {
            databases: Arc::new(self.databases),
        }
    }
}
