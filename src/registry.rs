//! Pack size registry.
//!
//! Holds the active configuration as an immutable snapshot behind an `Arc`.
//! Readers clone the `Arc` and keep working on their snapshot even if the
//! configuration is replaced while they run; writers swap the pointer.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ConfigError;
use crate::model::{DEFAULT_MAX_GRAPH_NODES, PackSizeConfiguration};

pub struct PackSizeRegistry {
    active: RwLock<Arc<PackSizeConfiguration>>,
    max_graph_nodes: u64,
}

impl PackSizeRegistry {
    /// Creates a registry holding `initial`.
    pub fn new(initial: PackSizeConfiguration) -> Self {
        Self::with_limit(initial, DEFAULT_MAX_GRAPH_NODES)
    }

    /// Creates a registry that rejects configurations whose smallest size exceeds `max_graph_nodes`.
    pub fn with_limit(initial: PackSizeConfiguration, max_graph_nodes: u64) -> Self {
        Self {
            active: RwLock::new(Arc::new(initial)),
            max_graph_nodes,
        }
    }

    /// Returns the current snapshot.
    ///
    /// The read lock is held only for the `Arc` clone.
    pub fn read(&self) -> Arc<PackSizeConfiguration> {
        Arc::clone(&self.active.read())
    }

    /// Validates `sizes` against the registry's limits without activating them.
    pub fn validate(
        &self,
        sizes: impl IntoIterator<Item = u64>,
    ) -> Result<PackSizeConfiguration, ConfigError> {
        PackSizeConfiguration::with_limit(sizes, self.max_graph_nodes)
    }

    /// Validates `sizes` and atomically makes them the active configuration.
    ///
    /// On error the previous configuration stays active. The residue graph
    /// cached on the previous snapshot is dropped together with its last
    /// reference.
    pub fn replace(
        &self,
        sizes: impl IntoIterator<Item = u64>,
    ) -> Result<Arc<PackSizeConfiguration>, ConfigError> {
        let config = self.validate(sizes)?;
        Ok(self.install(config))
    }

    /// Activates an already validated configuration and returns it.
    pub fn install(&self, config: PackSizeConfiguration) -> Arc<PackSizeConfiguration> {
        let next = Arc::new(config);
        let previous = std::mem::replace(&mut *self.active.write(), Arc::clone(&next));
        tracing::debug!(
            previous = ?previous.sizes(),
            current = ?next.sizes(),
            "pack size snapshot replaced"
        );
        next
    }
}
