//! Pack calculation service.
//!
//! Exposes the three operations of the calculator to the transport layer:
//! reading the configuration, replacing it and calculating a breakdown.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ServiceError, StoreError};
use crate::model::PackSizeConfiguration;
use crate::optimizer::{Calculation, OptimizerSettings, calculate};
use crate::registry::PackSizeRegistry;
use crate::store::ConfigurationStore;

pub struct PackService {
    registry: PackSizeRegistry,
    settings: OptimizerSettings,
    store: Option<Arc<dyn ConfigurationStore>>,
    // Serializes persist + swap so the store and the registry agree.
    update_lock: Mutex<()>,
}

impl PackService {
    pub fn new(registry: PackSizeRegistry, settings: OptimizerSettings) -> Self {
        Self {
            registry,
            settings,
            store: None,
            update_lock: Mutex::new(()),
        }
    }

    /// Persists every accepted configuration to `store`.
    pub fn with_store(mut self, store: Arc<dyn ConfigurationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds a service whose initial configuration comes from `store`, or
    /// from `defaults` when the store is empty.
    pub fn restore(
        store: Arc<dyn ConfigurationStore>,
        defaults: &[u64],
        settings: OptimizerSettings,
    ) -> Result<Self, StoreError> {
        let sizes = match store.load()? {
            Some(sizes) => {
                tracing::info!(?sizes, "restored pack sizes from store");
                sizes
            }
            None => {
                tracing::info!(sizes = ?defaults, "no stored pack sizes, using defaults");
                defaults.to_vec()
            }
        };
        let initial = PackSizeConfiguration::with_limit(sizes, settings.max_graph_nodes)?;
        let registry = PackSizeRegistry::with_limit(initial, settings.max_graph_nodes);
        Ok(Self::new(registry, settings).with_store(store))
    }

    /// Current pack sizes in increasing order.
    pub fn get_configuration(&self) -> Vec<u64> {
        self.registry.read().sizes().to_vec()
    }

    /// Validates, persists and activates new pack sizes.
    ///
    /// Nothing changes when validation or persistence fails.
    pub fn set_configuration(&self, sizes: Vec<u64>) -> Result<(), ServiceError> {
        let config = self.registry.validate(sizes).inspect_err(|err| {
            tracing::info!(error = %err, "rejected pack size update");
        })?;

        let _guard = self.update_lock.lock();
        if let Some(store) = &self.store {
            store.save(&config).inspect_err(|err| {
                tracing::warn!(error = %err, "failed to persist pack sizes");
            })?;
        }
        let active = self.registry.install(config);
        tracing::info!(sizes = ?active.sizes(), "pack sizes updated");
        Ok(())
    }

    /// Calculates the breakdown for `quantity` against the current snapshot.
    pub fn calculate(&self, quantity: u64) -> Result<Calculation, ServiceError> {
        let snapshot = self.registry.read();
        let calculation = calculate(quantity, &snapshot, self.settings)?;
        tracing::info!(
            quantity,
            total = calculation.total_items(),
            excess = calculation.excess(),
            packs = calculation.breakdown.pack_count(),
            "calculated packs"
        );
        Ok(calculation)
    }
}
