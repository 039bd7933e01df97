//! Data models for pack size configurations and order breakdowns.
//!
//! This module defines the fundamental data structures of the pack calculator:
//! - `PackSizeConfiguration`: An immutable, validated set of pack sizes
//! - `OrderQuantity`: A validated number of requested items
//! - `PackBreakdown`: The packs chosen to fulfil an order
//!
//! Residue graphs derived from a configuration are cached on the configuration
//! itself, so they live exactly as long as the snapshot that produced them.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::{ConfigError, OptimizerError};
use crate::residue::{PackCountGraph, ResidueGraph};

/// Largest accepted pack size.
pub const MAX_PACK_SIZE: u64 = 2_147_483_647;

/// Largest accepted order quantity. Keeps every intermediate total inside `u64`.
pub const MAX_ORDER_QUANTITY: u64 = 1_000_000_000_000_000;

/// Default cap on the number of nodes of a residue graph.
///
/// The smallest pack size of a configuration determines the node count of its
/// residue graph and therefore bounds the work of every calculation.
pub const DEFAULT_MAX_GRAPH_NODES: u64 = 1_000_000;

/// Validates a single pack size.
fn validate_pack_size(size: u64) -> Result<(), ConfigError> {
    if size == 0 || size > MAX_PACK_SIZE {
        return Err(ConfigError::Invalid(format!(
            "pack size must be between 1 and {}, got: {}",
            MAX_PACK_SIZE, size
        )));
    }
    Ok(())
}

/// An immutable snapshot of the configured pack sizes.
///
/// Sizes are deduplicated and kept in strictly increasing order. A snapshot is
/// never mutated after creation; updating the configuration means replacing
/// the snapshot.
#[derive(Debug, Clone)]
pub struct PackSizeConfiguration {
    sizes: Vec<u64>,
    residue_graph: OnceLock<ResidueGraph>,
    pack_count_graph: OnceLock<PackCountGraph>,
    fallback_reported: OnceLock<()>,
}

impl PackSizeConfiguration {
    /// Creates a validated configuration using the default graph size limit.
    ///
    /// # Examples
    /// ```
    /// use pack_it_now::model::PackSizeConfiguration;
    ///
    /// let config = PackSizeConfiguration::new([500, 250, 500]).unwrap();
    /// assert_eq!(config.sizes(), &[250, 500]);
    ///
    /// assert!(PackSizeConfiguration::new(Vec::<u64>::new()).is_err());
    /// assert!(PackSizeConfiguration::new([0, 250]).is_err());
    /// ```
    pub fn new(sizes: impl IntoIterator<Item = u64>) -> Result<Self, ConfigError> {
        Self::with_limit(sizes, DEFAULT_MAX_GRAPH_NODES)
    }

    /// Creates a validated configuration whose smallest size must not exceed `max_graph_nodes`.
    ///
    /// # Parameters
    /// * `sizes` - Raw pack sizes in any order, duplicates allowed
    /// * `max_graph_nodes` - Upper bound for the smallest size
    ///
    /// # Returns
    /// `Ok(PackSizeConfiguration)` for valid input, otherwise the first `ConfigError` found
    pub fn with_limit(
        sizes: impl IntoIterator<Item = u64>,
        max_graph_nodes: u64,
    ) -> Result<Self, ConfigError> {
        let mut sizes: Vec<u64> = sizes.into_iter().collect();
        for &size in &sizes {
            validate_pack_size(size)?;
        }
        if sizes.is_empty() {
            return Err(ConfigError::Empty);
        }

        sizes.sort_unstable();
        sizes.dedup();

        let smallest = sizes[0];
        if smallest > max_graph_nodes {
            return Err(ConfigError::SmallestTooLarge {
                smallest,
                limit: max_graph_nodes,
            });
        }

        Ok(Self {
            sizes,
            residue_graph: OnceLock::new(),
            pack_count_graph: OnceLock::new(),
            fallback_reported: OnceLock::new(),
        })
    }

    /// Parses pack sizes entered as text.
    ///
    /// Blank entries are skipped; anything else must parse as a positive integer.
    ///
    /// # Examples
    /// ```
    /// use pack_it_now::model::PackSizeConfiguration;
    ///
    /// let config = PackSizeConfiguration::parse_raw(["250", " ", "1000 "]).unwrap();
    /// assert_eq!(config.sizes(), &[250, 1000]);
    ///
    /// assert!(PackSizeConfiguration::parse_raw(["ten"]).is_err());
    /// ```
    pub fn parse_raw<'a>(raw: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let sizes = raw
            .into_iter()
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse::<u64>().map_err(|err| {
                    ConfigError::Invalid(format!("'{}' is not a positive integer: {}", entry, err))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(sizes)
    }

    /// Pack sizes in strictly increasing order.
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    /// Smallest configured size, the modulus of the residue graph.
    pub fn smallest(&self) -> u64 {
        self.sizes.first().copied().unwrap_or(0)
    }

    /// Largest configured size.
    pub fn largest(&self) -> u64 {
        self.sizes.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Returns the residue graph of this snapshot, building it on first use.
    ///
    /// Concurrent callers share a single build.
    pub fn residue_graph(&self) -> &ResidueGraph {
        self.residue_graph
            .get_or_init(|| ResidueGraph::build(&self.sizes))
    }

    /// Returns the pack-count refinement graph, building it on first use.
    pub fn pack_count_graph(&self) -> &PackCountGraph {
        self.pack_count_graph
            .get_or_init(|| PackCountGraph::build(&self.sizes))
    }

    /// Returns `true` for the first caller only, so a degraded refinement is
    /// reported once per snapshot.
    pub fn report_fallback_once(&self) -> bool {
        self.fallback_reported.set(()).is_ok()
    }

    /// Whether the residue graph has already been built for this snapshot.
    pub fn has_cached_graph(&self) -> bool {
        self.residue_graph.get().is_some()
    }
}

impl PartialEq for PackSizeConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.sizes == other.sizes
    }
}

impl Eq for PackSizeConfiguration {}

/// A validated order quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderQuantity(u64);

impl OrderQuantity {
    /// Accepts quantities in `1..=MAX_ORDER_QUANTITY`.
    pub fn new(quantity: u64) -> Result<Self, OptimizerError> {
        if quantity == 0 || quantity > MAX_ORDER_QUANTITY {
            return Err(OptimizerError::InvalidQuantity(quantity));
        }
        Ok(Self(quantity))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// The packs used to fulfil an order, keyed by pack size.
///
/// Only positive counts are stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackBreakdown {
    counts: BTreeMap<u64, u64>,
}

impl PackBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` packs of `size`. A zero count is ignored.
    pub fn add(&mut self, size: u64, count: u64) {
        if count == 0 {
            return;
        }
        *self.counts.entry(size).or_insert(0) += count;
    }

    /// Number of packs of the given size.
    pub fn count_of(&self, size: u64) -> u64 {
        self.counts.get(&size).copied().unwrap_or(0)
    }

    /// Iterates `(size, count)` pairs in increasing size order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u64, u64)> + '_ {
        self.counts.iter().map(|(&size, &count)| (size, count))
    }

    /// Total number of items shipped (`Σ size × count`).
    pub fn total_items(&self) -> u64 {
        self.iter().map(|(size, count)| size * count).sum()
    }

    /// Total number of packs.
    pub fn pack_count(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Items shipped beyond the requested quantity.
    pub fn excess_over(&self, quantity: u64) -> u64 {
        self.total_items().saturating_sub(quantity)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(u64, u64)> for PackBreakdown {
    fn from_iter<I: IntoIterator<Item = (u64, u64)>>(iter: I) -> Self {
        let mut breakdown = Self::new();
        for (size, count) in iter {
            breakdown.add(size, count);
        }
        breakdown
    }
}
