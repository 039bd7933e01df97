//! Pack breakdown optimizer.
//!
//! Finds, for an order quantity, the combination of configured pack sizes that
//! 1. ships at least the requested quantity,
//! 2. ships the fewest surplus items, and
//! 3. among those, uses the fewest packs.
//!
//! Surplus minimization is exact and runs in time bounded by the smallest pack
//! size (see `residue::ResidueGraph`). Pack-count minimization refines the
//! result for the chosen total with `residue::PackCountGraph`, falling back to
//! a bounded exact search for small totals.

use crate::error::OptimizerError;
use crate::model::{DEFAULT_MAX_GRAPH_NODES, OrderQuantity, PackBreakdown, PackSizeConfiguration};

/// Configuration of the optimizer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OptimizerSettings {
    /// Refine the breakdown towards the fewest packs for the chosen total
    pub minimize_pack_count: bool,
    /// Largest total for which the exact pack-count search may run
    pub exact_search_limit: u64,
    /// Largest pack size for which the pack-count graph may be built
    pub max_graph_nodes: u64,
}

impl OptimizerSettings {
    pub const DEFAULT_MINIMIZE_PACK_COUNT: bool = true;
    pub const DEFAULT_EXACT_SEARCH_LIMIT: u64 = 1 << 20;
    pub const DEFAULT_MAX_GRAPH_NODES: u64 = DEFAULT_MAX_GRAPH_NODES;

    /// Creates a builder for custom settings.
    pub fn builder() -> OptimizerSettingsBuilder {
        OptimizerSettingsBuilder::default()
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            minimize_pack_count: Self::DEFAULT_MINIMIZE_PACK_COUNT,
            exact_search_limit: Self::DEFAULT_EXACT_SEARCH_LIMIT,
            max_graph_nodes: Self::DEFAULT_MAX_GRAPH_NODES,
        }
    }
}

/// Builder for `OptimizerSettings`.
#[derive(Clone, Debug, Default)]
pub struct OptimizerSettingsBuilder {
    settings: OptimizerSettings,
}

impl OptimizerSettingsBuilder {
    pub fn minimize_pack_count(mut self, enabled: bool) -> Self {
        self.settings.minimize_pack_count = enabled;
        self
    }

    pub fn exact_search_limit(mut self, limit: u64) -> Self {
        self.settings.exact_search_limit = limit;
        self
    }

    pub fn max_graph_nodes(mut self, nodes: u64) -> Self {
        self.settings.max_graph_nodes = nodes;
        self
    }

    pub fn build(self) -> OptimizerSettings {
        self.settings
    }
}

/// How the final breakdown was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refinement {
    /// Base combination of the residue graph topped up with smallest packs.
    ResidueBase,
    /// Pack-count graph over the largest size.
    PackCountGraph,
    /// Bounded exact search over all totals up to the target.
    ExactSearch,
}

impl Refinement {
    pub fn code(&self) -> &'static str {
        match self {
            Refinement::ResidueBase => "residue_base",
            Refinement::PackCountGraph => "pack_count_graph",
            Refinement::ExactSearch => "exact_search",
        }
    }
}

/// Result of a calculation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Calculation {
    pub quantity: u64,
    pub breakdown: PackBreakdown,
    pub refinement: Refinement,
}

impl Calculation {
    pub fn total_items(&self) -> u64 {
        self.breakdown.total_items()
    }

    pub fn excess(&self) -> u64 {
        self.breakdown.excess_over(self.quantity)
    }
}

/// Computes the breakdown for `quantity` with default settings.
///
/// # Examples
/// ```
/// use pack_it_now::model::PackSizeConfiguration;
/// use pack_it_now::optimizer::calculate_packs;
///
/// let config = PackSizeConfiguration::new([250, 500, 1000, 2000, 5000]).unwrap();
/// let breakdown = calculate_packs(251, &config).unwrap();
/// assert_eq!(breakdown.count_of(500), 1);
/// assert_eq!(breakdown.total_items(), 500);
/// ```
pub fn calculate_packs(
    quantity: u64,
    config: &PackSizeConfiguration,
) -> Result<PackBreakdown, OptimizerError> {
    calculate_packs_with_settings(quantity, config, OptimizerSettings::default())
}

/// Computes the breakdown for `quantity` with the given settings.
pub fn calculate_packs_with_settings(
    quantity: u64,
    config: &PackSizeConfiguration,
    settings: OptimizerSettings,
) -> Result<PackBreakdown, OptimizerError> {
    calculate(quantity, config, settings).map(|calculation| calculation.breakdown)
}

/// Computes the breakdown and reports how it was obtained.
///
/// # Parameters
/// * `quantity` - Requested number of items, at least 1
/// * `config` - Snapshot of the pack sizes; its residue graph is built on first use
/// * `settings` - Optimizer settings
///
/// # Returns
/// The breakdown with the smallest surplus, or an `OptimizerError` for an
/// invalid quantity or an empty configuration
pub fn calculate(
    quantity: u64,
    config: &PackSizeConfiguration,
    settings: OptimizerSettings,
) -> Result<Calculation, OptimizerError> {
    let quantity = OrderQuantity::new(quantity)?.get();
    if config.is_empty() {
        tracing::error!("calculation requested against an empty pack size configuration");
        return Err(OptimizerError::EmptyConfiguration);
    }

    let graph = config.residue_graph();
    let target = graph.smallest_at_least(quantity);
    let base = graph.breakdown_for(&target);
    debug_assert_eq!(base.total_items(), target.total);

    let (breakdown, refinement) = if settings.minimize_pack_count {
        refine(config, &settings, target.total, base)
    } else {
        (base, Refinement::ResidueBase)
    };

    tracing::debug!(
        quantity,
        total = target.total,
        packs = breakdown.pack_count(),
        refinement = refinement.code(),
        "calculated pack breakdown"
    );

    Ok(Calculation {
        quantity,
        breakdown,
        refinement,
    })
}

/// Replaces `base` by a breakdown of the same total with fewer packs when one can be found.
fn refine(
    config: &PackSizeConfiguration,
    settings: &OptimizerSettings,
    total: u64,
    base: PackBreakdown,
) -> (PackBreakdown, Refinement) {
    if config.largest() <= settings.max_graph_nodes {
        if let Some(candidate) = config.pack_count_graph().fewest_packs_for(total) {
            if candidate.pack_count() <= base.pack_count() {
                return (candidate, Refinement::PackCountGraph);
            }
        }
    }

    if total <= settings.exact_search_limit {
        if let Some(candidate) = fewest_packs_exact(config.sizes(), total) {
            if candidate.pack_count() <= base.pack_count() {
                return (candidate, Refinement::ExactSearch);
            }
        }
    }

    if config.report_fallback_once() {
        tracing::warn!(
            sizes = ?config.sizes(),
            max_graph_nodes = settings.max_graph_nodes,
            exact_search_limit = settings.exact_search_limit,
            "pack count refinement unavailable for large orders, keeping residue base combinations"
        );
    }
    tracing::debug!(
        total,
        largest = config.largest(),
        "pack count refinement unavailable, keeping residue base combination"
    );
    (base, Refinement::ResidueBase)
}

/// Fewest packs summing exactly to `target`, by dynamic programming over `0..=target`.
///
/// `sizes` must be sorted in increasing order.
fn fewest_packs_exact(sizes: &[u64], target: u64) -> Option<PackBreakdown> {
    const NONE: u32 = u32::MAX;

    let target = usize::try_from(target).ok()?;
    let mut packs = vec![NONE; target + 1];
    let mut last = vec![0u64; target + 1];
    packs[0] = 0;

    for total in 1..=target {
        for &size in sizes {
            let size = size as usize;
            if size > total {
                break;
            }
            let previous = packs[total - size];
            if previous != NONE && previous + 1 < packs[total] {
                packs[total] = previous + 1;
                last[total] = size as u64;
            }
        }
    }

    if packs[target] == NONE {
        return None;
    }

    let mut breakdown = PackBreakdown::new();
    let mut remaining = target;
    while remaining > 0 {
        let size = last[remaining];
        breakdown.add(size, 1);
        remaining -= size as usize;
    }
    Some(breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(sizes: &[u64]) -> PackSizeConfiguration {
        PackSizeConfiguration::new(sizes.iter().copied()).unwrap()
    }

    fn assert_breakdown(breakdown: &PackBreakdown, expected: &[(u64, u64)]) {
        let actual: Vec<(u64, u64)> = breakdown.iter().collect();
        let mut expected = expected.to_vec();
        expected.sort_unstable();
        assert_eq!(actual, expected);
    }

    /// Reference answer: minimal total >= quantity and the fewest packs for it.
    fn brute_force(sizes: &[u64], quantity: u64) -> (u64, u64) {
        let limit = (quantity + sizes.iter().max().unwrap()) as usize;
        let mut packs = vec![u64::MAX; limit + 1];
        packs[0] = 0;
        for total in 1..=limit {
            for &size in sizes {
                let size = size as usize;
                if size <= total && packs[total - size] != u64::MAX {
                    packs[total] = packs[total].min(packs[total - size] + 1);
                }
            }
        }
        (quantity as usize..=limit)
            .find(|&total| packs[total] != u64::MAX)
            .map(|total| (total as u64, packs[total]))
            .unwrap()
    }

    /// Whether `total` is a non-negative combination of three sizes.
    fn expressible_with_three(sizes: [u64; 3], total: u64) -> bool {
        let [a, b, c] = sizes;
        (0..c).any(|i| {
            (0..c).any(|j| {
                let partial = a * i + b * j;
                partial <= total && (total - partial) % c == 0
            })
        })
    }

    #[test]
    fn single_size_exact_and_over() {
        let config = config(&[250]);
        assert_breakdown(&calculate_packs(250, &config).unwrap(), &[(250, 1)]);
        assert_breakdown(&calculate_packs(251, &config).unwrap(), &[(250, 2)]);
    }

    #[test]
    fn one_item_uses_smallest_pack() {
        let config = config(&[250, 500, 1000, 2000, 5000]);
        let breakdown = calculate_packs(1, &config).unwrap();
        assert_breakdown(&breakdown, &[(250, 1)]);
        assert_eq!(breakdown.total_items(), 250);
    }

    #[test]
    fn prefers_larger_pack_over_two_small_ones() {
        let config = config(&[250, 500, 1000, 2000, 5000]);
        assert_breakdown(&calculate_packs(250, &config).unwrap(), &[(250, 1)]);
        assert_breakdown(&calculate_packs(251, &config).unwrap(), &[(500, 1)]);
        assert_breakdown(
            &calculate_packs(501, &config).unwrap(),
            &[(500, 1), (250, 1)],
        );
    }

    #[test]
    fn large_order_uses_fewest_packs() {
        let config = config(&[250, 500, 1000, 2000, 5000]);
        let breakdown = calculate_packs(12_001, &config).unwrap();
        assert_breakdown(&breakdown, &[(5000, 2), (2000, 1), (250, 1)]);
    }

    #[test]
    fn surplus_beats_pack_count() {
        let config = config(&[250, 500, 1000]);
        let breakdown = calculate_packs(501, &config).unwrap();
        assert_eq!(breakdown.total_items(), 750);
    }

    #[test]
    fn exact_match_with_two_sizes() {
        let config = config(&[250, 500]);
        assert_breakdown(
            &calculate_packs(750, &config).unwrap(),
            &[(500, 1), (250, 1)],
        );
    }

    #[test]
    fn coprime_sizes_one_item() {
        let config = config(&[23, 31, 53]);
        let breakdown = calculate_packs(1, &config).unwrap();
        assert_breakdown(&breakdown, &[(23, 1)]);
        assert_eq!(breakdown.total_items(), 23);
    }

    #[test]
    fn coprime_sizes_half_million() {
        let config = config(&[23, 31, 53]);
        let breakdown = calculate_packs(500_000, &config).unwrap();
        assert_breakdown(&breakdown, &[(23, 2), (31, 7), (53, 9429)]);

        let expected_total = (500_000..500_053)
            .find(|&total| expressible_with_three([23, 31, 53], total))
            .unwrap();
        assert_eq!(breakdown.total_items(), expected_total);
        assert_eq!(expected_total, 500_000);
    }

    #[test]
    fn unit_pack_fulfils_exactly() {
        let config = config(&[1]);
        for quantity in [1, 7, 1_000, 987_654_321] {
            let breakdown = calculate_packs(quantity, &config).unwrap();
            assert_breakdown(&breakdown, &[(1, quantity)]);
            assert_eq!(breakdown.excess_over(quantity), 0);
        }
    }

    #[test]
    fn common_divisor_rounds_up_to_reachable_total() {
        let config = config(&[4, 6]);
        assert_eq!(calculate_packs(3, &config).unwrap().total_items(), 4);
        assert_eq!(calculate_packs(5, &config).unwrap().total_items(), 6);
        assert_eq!(calculate_packs(9, &config).unwrap().total_items(), 10);
    }

    #[test]
    fn huge_quantity_stays_fast_and_exact() {
        let config = config(&[23, 31, 53]);
        let quantity = 987_654_321_987;
        let breakdown = calculate_packs(quantity, &config).unwrap();
        assert!(breakdown.total_items() >= quantity);
        assert!(breakdown.total_items() < quantity + 23);
        assert!(config.residue_graph().is_achievable(breakdown.total_items()));
    }

    #[test]
    fn rejects_invalid_quantities() {
        let config = config(&[250]);
        assert_eq!(
            calculate_packs(0, &config),
            Err(OptimizerError::InvalidQuantity(0))
        );
        assert!(calculate_packs(crate::model::MAX_ORDER_QUANTITY + 1, &config).is_err());
    }

    #[test]
    fn disabled_refinement_keeps_residue_base() {
        let settings = OptimizerSettings::builder()
            .minimize_pack_count(false)
            .build();
        let config = config(&[250, 500, 1000, 2000, 5000]);
        let calculation = calculate(12_001, &config, settings).unwrap();
        assert_eq!(calculation.refinement, Refinement::ResidueBase);
        assert_eq!(calculation.total_items(), 12_250);
        assert_eq!(calculation.excess(), 249);
        assert_eq!(calculation.breakdown.count_of(250), 49);
    }

    #[test]
    fn exact_search_covers_overshooting_pack_count_graph() {
        // The cheapest multiset for residue 6 mod 10 is 8 + 8, which overshoots 6.
        let config = config(&[3, 8, 10]);
        let calculation = calculate(4, &config, OptimizerSettings::default()).unwrap();
        assert_eq!(calculation.refinement, Refinement::ExactSearch);
        assert_breakdown(&calculation.breakdown, &[(3, 2)]);
    }

    #[test]
    fn refinement_falls_back_when_graphs_are_capped() {
        let settings = OptimizerSettings::builder()
            .max_graph_nodes(100)
            .exact_search_limit(0)
            .build();
        let config = config(&[250, 500, 1000, 2000, 5000]);
        let calculation = calculate(12_001, &config, settings).unwrap();
        assert_eq!(calculation.refinement, Refinement::ResidueBase);
        assert_eq!(calculation.total_items(), 12_250);

        // The first fallback on this snapshot has already been reported.
        calculate(20_001, &config, settings).unwrap();
        assert!(!config.report_fallback_once());
    }

    #[test]
    fn fallback_is_reported_once_per_snapshot() {
        let first = config(&[3, 5]);
        assert!(first.report_fallback_once());
        assert!(!first.report_fallback_once());
        assert!(!first.report_fallback_once());

        let replacement = config(&[3, 5]);
        assert!(replacement.report_fallback_once(), "a new snapshot reports again");
    }

    #[test]
    fn exact_search_finds_fewest_packs() {
        let breakdown = fewest_packs_exact(&[1, 3, 4], 6).unwrap();
        assert_eq!(breakdown.pack_count(), 2);
        assert_eq!(breakdown.count_of(3), 2);
        assert!(fewest_packs_exact(&[4, 6], 7).is_none());
    }

    #[test]
    fn repeated_calculation_is_identical() {
        let config = config(&[23, 31, 53]);
        let first = calculate_packs(12_345, &config).unwrap();
        let second = calculate_packs(12_345, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn matches_brute_force_on_small_orders() {
        for sizes in [
            vec![250, 500, 1000, 2000, 5000],
            vec![23, 31, 53],
            vec![6, 9, 20],
            vec![4, 6],
            vec![3, 10],
        ] {
            let config = config(&sizes);
            for quantity in (1..3_000).step_by(37) {
                let breakdown = calculate_packs(quantity, &config).unwrap();
                let (total, packs) = brute_force(&sizes, quantity);
                assert_eq!(
                    breakdown.total_items(),
                    total,
                    "sizes {:?}, quantity {}",
                    sizes,
                    quantity
                );
                assert_eq!(
                    breakdown.pack_count(),
                    packs,
                    "sizes {:?}, quantity {}",
                    sizes,
                    quantity
                );
            }
        }
    }

    proptest! {
        #[test]
        fn surplus_and_pack_count_are_minimal(
            sizes in prop::collection::vec(1u64..60, 1..5),
            quantity in 1u64..2_000,
        ) {
            let config = config(&sizes);
            let breakdown = calculate_packs(quantity, &config).unwrap();
            let (total, packs) = brute_force(config.sizes(), quantity);
            prop_assert_eq!(breakdown.total_items(), total);
            prop_assert_eq!(breakdown.pack_count(), packs);
            prop_assert!(breakdown.iter().all(|(size, count)| count > 0 && config.sizes().contains(&size)));
        }

        #[test]
        fn total_lies_in_its_residue_class(
            sizes in prop::collection::vec(1u64..200, 1..5),
            quantity in 1u64..10_000_000,
        ) {
            let config = config(&sizes);
            let settings = OptimizerSettings::builder().minimize_pack_count(false).build();
            let breakdown = calculate_packs_with_settings(quantity, &config, settings).unwrap();
            let total = breakdown.total_items();
            let graph = config.residue_graph();
            prop_assert!(total >= quantity);
            prop_assert!(graph.dist(total).is_some_and(|base| base <= total));
            prop_assert_eq!(graph.smallest_at_least(quantity).total, total);
        }
    }
}
