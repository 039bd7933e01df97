//! Residue graphs over pack sizes.
//!
//! Both graphs in this module have one node per residue class modulo a pack
//! size and one edge per (node, pack size) pair. A shortest-path search from
//! node 0 finds, for every residue, the cheapest multiset of packs whose sum
//! falls into that class. The node count is bounded by a pack size, never by
//! the order quantity.
//!
//! - `ResidueGraph`: modulus = smallest size, cost = items (then packs).
//!   Yields the smallest achievable total in every residue class.
//! - `PackCountGraph`: modulus = largest size, cost = `largest - size` per pack
//!   (then items). Yields pack-count optimal breakdowns for exact totals.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::model::PackBreakdown;

/// Lexicographic path cost: primary objective first, tie-breaker second.
type Cost = (u64, u64);

const UNREACHABLE: Cost = (u64::MAX, u64::MAX);

/// Incoming edge on a shortest path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Edge {
    from: usize,
    size: u64,
}

/// A move that can be applied from any node.
#[derive(Clone, Copy, Debug)]
struct Move {
    size: u64,
    step: usize,
    cost: Cost,
}

/// Shortest-path tree from node 0 over `modulus` residue nodes.
#[derive(Clone, Debug)]
struct ShortestPathTree {
    cost: Vec<Cost>,
    parent: Vec<Option<Edge>>,
}

impl ShortestPathTree {
    /// Dijkstra over residues. All move costs are non-negative and every move
    /// with a zero step is dropped, so the search terminates after settling
    /// each reachable node once.
    fn solve(modulus: usize, moves: &[Move]) -> Self {
        let mut cost = vec![UNREACHABLE; modulus];
        let mut parent: Vec<Option<Edge>> = vec![None; modulus];
        let mut settled = vec![false; modulus];
        let mut heap = BinaryHeap::new();

        cost[0] = (0, 0);
        heap.push(Reverse((cost[0], 0usize)));

        while let Some(Reverse((current, node))) = heap.pop() {
            if settled[node] || current > cost[node] {
                continue;
            }
            settled[node] = true;

            for mv in moves {
                let next = (node + mv.step) % modulus;
                if settled[next] {
                    continue;
                }
                let candidate = (current.0 + mv.cost.0, current.1 + mv.cost.1);
                if candidate < cost[next] {
                    cost[next] = candidate;
                    parent[next] = Some(Edge {
                        from: node,
                        size: mv.size,
                    });
                    heap.push(Reverse((candidate, next)));
                }
            }
        }

        Self { cost, parent }
    }

    fn is_reachable(&self, node: usize) -> bool {
        self.cost[node] != UNREACHABLE
    }

    /// Tallies one pack per edge on the path from `node` back to node 0.
    fn reconstruct(&self, node: usize) -> Option<PackBreakdown> {
        if !self.is_reachable(node) {
            return None;
        }
        let mut breakdown = PackBreakdown::new();
        let mut cursor = node;
        while let Some(edge) = self.parent[cursor] {
            breakdown.add(edge.size, 1);
            cursor = edge.from;
        }
        Some(breakdown)
    }
}

/// Smallest achievable total per residue class modulo the smallest pack size.
///
/// For residue `r`, `dist(r)` is the smallest non-negative combination of the
/// configured sizes congruent to `r`. Every larger member of the class,
/// `dist(r) + k * m`, is reachable by adding packs of the smallest size `m`.
#[derive(Clone, Debug)]
pub struct ResidueGraph {
    modulus: u64,
    tree: ShortestPathTree,
}

impl ResidueGraph {
    /// Builds the graph for sizes sorted in increasing order.
    pub fn build(sizes: &[u64]) -> Self {
        let smallest = sizes.first().copied().unwrap_or(1);
        let modulus = smallest as usize;
        let moves: Vec<Move> = sizes
            .iter()
            .map(|&size| Move {
                size,
                step: (size % smallest) as usize,
                cost: (size, 1),
            })
            .filter(|mv| mv.step != 0)
            .collect();

        let tree = ShortestPathTree::solve(modulus, &moves);
        tracing::debug!(
            nodes = modulus,
            reachable = tree.cost.iter().filter(|c| **c != UNREACHABLE).count(),
            "built residue graph"
        );

        Self {
            modulus: smallest,
            tree,
        }
    }

    /// The modulus `m` (smallest pack size).
    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Smallest achievable total congruent to `residue`, `None` when the class is unreachable.
    pub fn dist(&self, residue: u64) -> Option<u64> {
        let node = (residue % self.modulus) as usize;
        self.tree.is_reachable(node).then(|| self.tree.cost[node].0)
    }

    /// Whether `total` can be expressed as a combination of the pack sizes.
    pub fn is_achievable(&self, total: u64) -> bool {
        self.dist(total).is_some_and(|base| base <= total)
    }

    /// Smallest achievable total that is at least `quantity`.
    ///
    /// Scans every reachable residue class and lifts its baseline by multiples
    /// of `m` until it reaches `quantity`. Residue 0 is always reachable, so a
    /// target always exists.
    pub fn smallest_at_least(&self, quantity: u64) -> Target {
        let m = self.modulus;
        let mut best = Target {
            total: u64::MAX,
            residue: 0,
            base: 0,
        };
        for (residue, cost) in self.tree.cost.iter().enumerate() {
            if *cost == UNREACHABLE {
                continue;
            }
            let base = cost.0;
            let total = if base >= quantity {
                base
            } else {
                base + (quantity - base).div_ceil(m) * m
            };
            if total < best.total {
                best = Target {
                    total,
                    residue: residue as u64,
                    base,
                };
            }
        }
        best
    }

    /// Minimal-total combination for `residue` (fewest packs among those).
    pub fn base_combination(&self, residue: u64) -> Option<PackBreakdown> {
        self.tree.reconstruct((residue % self.modulus) as usize)
    }

    /// Breakdown reaching `target.total` exactly: the residue's base
    /// combination plus `(total - base) / m` packs of the smallest size.
    pub fn breakdown_for(&self, target: &Target) -> PackBreakdown {
        let mut breakdown = self
            .base_combination(target.residue)
            .unwrap_or_default();
        breakdown.add(self.modulus, (target.total - target.base) / self.modulus);
        breakdown
    }
}

/// An achievable total chosen by `ResidueGraph::smallest_at_least`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target {
    /// The achievable total.
    pub total: u64,
    /// `total mod m`.
    pub residue: u64,
    /// Smallest achievable total in the same residue class.
    pub base: u64,
}

/// Pack-count graph modulo the largest pack size `M`.
///
/// Moves use only sizes `c < M` and cost `M - c`. The distance to residue `r`
/// is the minimum of `count * M - sum` over such multisets with
/// `sum ≡ r (mod M)`. Topping the multiset up with packs of size `M` to reach a
/// total `T` uses `(cost + T) / M` packs, which is minimal whenever the
/// multiset does not overshoot `T`.
#[derive(Clone, Debug)]
pub struct PackCountGraph {
    modulus: u64,
    tree: ShortestPathTree,
}

impl PackCountGraph {
    pub fn build(sizes: &[u64]) -> Self {
        let largest = sizes.last().copied().unwrap_or(1);
        let moves: Vec<Move> = sizes
            .iter()
            .filter(|&&size| size < largest)
            .map(|&size| Move {
                size,
                step: size as usize,
                cost: (largest - size, size),
            })
            .collect();

        let tree = ShortestPathTree::solve(largest as usize, &moves);
        tracing::debug!(nodes = largest, "built pack-count graph");

        Self {
            modulus: largest,
            tree,
        }
    }

    /// Fewest-pack breakdown summing exactly to `target`.
    ///
    /// Returns `None` when the residue of `target` is unreachable or when the
    /// cheapest multiset of smaller packs already exceeds `target`.
    pub fn fewest_packs_for(&self, target: u64) -> Option<PackBreakdown> {
        let node = (target % self.modulus) as usize;
        let mut breakdown = self.tree.reconstruct(node)?;
        let partial = self.tree.cost[node].1;
        if partial > target {
            return None;
        }
        breakdown.add(self.modulus, (target - partial) / self.modulus);
        Some(breakdown)
    }
}
