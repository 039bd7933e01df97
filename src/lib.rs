//! Pack breakdown calculator.
//!
//! Ships whole packs only: for an ordered quantity the optimizer picks the
//! combination of configured pack sizes with the smallest total that covers
//! the order and, among those, the fewest packs.

pub mod api;
pub mod config;
pub mod error;
pub mod formatter;
pub mod model;
pub mod optimizer;
pub mod rate_limit;
pub mod registry;
pub mod residue;
pub mod service;
pub mod store;
