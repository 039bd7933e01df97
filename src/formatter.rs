//! Presentation of pack breakdowns.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::PackBreakdown;

/// One line of a formatted breakdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct PackLine {
    #[schema(example = 5000)]
    pub size: u64,
    #[schema(example = 2)]
    pub quantity: u64,
}

/// Lists the breakdown as `{size, quantity}` pairs ordered by descending size.
pub fn format_breakdown(breakdown: &PackBreakdown) -> Vec<PackLine> {
    breakdown
        .iter()
        .rev()
        .map(|(size, quantity)| PackLine { size, quantity })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_ordered_by_descending_size() {
        let breakdown: PackBreakdown = [(250, 1), (5000, 2), (2000, 1)].into_iter().collect();
        let lines = format_breakdown(&breakdown);
        assert_eq!(
            lines,
            vec![
                PackLine { size: 5000, quantity: 2 },
                PackLine { size: 2000, quantity: 1 },
                PackLine { size: 250, quantity: 1 },
            ]
        );
    }

    #[test]
    fn empty_breakdown_formats_to_empty_list() {
        assert!(format_breakdown(&PackBreakdown::new()).is_empty());
    }

    #[test]
    fn serializes_with_size_and_quantity_fields() {
        let json = serde_json::to_value(PackLine { size: 23, quantity: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({ "size": 23, "quantity": 4 }));
    }
}
