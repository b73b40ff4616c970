//! FILENAME: tests/common/mod.rs
//! Fixtures for pivot aggregation integration tests.

#![allow(dead_code)]

use pivot_aggregation::{
    DimensionTotal, PivotFact, PivotOptions, PivotSnapshot, PivotTableState,
};

/// Headcount by business unit (rows) and bill type (columns).
///
/// Rows: SBU-A, SBU-B in "East"; SBU-C in "West"; SBU-D ungrouped.
/// Columns: Billable, Shadow in "Billed"; Bench, Training in "Unbilled".
pub struct StaffingFixture;

impl StaffingFixture {
    pub fn facts() -> Vec<PivotFact> {
        vec![
            PivotFact::new("SBU-A", "Billable", 10).with_avg_duration(41.0),
            PivotFact::new("SBU-A", "Bench", 4).with_avg_duration(12.5),
            PivotFact::new("SBU-A", "Training", 0),
            PivotFact::new("SBU-B", "Billable", 6),
            PivotFact::new("SBU-B", "Shadow", 3),
            PivotFact::new("SBU-C", "Billable", 8),
            PivotFact::new("SBU-C", "Bench", 7),
            PivotFact::new("SBU-D", "Shadow", 1),
        ]
    }

    pub fn fact_sum() -> u64 {
        Self::facts().iter().map(|f| f.count).sum()
    }

    pub fn row_totals() -> Vec<DimensionTotal> {
        vec![
            DimensionTotal::new("SBU-A", 14).in_group("East"),
            DimensionTotal::new("SBU-B", 9).in_group("East"),
            DimensionTotal::new("SBU-C", 15).in_group("West"),
            DimensionTotal::new("SBU-D", 1),
        ]
    }

    pub fn col_totals() -> Vec<DimensionTotal> {
        vec![
            DimensionTotal::new("Billable", 24).in_group("Billed"),
            DimensionTotal::new("Bench", 11).in_group("Unbilled"),
            DimensionTotal::new("Shadow", 4).in_group("Billed"),
            DimensionTotal::new("Training", 0).in_group("Unbilled"),
        ]
    }

    /// Facts only, no totals, no grouping.
    pub fn flat() -> PivotSnapshot {
        PivotSnapshot::new(Self::facts())
    }

    /// Facts, totals and grouping on both axes.
    pub fn grouped() -> PivotSnapshot {
        PivotSnapshot::new(Self::facts())
            .with_row_totals(Self::row_totals())
            .with_col_totals(Self::col_totals())
            .with_grand_total(Self::fact_sum())
            .with_grouping(
                Some(vec!["East".to_string(), "West".to_string()]),
                Some(vec!["Billed".to_string(), "Unbilled".to_string()]),
            )
    }

    pub fn json() -> &'static str {
        r#"{
            "pivot_data": [
                {"row_dimension": "SBU-A", "col_dimension": "Billable", "count": 10},
                {"row_dimension": "SBU-A", "col_dimension": "NonBillable", "count": 4},
                {"row_dimension": "SBU-B", "col_dimension": "Billable", "count": 6}
            ]
        }"#
    }
}

/// A state loaded with `snapshot` under `key`.
pub fn loaded_state(key: &str, snapshot: &PivotSnapshot) -> PivotTableState {
    let mut state = PivotTableState::new(PivotOptions::default()).expect("default options are valid");
    state.load(key, snapshot);
    state
}
