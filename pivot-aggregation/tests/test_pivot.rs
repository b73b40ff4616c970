//! FILENAME: tests/test_pivot.rs
//! Integration tests for the pivot table state, projection and view.

mod common;

use common::{loaded_state, StaffingFixture};
use pivot_aggregation::{
    Axis, AxisKey, CollapseAction, PivotCellType, PivotFact, PivotOptions, PivotSnapshot,
    PivotTableState, ShowValuesAs,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn item(key: &str) -> AxisKey {
    AxisKey::item(key)
}

fn group(name: &str) -> AxisKey {
    AxisKey::group(name)
}

/// Every combination of collapse actions over the fixture's groups.
fn collapse_combinations() -> Vec<Vec<CollapseAction>> {
    let rows = [None, Some("East"), Some("West")];
    let cols = [None, Some("Billed"), Some("Unbilled")];
    let mut combos = Vec::new();
    for r in rows {
        for c in cols {
            let mut actions = Vec::new();
            if let Some(name) = r {
                actions.push(CollapseAction::toggle(Axis::Row, name));
            }
            if let Some(name) = c {
                actions.push(CollapseAction::toggle(Axis::Column, name));
            }
            combos.push(actions);
        }
    }
    combos.push(vec![
        CollapseAction::CollapseAll(Axis::Row),
        CollapseAction::CollapseAll(Axis::Column),
    ]);
    combos
}

// ============================================================================
// EXAMPLE SCENARIO
// ============================================================================

#[test]
fn test_ungrouped_example_from_json() {
    let snapshot = PivotSnapshot::from_json(StaffingFixture::json()).unwrap();
    let mut state = loaded_state("example", &snapshot);
    let p = state.projection();

    assert_eq!(p.row_total(&item("SBU-A")), 14);
    assert_eq!(p.row_total(&item("SBU-B")), 6);
    assert_eq!(p.col_total(&item("Billable")), 16);
    assert_eq!(p.col_total(&item("NonBillable")), 4);
    assert_eq!(p.grand_total(), 20);
    assert_eq!(p.cell_value(&item("SBU-B"), &item("NonBillable")), None);
}

// ============================================================================
// AGGREGATION PROPERTIES
// ============================================================================

#[test]
fn test_grand_total_invariant_under_collapse() {
    for actions in collapse_combinations() {
        let mut state = loaded_state("staffing", &StaffingFixture::grouped());
        for action in &actions {
            state.dispatch(action.clone());
        }
        let p = state.projection();
        assert_eq!(p.grand_total(), StaffingFixture::fact_sum(), "actions: {:?}", actions);

        // The displayed row totals still add up to the grand total.
        let displayed: u64 = p.row_axis.iter().map(|row| p.row_total(row)).sum();
        assert_eq!(displayed, StaffingFixture::fact_sum(), "actions: {:?}", actions);
    }
}

#[test]
fn test_collapsed_row_group_cell_is_member_sum() {
    let mut state = loaded_state("staffing", &StaffingFixture::grouped());
    state.toggle_row_group("East");
    let p = state.projection();

    for col in ["Billable", "Bench", "Shadow", "Training"] {
        let a = p.cell("SBU-A", col).map_or(0, |c| c.count);
        let b = p.cell("SBU-B", col).map_or(0, |c| c.count);
        assert_eq!(p.cell_value(&group("East"), &item(col)), Some(a + b), "column {}", col);
    }
}

#[test]
fn test_individual_row_total_matches_cells() {
    let mut state = loaded_state("staffing", &StaffingFixture::flat());
    let p = state.projection();

    for row in &p.unique_rows {
        let sum: u64 = p
            .unique_cols
            .iter()
            .map(|col| p.cell_value(&item(row), &item(col)).unwrap_or(0))
            .sum();
        assert_eq!(p.row_total(&item(row)), sum, "row {}", row);
    }
}

#[test]
fn test_toggle_round_trip_restores_projection() {
    let mut state = loaded_state("staffing", &StaffingFixture::grouped());
    let before = state.projection().clone();

    state.toggle_row_group("West");
    state.toggle_col_group("Unbilled");
    assert_ne!(state.projection().row_axis, before.row_axis);

    state.toggle_row_group("West");
    state.toggle_col_group("Unbilled");
    let after = state.projection();

    assert_eq!(after.visible_rows, before.visible_rows);
    assert_eq!(after.visible_cols, before.visible_cols);
    assert_eq!(after.row_axis, before.row_axis);
    assert_eq!(after.col_axis, before.col_axis);
    assert_eq!(after.aggregated_cell_values, before.aggregated_cell_values);
    assert_eq!(after.aggregated_row_totals, before.aggregated_row_totals);
    assert_eq!(after.max_value(), before.max_value());
}

#[test]
fn test_collapse_all_is_idempotent_replace() {
    let mut state = loaded_state("staffing", &StaffingFixture::grouped());
    state.toggle_row_group("Stale");
    state.collapse_all_row_groups();
    let once = state.collapsed().clone();
    state.collapse_all_row_groups();

    assert_eq!(state.collapsed(), &once);
    let names: Vec<&str> = once.rows().iter().map(String::as_str).collect();
    assert_eq!(names, vec!["East", "West"]);
}

#[test]
fn test_max_value_tracks_collapse() {
    let snapshot = PivotSnapshot::new(vec![
        PivotFact::new("A", "X", 5),
        PivotFact::new("A", "Y", 3),
        PivotFact::new("B", "X", 2),
    ])
    .with_row_totals(vec![
        pivot_aggregation::DimensionTotal::new("A", 8).in_group("G1"),
        pivot_aggregation::DimensionTotal::new("B", 2).in_group("G1"),
    ])
    .with_grouping(Some(vec!["G1".to_string()]), None);
    let mut state = loaded_state("max", &snapshot);

    assert_eq!(state.projection().max_value(), 5);
    state.toggle_row_group("G1");
    assert!(state.projection().max_value() >= 10);
    state.toggle_row_group("G1");
    assert_eq!(state.projection().max_value(), 5);
}

#[test]
fn test_no_data_differs_from_zero() {
    let mut state = loaded_state("staffing", &StaffingFixture::flat());
    let p = state.projection();

    assert_eq!(p.cell_value(&item("SBU-A"), &item("Training")), Some(0));
    assert_eq!(p.cell_value(&item("SBU-D"), &item("Training")), None);
}

#[test]
fn test_empty_dataset() {
    let mut state = loaded_state("empty", &PivotSnapshot::from_json(r#"{"pivot_data": []}"#).unwrap());
    state.collapse_all_row_groups();
    state.toggle_col_group("Nothing");
    let p = state.projection();

    assert!(p.unique_rows.is_empty());
    assert!(p.unique_cols.is_empty());
    assert_eq!(p.grand_total(), 0);
    assert_eq!(p.max_value(), 0);
    assert_eq!(p.intensity(0), 0.0);

    let view = state.view();
    assert_eq!(view.row_count, 2);
    assert_eq!(view.get_cell(1, 1).unwrap().formatted_value, "0");
}

// ============================================================================
// GROUPING AND COLLAPSE
// ============================================================================

#[test]
fn test_collapsed_column_group_replaces_members_once() {
    let mut state = loaded_state("staffing", &StaffingFixture::grouped());
    state.toggle_col_group("Billed");
    let p = state.projection();

    assert_eq!(p.visible_cols, vec!["Bench".to_string(), "Training".to_string()]);
    assert_eq!(p.col_axis, vec![group("Billed"), item("Bench"), item("Training")]);
    assert_eq!(p.col_total(&group("Billed")), 28);
    assert_eq!(p.cell_value(&item("SBU-D"), &group("Billed")), Some(1));
    assert_eq!(p.cell_value(&item("SBU-C"), &group("Billed")), Some(8));
}

#[test]
fn test_both_axes_collapsed_corner_values() {
    let mut state = loaded_state("staffing", &StaffingFixture::grouped());
    state.collapse_all_row_groups();
    state.collapse_all_col_groups();
    let p = state.projection();

    assert_eq!(p.row_axis, vec![group("East"), group("West"), item("SBU-D")]);
    assert_eq!(p.col_axis, vec![group("Billed"), group("Unbilled")]);
    assert_eq!(p.cell_value(&group("East"), &group("Billed")), Some(19));
    assert_eq!(p.cell_value(&group("East"), &group("Unbilled")), Some(4));
    assert_eq!(p.cell_value(&group("West"), &group("Unbilled")), Some(7));
    assert_eq!(p.cell_value(&item("SBU-D"), &group("Unbilled")), Some(0));
    assert_eq!(p.max_value(), 28);
}

#[test]
fn test_disabled_grouping_ignores_group_names() {
    let mut snapshot = StaffingFixture::grouped();
    if let Some(grouping) = snapshot.grouping.as_mut() {
        grouping.enabled = false;
    }
    let mut state = loaded_state("staffing", &snapshot);
    state.collapse_all_row_groups();
    state.toggle_row_group("East");
    let p = state.projection();

    assert!(p.grouped_rows.is_none());
    assert!(p.grouped_cols.is_none());
    assert_eq!(p.visible_rows.len(), 4);
    assert!(p.aggregated_row_totals.is_empty());
}

#[test]
fn test_new_query_resets_collapse_state() {
    let mut state = loaded_state("staffing", &StaffingFixture::grouped());
    state.toggle_row_group("East");

    state.load("staffing", &StaffingFixture::grouped());
    assert!(state.projection().is_group_collapsed(Axis::Row, "East"));

    state.load("staffing?sbu=East", &StaffingFixture::grouped());
    assert!(state.collapsed().is_empty());
    assert!(!state.projection().is_group_collapsed(Axis::Row, "East"));
}

#[test]
fn test_drill_down_through_state() {
    let mut state = loaded_state("staffing", &StaffingFixture::grouped());
    state.toggle_row_group("East");
    let result = state.drill_down(&group("East"), &item("Billable"), 10);

    assert_eq!(result.total_count, 2);
    assert_eq!(result.total_value, 16);
    let keys: Vec<&str> = result.records.iter().map(|r| r.row_key.as_str()).collect();
    assert_eq!(keys, vec!["SBU-A", "SBU-B"]);
    assert_eq!(result.records[0].avg_duration, Some(41.0));
}

// ============================================================================
// VIEW
// ============================================================================

#[test]
fn test_view_of_collapsed_state() {
    let mut state = loaded_state("staffing", &StaffingFixture::grouped());
    state.toggle_row_group("East");
    let view = state.view();

    let east = view.cell_at(&group("East"), &item("Billable")).unwrap();
    assert_eq!(east.cell_type, PivotCellType::GroupData);
    assert_eq!(east.formatted_value, "16");
    assert_eq!(east.avg_duration, None);

    let empty = view.cell_at(&item("SBU-D"), &item("Bench")).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.formatted_value, "-");

    assert_eq!(view.grand_total, StaffingFixture::fact_sum());
    assert_eq!(view.version, state.data_version());
}

#[test]
fn test_view_percent_of_grand_total() {
    let options = PivotOptions {
        show_values_as: ShowValuesAs::PercentOfGrandTotal,
        ..Default::default()
    };
    let mut state = PivotTableState::new(options).unwrap();
    state.load("example", &PivotSnapshot::from_json(StaffingFixture::json()).unwrap());
    let view = state.view();

    let cell = view.cell_at(&item("SBU-A"), &item("Billable")).unwrap();
    assert_eq!(cell.formatted_value, "50.0%");
    let grand = view.get_cell(view.row_count - 1, view.col_count - 1).unwrap();
    assert_eq!(grand.formatted_value, "100.0%");
}
