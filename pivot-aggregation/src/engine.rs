//! FILENAME: pivot-aggregation/src/engine.rs
//! Pivot Engine - Turns the fact cache into a collapsible projection.
//!
//! This module takes a FactCache (data), ResolvedGroups (hierarchy) and
//! CollapsedGroups (UI state) and produces a PivotProjection.
//!
//! Algorithm:
//! 1. Copy individual-level lookups (cells, row/column totals) out of the cache
//! 2. Lay out each axis: individual keys stay inline, each collapsed group
//!    replaces its members once, at the position of its first member
//! 3. Sum member totals for every collapsed group
//! 4. Materialize a synthesized value for every rendered pair that involves a
//!    collapsed group (missing facts contribute 0)
//! 5. Take the max over individual cells and everything synthesized
//!
//! The projection is always rebuilt from scratch; nothing is patched in place.

use std::collections::BTreeSet;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use crate::cache::{CellRecord, FactCache};
use crate::definition::{Axis, Count};
use crate::grouping::{GroupMap, ResolvedGroups};
use crate::log_debug;
use crate::state::CollapsedGroups;

// ============================================================================
// AXIS KEYS
// ============================================================================

/// A position on one axis: an individual key or a (collapsed) group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AxisKey {
    Item(String),
    Group(String),
}

impl AxisKey {
    pub fn item(key: impl Into<String>) -> Self {
        AxisKey::Item(key.into())
    }

    pub fn group(name: impl Into<String>) -> Self {
        AxisKey::Group(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            AxisKey::Item(key) | AxisKey::Group(key) => key,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, AxisKey::Group(_))
    }
}

/// Individual keys an axis key stands for. Most lookups touch one key.
pub type Members<'a> = SmallVec<[&'a str; 8]>;

/// x / 0 is 0, never NaN.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

// ============================================================================
// PROJECTION
// ============================================================================

/// Everything the rendering layer needs for one (data, collapse state) pair.
#[derive(Debug, Clone, Default)]
pub struct PivotProjection {
    /// All row keys in display order.
    pub unique_rows: Vec<String>,
    /// All column keys in display order.
    pub unique_cols: Vec<String>,

    /// Individual rows not hidden by a collapsed group.
    pub visible_rows: Vec<String>,
    /// Individual columns not hidden by a collapsed group.
    pub visible_cols: Vec<String>,

    /// Render order of the row axis, collapsed groups included.
    pub row_axis: Vec<AxisKey>,
    /// Render order of the column axis, collapsed groups included.
    pub col_axis: Vec<AxisKey>,

    pub grouped_rows: Option<GroupMap>,
    pub grouped_cols: Option<GroupMap>,

    /// Individual cells: row key -> column key -> record.
    pub data_map: FxHashMap<String, FxHashMap<String, CellRecord>>,
    pub row_totals_map: FxHashMap<String, Count>,
    pub col_totals_map: FxHashMap<String, Count>,

    /// Populated only for currently collapsed groups.
    pub aggregated_row_totals: FxHashMap<String, Count>,
    pub aggregated_col_totals: FxHashMap<String, Count>,
    /// Every rendered pair that involves at least one collapsed group.
    pub aggregated_cell_values: FxHashMap<(AxisKey, AxisKey), Count>,

    pub grand_total: Count,
    pub max_value: Count,

    /// The collapse state this projection was computed for.
    pub collapsed: CollapsedGroups,
}

impl PivotProjection {
    pub fn grouped(&self, axis: Axis) -> Option<&GroupMap> {
        match axis {
            Axis::Row => self.grouped_rows.as_ref(),
            Axis::Column => self.grouped_cols.as_ref(),
        }
    }

    fn totals_map(&self, axis: Axis) -> &FxHashMap<String, Count> {
        match axis {
            Axis::Row => &self.row_totals_map,
            Axis::Column => &self.col_totals_map,
        }
    }

    fn aggregated_totals(&self, axis: Axis) -> &FxHashMap<String, Count> {
        match axis {
            Axis::Row => &self.aggregated_row_totals,
            Axis::Column => &self.aggregated_col_totals,
        }
    }

    pub fn group_of(&self, axis: Axis, key: &str) -> Option<&str> {
        self.grouped(axis).and_then(|map| map.group_of(key))
    }

    /// True when `name` is a real group of this axis and is collapsed.
    pub fn is_group_collapsed(&self, axis: Axis, name: &str) -> bool {
        self.collapsed.is_collapsed(axis, name)
            && self.grouped(axis).map_or(false, |map| map.contains_group(name))
    }

    /// Resolves an axis key to the individual keys it covers.
    /// Unknown keys and unknown groups resolve to `None`.
    pub fn members(&self, axis: Axis, key: &AxisKey) -> Option<Members<'_>> {
        match key {
            AxisKey::Item(k) => {
                let (known, _) = self.totals_map(axis).get_key_value(k.as_str())?;
                Some(std::iter::once(known.as_str()).collect())
            }
            AxisKey::Group(g) => {
                let members = self.grouped(axis)?.members(g)?;
                Some(members.iter().map(String::as_str).collect())
            }
        }
    }

    /// Individual cell lookup.
    pub fn cell(&self, row_key: &str, col_key: &str) -> Option<&CellRecord> {
        self.data_map.get(row_key)?.get(col_key)
    }

    /// Value at a (row, column) position.
    ///
    /// Two individual keys give the stored fact, or `None` when there is no
    /// fact for the pair. If either key is a group the result is the sum over
    /// all member pairs, where missing facts count as 0.
    pub fn cell_value(&self, row: &AxisKey, col: &AxisKey) -> Option<Count> {
        if let (AxisKey::Item(r), AxisKey::Item(c)) = (row, col) {
            return self.cell(r, c).map(|record| record.count);
        }

        if let Some(&value) = self.aggregated_cell_values.get(&(row.clone(), col.clone())) {
            return Some(value);
        }

        let row_members = self.members(Axis::Row, row)?;
        let col_members = self.members(Axis::Column, col)?;
        Some(sum_cells(&self.data_map, &row_members, &col_members))
    }

    pub fn row_total(&self, key: &AxisKey) -> Count {
        self.axis_total(Axis::Row, key)
    }

    pub fn col_total(&self, key: &AxisKey) -> Count {
        self.axis_total(Axis::Column, key)
    }

    fn axis_total(&self, axis: Axis, key: &AxisKey) -> Count {
        match key {
            AxisKey::Item(k) => self.totals_map(axis).get(k).copied().unwrap_or(0),
            AxisKey::Group(g) => {
                if let Some(&total) = self.aggregated_totals(axis).get(g) {
                    return total;
                }
                self.grouped(axis)
                    .and_then(|map| map.members(g))
                    .map(|members| sum_totals(self.totals_map(axis), members.iter().map(String::as_str)))
                    .unwrap_or(0)
            }
        }
    }

    pub fn grand_total(&self) -> Count {
        self.grand_total
    }

    pub fn max_value(&self) -> Count {
        self.max_value
    }

    /// Proportional intensity in [0, 1] for visual scaling.
    pub fn intensity(&self, value: Count) -> f64 {
        safe_ratio(value as f64, self.max_value as f64).min(1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.unique_rows.is_empty() && self.unique_cols.is_empty()
    }
}

fn sum_cells(
    data_map: &FxHashMap<String, FxHashMap<String, CellRecord>>,
    rows: &[&str],
    cols: &[&str],
) -> Count {
    let mut sum: Count = 0;
    for row in rows {
        let Some(row_cells) = data_map.get(*row) else {
            continue;
        };
        for col in cols {
            if let Some(record) = row_cells.get(*col) {
                sum = sum.saturating_add(record.count);
            }
        }
    }
    sum
}

fn sum_totals<'a>(totals: &FxHashMap<String, Count>, keys: impl Iterator<Item = &'a str>) -> Count {
    keys.fold(0, |acc: Count, key| acc.saturating_add(totals.get(key).copied().unwrap_or(0)))
}

// ============================================================================
// PROJECTION CALCULATOR
// ============================================================================

/// Builds a projection from cache, groups and collapse state.
pub struct ProjectionCalculator<'a> {
    cache: &'a FactCache,
    groups: &'a ResolvedGroups,
    collapsed: &'a CollapsedGroups,
}

impl<'a> ProjectionCalculator<'a> {
    pub fn new(cache: &'a FactCache, groups: &'a ResolvedGroups, collapsed: &'a CollapsedGroups) -> Self {
        ProjectionCalculator { cache, groups, collapsed }
    }

    pub fn calculate(&self) -> PivotProjection {
        let mut projection = PivotProjection {
            unique_rows: self.cache.rows.keys().to_vec(),
            unique_cols: self.cache.cols.keys().to_vec(),
            grouped_rows: self.groups.rows.clone(),
            grouped_cols: self.groups.cols.clone(),
            grand_total: self.cache.grand_total(),
            collapsed: self.collapsed.clone(),
            ..Default::default()
        };

        // Step 1: individual-level lookups
        projection.data_map = self.build_data_map();
        projection.row_totals_map = self.build_totals_map(Axis::Row);
        projection.col_totals_map = self.build_totals_map(Axis::Column);

        // Step 2: axis layout
        let (visible_rows, row_axis) = self.layout_axis(Axis::Row);
        let (visible_cols, col_axis) = self.layout_axis(Axis::Column);
        projection.visible_rows = visible_rows;
        projection.visible_cols = visible_cols;
        projection.row_axis = row_axis;
        projection.col_axis = col_axis;

        // Step 3: collapsed group totals
        projection.aggregated_row_totals = self.aggregate_group_totals(Axis::Row, &projection.row_totals_map);
        projection.aggregated_col_totals = self.aggregate_group_totals(Axis::Column, &projection.col_totals_map);

        // Step 4: synthesized cells
        projection.aggregated_cell_values = self.aggregate_cells(&projection);

        // Step 5: scaling max
        projection.max_value = self
            .cache
            .max_cell_count()
            .max(max_of(projection.aggregated_cell_values.values()))
            .max(max_of(projection.aggregated_row_totals.values()))
            .max(max_of(projection.aggregated_col_totals.values()));

        log_debug!(
            "PIVOT",
            "projection rows={} cols={} visible={}x{} collapsed={}+{} synthesized={} max={} grand={}",
            projection.unique_rows.len(),
            projection.unique_cols.len(),
            projection.row_axis.len(),
            projection.col_axis.len(),
            projection.aggregated_row_totals.len(),
            projection.aggregated_col_totals.len(),
            projection.aggregated_cell_values.len(),
            projection.max_value,
            projection.grand_total
        );

        projection
    }

    fn build_data_map(&self) -> FxHashMap<String, FxHashMap<String, CellRecord>> {
        let mut data_map: FxHashMap<String, FxHashMap<String, CellRecord>> = FxHashMap::default();
        for (row_id, col_id, record) in self.cache.cells() {
            let (Some(row_key), Some(col_key)) = (self.cache.rows.key(row_id), self.cache.cols.key(col_id)) else {
                continue;
            };
            data_map
                .entry(row_key.to_string())
                .or_default()
                .insert(col_key.to_string(), *record);
        }
        data_map
    }

    fn build_totals_map(&self, axis: Axis) -> FxHashMap<String, Count> {
        self.cache
            .axis(axis)
            .keys()
            .iter()
            .enumerate()
            .map(|(id, key)| {
                let total = match axis {
                    Axis::Row => self.cache.row_total(id as u32),
                    Axis::Column => self.cache.col_total(id as u32),
                };
                (key.clone(), total)
            })
            .collect()
    }

    /// Collapsed group names that actually exist on this axis, in group order.
    fn effective_collapsed(&self, axis: Axis) -> Vec<&'a str> {
        let set: &BTreeSet<String> = self.collapsed.set(axis);
        match self.groups.axis(axis) {
            Some(map) => map.names().filter(|name| set.contains(*name)).collect(),
            None => Vec::new(),
        }
    }

    fn layout_axis(&self, axis: Axis) -> (Vec<String>, Vec<AxisKey>) {
        let keys = self.cache.axis(axis).keys();
        let map = self.groups.axis(axis);
        let set = self.collapsed.set(axis);

        let mut visible = Vec::with_capacity(keys.len());
        let mut layout = Vec::with_capacity(keys.len());
        let mut emitted: FxHashSet<&str> = FxHashSet::default();

        for key in keys {
            match map.and_then(|m| m.group_of(key)) {
                Some(group) if set.contains(group) => {
                    if emitted.insert(group) {
                        layout.push(AxisKey::group(group));
                    }
                }
                _ => {
                    visible.push(key.clone());
                    layout.push(AxisKey::item(key.clone()));
                }
            }
        }

        (visible, layout)
    }

    fn aggregate_group_totals(&self, axis: Axis, totals: &FxHashMap<String, Count>) -> FxHashMap<String, Count> {
        let Some(map) = self.groups.axis(axis) else {
            return FxHashMap::default();
        };
        self.effective_collapsed(axis)
            .into_iter()
            .filter_map(|name| {
                let members = map.members(name)?;
                Some((name.to_string(), sum_totals(totals, members.iter().map(String::as_str))))
            })
            .collect()
    }

    fn aggregate_cells(&self, projection: &PivotProjection) -> FxHashMap<(AxisKey, AxisKey), Count> {
        let mut values = FxHashMap::default();
        let any_collapsed = !projection.aggregated_row_totals.is_empty()
            || !projection.aggregated_col_totals.is_empty();
        if !any_collapsed {
            return values;
        }

        for row in &projection.row_axis {
            let Some(row_members) = projection.members(Axis::Row, row) else {
                continue;
            };
            for col in &projection.col_axis {
                if !row.is_group() && !col.is_group() {
                    continue;
                }
                let Some(col_members) = projection.members(Axis::Column, col) else {
                    continue;
                };
                let value = sum_cells(&projection.data_map, &row_members, &col_members);
                values.insert((row.clone(), col.clone()), value);
            }
        }
        values
    }
}

fn max_of<'a>(values: impl Iterator<Item = &'a Count>) -> Count {
    values.copied().max().unwrap_or(0)
}

// ============================================================================
// DRILL-DOWN
// ============================================================================

/// One individual fact behind a (possibly synthesized) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillDownRecord {
    pub row_key: String,
    pub col_key: String,
    pub count: Count,
    pub avg_duration: Option<f64>,
}

/// Result of a drill-down operation (showing the facts behind a cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillDownResult {
    pub row: AxisKey,
    pub col: AxisKey,

    /// The detail records, in display order.
    pub records: Vec<DrillDownRecord>,

    /// Total count of matching records.
    pub total_count: usize,

    /// Sum of `count` over all matching records (not only the returned ones).
    pub total_value: Count,

    /// Whether this is a partial result.
    pub is_truncated: bool,

    /// Maximum records that were fetched.
    pub max_records: usize,
}

impl DrillDownResult {
    pub fn new(row: AxisKey, col: AxisKey) -> Self {
        DrillDownResult {
            row,
            col,
            records: Vec::new(),
            total_count: 0,
            total_value: 0,
            is_truncated: false,
            max_records: 1000, // Default limit
        }
    }
}

/// Lists the individual facts that make up the cell at (row, col).
pub fn drill_down(
    projection: &PivotProjection,
    row: &AxisKey,
    col: &AxisKey,
    max_records: usize,
) -> DrillDownResult {
    let mut result = DrillDownResult::new(row.clone(), col.clone());
    result.max_records = max_records;

    let (Some(row_members), Some(col_members)) = (
        projection.members(Axis::Row, row),
        projection.members(Axis::Column, col),
    ) else {
        return result;
    };

    for row_key in &row_members {
        for col_key in &col_members {
            let Some(record) = projection.cell(row_key, col_key) else {
                continue;
            };
            result.total_count += 1;
            result.total_value = result.total_value.saturating_add(record.count);
            if result.records.len() < max_records {
                result.records.push(DrillDownRecord {
                    row_key: row_key.to_string(),
                    col_key: col_key.to_string(),
                    count: record.count,
                    avg_duration: record.avg_duration,
                });
            }
        }
    }

    result.is_truncated = result.total_count > max_records;
    result
}

/// Calculates a projection. This is the main entry point for the engine.
pub fn calculate_projection(
    cache: &FactCache,
    groups: &ResolvedGroups,
    collapsed: &CollapsedGroups,
) -> PivotProjection {
    ProjectionCalculator::new(cache, groups, collapsed).calculate()
}
