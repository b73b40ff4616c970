//! FILENAME: pivot-aggregation/src/state.rs
//! Collapse/expand state and the controller that owns one data view.
//!
//! `CollapsedGroups` is a plain value: actions produce a new value through
//! `CollapsedGroups::apply` and never mutate a shared set in place.
//! `PivotTableState` holds the current snapshot's cache, the resolved groups
//! and the collapse state, and memoizes the projection on
//! `(data_version, collapsed)`.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use crate::cache::FactCache;
use crate::definition::{Axis, PivotOptions, PivotSnapshot};
use crate::engine::{calculate_projection, drill_down, AxisKey, DrillDownResult, PivotProjection};
use crate::error::PivotResult;
use crate::grouping::{resolve_groups, ResolvedGroups};
use crate::view::{build_view, PivotView};
use crate::{log_debug, log_info};

// ============================================================================
// COLLAPSED GROUPS
// ============================================================================

/// Group names currently collapsed, per axis. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollapsedGroups {
    rows: BTreeSet<String>,
    cols: BTreeSet<String>,
}

impl CollapsedGroups {
    pub fn new() -> Self {
        CollapsedGroups::default()
    }

    pub fn rows(&self) -> &BTreeSet<String> {
        &self.rows
    }

    pub fn cols(&self) -> &BTreeSet<String> {
        &self.cols
    }

    pub fn set(&self, axis: Axis) -> &BTreeSet<String> {
        match axis {
            Axis::Row => &self.rows,
            Axis::Column => &self.cols,
        }
    }

    fn set_mut(&mut self, axis: Axis) -> &mut BTreeSet<String> {
        match axis {
            Axis::Row => &mut self.rows,
            Axis::Column => &mut self.cols,
        }
    }

    pub fn is_collapsed(&self, axis: Axis, name: &str) -> bool {
        self.set(axis).contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.cols.is_empty()
    }

    /// Returns the state after `action`. `groups` supplies the names used by
    /// collapse-all, which replaces the axis set rather than extending it.
    pub fn apply(&self, action: &CollapseAction, groups: &ResolvedGroups) -> CollapsedGroups {
        let mut next = self.clone();
        match action {
            CollapseAction::Toggle { axis, name } => {
                let set = next.set_mut(*axis);
                if !set.remove(name) {
                    set.insert(name.clone());
                }
            }
            CollapseAction::ExpandAll(axis) => next.set_mut(*axis).clear(),
            CollapseAction::CollapseAll(axis) => {
                *next.set_mut(*axis) = groups.names(*axis).into_iter().collect();
            }
        }
        next
    }
}

/// A user interaction on the collapse state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollapseAction {
    Toggle { axis: Axis, name: String },
    ExpandAll(Axis),
    CollapseAll(Axis),
}

impl CollapseAction {
    pub fn toggle(axis: Axis, name: impl Into<String>) -> Self {
        CollapseAction::Toggle { axis, name: name.into() }
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

struct ProjectionMemo {
    data_version: u64,
    collapsed: CollapsedGroups,
    projection: PivotProjection,
}

/// Owns one data view: the current snapshot, its groups and the collapse state.
pub struct PivotTableState {
    options: PivotOptions,

    /// Identity of the query that produced the current snapshot.
    dataset_key: Option<String>,

    cache: FactCache,
    groups: ResolvedGroups,
    collapsed: CollapsedGroups,

    /// Bumped on every load.
    data_version: u64,

    memo: Option<ProjectionMemo>,
    recompute_count: u64,
}

impl PivotTableState {
    pub fn new(options: PivotOptions) -> PivotResult<Self> {
        options.validate()?;
        Ok(PivotTableState {
            options,
            dataset_key: None,
            cache: FactCache::default(),
            groups: ResolvedGroups::default(),
            collapsed: CollapsedGroups::default(),
            data_version: 0,
            memo: None,
            recompute_count: 0,
        })
    }

    /// Ingests a snapshot. A different `dataset_key` (new query or filter
    /// combination) resets the collapse state; the same key keeps it.
    /// Returns true when the collapse state was reset.
    pub fn load(&mut self, dataset_key: &str, snapshot: &PivotSnapshot) -> bool {
        let identity_changed = self.dataset_key.as_deref() != Some(dataset_key);

        self.cache = FactCache::build(snapshot);
        self.groups = resolve_groups(snapshot, &self.cache);
        self.data_version += 1;

        if identity_changed {
            self.dataset_key = Some(dataset_key.to_string());
            self.collapsed = CollapsedGroups::default();
        }

        log_info!(
            "STATE",
            "load key={} facts={} rows={} cols={} row_groups={} col_groups={} reset={}",
            dataset_key,
            self.cache.stats.fact_count,
            self.cache.rows.len(),
            self.cache.cols.len(),
            self.groups.rows.as_ref().map_or(0, |g| g.len()),
            self.groups.cols.as_ref().map_or(0, |g| g.len()),
            identity_changed
        );

        identity_changed
    }

    pub fn dispatch(&mut self, action: CollapseAction) {
        self.collapsed = self.collapsed.apply(&action, &self.groups);
        log_debug!(
            "STATE",
            "{:?} -> collapsed rows={:?} cols={:?}",
            action,
            self.collapsed.rows(),
            self.collapsed.cols()
        );
    }

    pub fn toggle_row_group(&mut self, name: &str) {
        self.dispatch(CollapseAction::toggle(Axis::Row, name));
    }

    pub fn toggle_col_group(&mut self, name: &str) {
        self.dispatch(CollapseAction::toggle(Axis::Column, name));
    }

    pub fn expand_all_row_groups(&mut self) {
        self.dispatch(CollapseAction::ExpandAll(Axis::Row));
    }

    pub fn collapse_all_row_groups(&mut self) {
        self.dispatch(CollapseAction::CollapseAll(Axis::Row));
    }

    pub fn expand_all_col_groups(&mut self) {
        self.dispatch(CollapseAction::ExpandAll(Axis::Column));
    }

    pub fn collapse_all_col_groups(&mut self) {
        self.dispatch(CollapseAction::CollapseAll(Axis::Column));
    }

    /// The projection for the current data and collapse state.
    pub fn projection(&mut self) -> &PivotProjection {
        let stale = self.memo.as_ref().map_or(true, |memo| {
            memo.data_version != self.data_version || memo.collapsed != self.collapsed
        });
        if stale {
            self.memo = None;
        } else {
            log_debug!("STATE", "projection memo hit version={}", self.data_version);
        }

        let memo = self.memo.get_or_insert_with(|| {
            self.recompute_count += 1;
            ProjectionMemo {
                data_version: self.data_version,
                collapsed: self.collapsed.clone(),
                projection: calculate_projection(&self.cache, &self.groups, &self.collapsed),
            }
        });
        &memo.projection
    }

    pub fn view(&mut self) -> PivotView {
        let options = self.options.clone();
        let version = self.data_version;
        build_view(self.projection(), &options, version)
    }

    pub fn drill_down(&mut self, row: &AxisKey, col: &AxisKey, max_records: usize) -> DrillDownResult {
        drill_down(self.projection(), row, col, max_records)
    }

    pub fn set_options(&mut self, options: PivotOptions) -> PivotResult<()> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn options(&self) -> &PivotOptions {
        &self.options
    }

    pub fn collapsed(&self) -> &CollapsedGroups {
        &self.collapsed
    }

    pub fn groups(&self) -> &ResolvedGroups {
        &self.groups
    }

    pub fn cache(&self) -> &FactCache {
        &self.cache
    }

    pub fn dataset_key(&self) -> Option<&str> {
        self.dataset_key.as_deref()
    }

    pub fn data_version(&self) -> u64 {
        self.data_version
    }

    /// Number of full projection rebuilds so far.
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }
}
