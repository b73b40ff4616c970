//! FILENAME: pivot-aggregation/src/grouping.rs
//! Group resolution: which group (if any) each row/column key belongs to.
//!
//! Only one level of grouping exists. Group membership comes from the
//! `group_name` of each dimension total and is honored only when grouping is
//! enabled and the group is declared for that axis; anything else leaves the
//! key ungrouped.

use rustc_hash::FxHashMap;
use serde::Serialize;
use crate::cache::FactCache;
use crate::definition::{Axis, DimensionTotal, PivotSnapshot};
use crate::log_debug;

/// A named group and its member keys, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupEntry {
    pub name: String,
    pub members: Vec<String>,
}

/// Ordered group -> members mapping for one axis, plus the inverse lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupMap {
    groups: Vec<GroupEntry>,
    #[serde(skip)]
    member_to_group: FxHashMap<String, usize>,
}

impl GroupMap {
    fn push(&mut self, name: String, members: Vec<String>) {
        let idx = self.groups.len();
        for member in &members {
            self.member_to_group.entry(member.clone()).or_insert(idx);
        }
        self.groups.push(GroupEntry { name, members });
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupEntry> {
        self.groups.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn members(&self, group: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .map(|g| g.members.as_slice())
    }

    pub fn group_of(&self, key: &str) -> Option<&str> {
        self.member_to_group
            .get(key)
            .map(|&idx| self.groups[idx].name.as_str())
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g.name == group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Resolved groups for both axes. `None` means the axis is ungrouped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedGroups {
    pub rows: Option<GroupMap>,
    pub cols: Option<GroupMap>,
}

impl ResolvedGroups {
    pub fn axis(&self, axis: Axis) -> Option<&GroupMap> {
        match axis {
            Axis::Row => self.rows.as_ref(),
            Axis::Column => self.cols.as_ref(),
        }
    }

    /// Group names of one axis, in declared order.
    pub fn names(&self, axis: Axis) -> Vec<String> {
        self.axis(axis)
            .map(|map| map.names().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Resolves row and column groups for a snapshot whose facts are in `cache`.
pub fn resolve_groups(snapshot: &PivotSnapshot, cache: &FactCache) -> ResolvedGroups {
    if !snapshot.is_grouping_enabled() {
        return ResolvedGroups::default();
    }

    ResolvedGroups {
        rows: resolve_axis(
            Axis::Row,
            snapshot.declared_groups(Axis::Row),
            snapshot.totals(Axis::Row),
            cache.rows.keys(),
        ),
        cols: resolve_axis(
            Axis::Column,
            snapshot.declared_groups(Axis::Column),
            snapshot.totals(Axis::Column),
            cache.cols.keys(),
        ),
    }
}

fn resolve_axis(
    axis: Axis,
    declared: Option<&[String]>,
    totals: Option<&[DimensionTotal]>,
    ordered_keys: &[String],
) -> Option<GroupMap> {
    let declared = declared.filter(|d| !d.is_empty())?;

    // Key -> group name, restricted to declared groups. First assignment wins.
    let mut assignment: FxHashMap<&str, &str> = FxHashMap::default();
    for total in totals.unwrap_or(&[]) {
        let Some(group) = total.group_name.as_deref() else {
            continue;
        };
        if !declared.iter().any(|d| d == group) {
            log_debug!(
                "GROUPING",
                "{} '{}' references undeclared group '{}'; treated as ungrouped",
                axis.label(),
                total.dimension,
                group
            );
            continue;
        }
        assignment.entry(total.dimension.as_str()).or_insert(group);
    }

    let mut map = GroupMap::default();
    for (i, group) in declared.iter().enumerate() {
        if declared[..i].contains(group) {
            continue;
        }
        let members: Vec<String> = ordered_keys
            .iter()
            .filter(|key| assignment.get(key.as_str()) == Some(&group.as_str()))
            .cloned()
            .collect();
        if members.is_empty() {
            continue;
        }
        map.push(group.clone(), members);
    }

    Some(map)
}
