//! FILENAME: pivot-aggregation/src/definition.rs
//! Pivot Definition - The serializable inputs and configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot snapshot.
//! These structures are designed to be:
//! - Deserialized straight from the data service payload
//! - Immutable snapshots handed over once per data refresh
//! - Cheap to build by hand in tests

use serde::{Deserialize, Serialize};
use crate::error::{PivotError, PivotResult};

/// The primary aggregated metric. Counts are non-negative integers.
pub type Count = u64;

// ============================================================================
// AXIS
// ============================================================================

/// Which side of the cross-tabulation a key or group lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Row,
    Column,
}

impl Axis {
    pub fn label(self) -> &'static str {
        match self {
            Axis::Row => "row",
            Axis::Column => "col",
        }
    }
}

// ============================================================================
// FACTS AND TOTALS
// ============================================================================

/// One observed measurement for a (row, column) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotFact {
    #[serde(rename = "row_dimension")]
    pub row_key: String,

    #[serde(rename = "col_dimension")]
    pub col_key: String,

    pub count: Count,

    /// Secondary metric. Passed through on individual cells only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_duration: Option<f64>,
}

impl PivotFact {
    pub fn new(row_key: impl Into<String>, col_key: impl Into<String>, count: Count) -> Self {
        PivotFact {
            row_key: row_key.into(),
            col_key: col_key.into(),
            count,
            avg_duration: None,
        }
    }

    pub fn with_avg_duration(mut self, avg_duration: f64) -> Self {
        self.avg_duration = Some(avg_duration);
        self
    }
}

/// Precomputed total for one row or column key, with its optional group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionTotal {
    pub dimension: String,
    pub total: Count,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl DimensionTotal {
    pub fn new(dimension: impl Into<String>, total: Count) -> Self {
        DimensionTotal {
            dimension: dimension.into(),
            total,
            group_name: None,
        }
    }

    pub fn in_group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrandTotal {
    pub count: Count,
}

// ============================================================================
// GROUPING
// ============================================================================

/// Declared group names per axis, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingInfo {
    #[serde(default)]
    pub row_groups: Option<Vec<String>>,
    #[serde(default)]
    pub col_groups: Option<Vec<String>>,
}

impl GroupingInfo {
    pub fn declared(&self, axis: Axis) -> Option<&[String]> {
        match axis {
            Axis::Row => self.row_groups.as_deref(),
            Axis::Column => self.col_groups.as_deref(),
        }
    }
}

/// Grouping is only honored when `enabled` is set, whatever `info` says.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingConfig {
    pub enabled: bool,
    #[serde(default)]
    pub info: GroupingInfo,
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// A completed, immutable data snapshot from the data service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotSnapshot {
    #[serde(default)]
    pub pivot_data: Vec<PivotFact>,

    #[serde(default)]
    pub row_totals: Option<Vec<DimensionTotal>>,

    #[serde(default)]
    pub col_totals: Option<Vec<DimensionTotal>>,

    /// Advisory only; the engine always sums the facts itself.
    #[serde(default)]
    pub grand_total: Option<GrandTotal>,

    #[serde(default)]
    pub grouping: Option<GroupingConfig>,
}

impl PivotSnapshot {
    pub fn new(facts: Vec<PivotFact>) -> Self {
        PivotSnapshot {
            pivot_data: facts,
            ..Default::default()
        }
    }

    /// Parses a snapshot payload.
    pub fn from_json(json: &str) -> PivotResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_row_totals(mut self, totals: Vec<DimensionTotal>) -> Self {
        self.row_totals = Some(totals);
        self
    }

    pub fn with_col_totals(mut self, totals: Vec<DimensionTotal>) -> Self {
        self.col_totals = Some(totals);
        self
    }

    pub fn with_grand_total(mut self, count: Count) -> Self {
        self.grand_total = Some(GrandTotal { count });
        self
    }

    /// Enables grouping with the given declared group names.
    pub fn with_grouping(mut self, row_groups: Option<Vec<String>>, col_groups: Option<Vec<String>>) -> Self {
        self.grouping = Some(GroupingConfig {
            enabled: true,
            info: GroupingInfo { row_groups, col_groups },
        });
        self
    }

    pub fn is_grouping_enabled(&self) -> bool {
        self.grouping.as_ref().map_or(false, |g| g.enabled)
    }

    pub fn totals(&self, axis: Axis) -> Option<&[DimensionTotal]> {
        match axis {
            Axis::Row => self.row_totals.as_deref(),
            Axis::Column => self.col_totals.as_deref(),
        }
    }

    pub fn declared_groups(&self, axis: Axis) -> Option<&[String]> {
        self.grouping.as_ref().and_then(|g| g.info.declared(axis))
    }
}

// ============================================================================
// OPTIONS
// ============================================================================

/// How to display data cell values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowValuesAs {
    Normal,
    PercentOfGrandTotal,
    PercentOfRowTotal,
    PercentOfColumnTotal,
}

impl Default for ShowValuesAs {
    fn default() -> Self {
        ShowValuesAs::Normal
    }
}

/// Rendering configuration for the pivot view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotOptions {
    pub show_values_as: ShowValuesAs,

    /// Number of discrete heat buckets for data cells.
    pub intensity_levels: u8,

    /// Text shown for a pair with no fact.
    pub empty_cell_label: String,

    /// Emit the total column and total row.
    pub show_totals: bool,
}

impl Default for PivotOptions {
    fn default() -> Self {
        PivotOptions {
            show_values_as: ShowValuesAs::Normal,
            intensity_levels: 5,
            empty_cell_label: "-".to_string(),
            show_totals: true,
        }
    }
}

impl PivotOptions {
    pub fn from_json(json: &str) -> PivotResult<Self> {
        let options: PivotOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> PivotResult<()> {
        if self.intensity_levels == 0 {
            return Err(PivotError::InvalidOptions(
                "intensity_levels must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
