//! FILENAME: pivot-aggregation/src/lib.rs
//! Collapsible cross-tabulation over a flat (row, column, count) fact table.
//!
//! The crate takes an already-fetched data snapshot, indexes it, and exposes a
//! projection with cell values, row/column/grand totals and a heat-map scale.
//! One level of row and column grouping is supported; collapsing a group
//! re-aggregates its members on the fly. Everything is recomputed from
//! (facts, groups, collapse state); no aggregate is ever patched in place.
//!
//! Layers:
//! - `definition`: Serializable input snapshot and options (what we GET)
//! - `cache`: Interned keys and O(1) cell lookups (HOW we index)
//! - `grouping`: Row/column group resolution
//! - `engine`: Aggregation into a projection (HOW we calculate)
//! - `state`: Collapse/expand controller with a memoized projection
//! - `view`: Renderable grid for the frontend (WHAT we display)

pub mod logging;
pub mod error;
pub mod definition;
pub mod cache;
pub mod grouping;
pub mod engine;
pub mod state;
pub mod view;

pub use error::{PivotError, PivotResult};
pub use definition::*;
pub use cache::{CellRecord, DimId, FactCache};
pub use grouping::{resolve_groups, GroupEntry, GroupMap, ResolvedGroups};
pub use engine::{
    calculate_projection, drill_down, safe_ratio,
    AxisKey, DrillDownRecord, DrillDownResult, PivotProjection,
};
pub use state::{CollapseAction, CollapsedGroups, PivotTableState};
pub use view::*;
