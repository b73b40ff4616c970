//! FILENAME: pivot-aggregation/src/cache.rs
//! Fact Cache - O(1) lookup structures over the flat fact table.
//!
//! The cache is designed for:
//! - A single O(n) build per data snapshot
//! - Stable display order (supplied totals first, then first-seen in facts)
//! - Collision-free cell keys (tuple of interned ids, no string joining)
//!
//! Architecture:
//! - Each row/column key is interned once and referenced by `DimId`
//! - Cells are keyed by `(row_id, col_id)`
//! - Individual row/column totals are stored per `DimId`

use rustc_hash::FxHashMap;
use crate::definition::{Axis, Count, DimensionTotal, PivotSnapshot};
use crate::log_warn;

// ============================================================================
// KEY INTERNING
// ============================================================================

/// A reference to an interned row or column key.
pub type DimId = u32;

/// Ordered store of the distinct keys of one axis.
#[derive(Debug, Clone, Default)]
pub struct DimensionCache {
    /// Map from key to its id (for deduplication during build).
    key_to_id: FxHashMap<String, DimId>,

    /// Keys in display order, indexed by `DimId`.
    id_to_key: Vec<String>,
}

impl DimensionCache {
    pub fn new() -> Self {
        DimensionCache::default()
    }

    /// Interns a key and returns its id. Existing keys keep their position.
    pub fn intern(&mut self, key: &str) -> DimId {
        if let Some(&id) = self.key_to_id.get(key) {
            return id;
        }

        let id = self.id_to_key.len() as DimId;
        self.id_to_key.push(key.to_string());
        self.key_to_id.insert(key.to_string(), id);
        id
    }

    pub fn id_of(&self, key: &str) -> Option<DimId> {
        self.key_to_id.get(key).copied()
    }

    pub fn key(&self, id: DimId) -> Option<&str> {
        self.id_to_key.get(id as usize).map(String::as_str)
    }

    /// All keys in display order.
    pub fn keys(&self) -> &[String] {
        &self.id_to_key
    }

    pub fn len(&self) -> usize {
        self.id_to_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_key.is_empty()
    }
}

// ============================================================================
// CELL RECORD
// ============================================================================

/// The measurement stored for one individual (row, column) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRecord {
    pub count: Count,
    pub avg_duration: Option<f64>,
}

/// Statistics about the cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub fact_count: usize,
    pub duplicate_facts: usize,
    pub supplied_row_totals: usize,
    pub supplied_col_totals: usize,
}

// ============================================================================
// MAIN CACHE STRUCT
// ============================================================================

/// Interned keys, the sparse cell map, and individual-level totals.
#[derive(Debug, Clone, Default)]
pub struct FactCache {
    pub rows: DimensionCache,
    pub cols: DimensionCache,

    cells: FxHashMap<(DimId, DimId), CellRecord>,

    /// Indexed by `DimId`.
    row_totals: Vec<Count>,
    col_totals: Vec<Count>,

    grand_total: Count,

    pub stats: CacheStats,
}

impl FactCache {
    /// Builds the cache from a snapshot.
    pub fn build(snapshot: &PivotSnapshot) -> Self {
        let mut cache = FactCache::default();
        cache.stats.fact_count = snapshot.pivot_data.len();

        // Supplied totals fix the intended display order.
        let supplied_rows = intern_totals(&mut cache.rows, snapshot.totals(Axis::Row));
        let supplied_cols = intern_totals(&mut cache.cols, snapshot.totals(Axis::Column));
        cache.stats.supplied_row_totals = supplied_rows.len();
        cache.stats.supplied_col_totals = supplied_cols.len();

        cache.cells.reserve(snapshot.pivot_data.len());
        let mut derived_rows: Vec<Count> = Vec::new();
        let mut derived_cols: Vec<Count> = Vec::new();

        for fact in &snapshot.pivot_data {
            let row_id = cache.rows.intern(&fact.row_key);
            let col_id = cache.cols.intern(&fact.col_key);

            let record = CellRecord {
                count: fact.count,
                avg_duration: fact.avg_duration,
            };
            if cache.cells.insert((row_id, col_id), record).is_some() {
                cache.stats.duplicate_facts += 1;
                log_warn!(
                    "CACHE",
                    "duplicate fact for ({}, {}); last one wins",
                    fact.row_key,
                    fact.col_key
                );
            }

            add_at(&mut derived_rows, row_id, fact.count);
            add_at(&mut derived_cols, col_id, fact.count);
            cache.grand_total = cache.grand_total.saturating_add(fact.count);
        }

        cache.row_totals = merge_totals(cache.rows.len(), &supplied_rows, &derived_rows);
        cache.col_totals = merge_totals(cache.cols.len(), &supplied_cols, &derived_cols);

        if let Some(supplied) = snapshot.grand_total {
            if supplied.count != cache.grand_total {
                log_warn!(
                    "CACHE",
                    "supplied grand total {} differs from fact sum {}",
                    supplied.count,
                    cache.grand_total
                );
            }
        }

        cache
    }

    pub fn cell(&self, row: DimId, col: DimId) -> Option<&CellRecord> {
        self.cells.get(&(row, col))
    }

    /// Looks up an individual cell by its keys.
    pub fn cell_by_key(&self, row_key: &str, col_key: &str) -> Option<&CellRecord> {
        let row = self.rows.id_of(row_key)?;
        let col = self.cols.id_of(col_key)?;
        self.cell(row, col)
    }

    /// Iterates over every stored cell as `(row_id, col_id, record)`.
    pub fn cells(&self) -> impl Iterator<Item = (DimId, DimId, &CellRecord)> {
        self.cells.iter().map(|(&(r, c), record)| (r, c, record))
    }

    pub fn row_total(&self, row: DimId) -> Count {
        self.row_totals.get(row as usize).copied().unwrap_or(0)
    }

    pub fn col_total(&self, col: DimId) -> Count {
        self.col_totals.get(col as usize).copied().unwrap_or(0)
    }

    pub fn axis(&self, axis: Axis) -> &DimensionCache {
        match axis {
            Axis::Row => &self.rows,
            Axis::Column => &self.cols,
        }
    }

    /// Sum of `count` over every fact.
    pub fn grand_total(&self) -> Count {
        self.grand_total
    }

    /// Largest individual cell count (0 when there are no cells).
    pub fn max_cell_count(&self) -> Count {
        self.cells.values().map(|c| c.count).max().unwrap_or(0)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// Interns the dimensions of a totals list in order and returns the
/// supplied total per id (first entry wins for repeated dimensions).
fn intern_totals(dims: &mut DimensionCache, totals: Option<&[DimensionTotal]>) -> FxHashMap<DimId, Count> {
    let mut supplied = FxHashMap::default();
    for total in totals.unwrap_or(&[]) {
        let id = dims.intern(&total.dimension);
        supplied.entry(id).or_insert(total.total);
    }
    supplied
}

fn add_at(totals: &mut Vec<Count>, id: DimId, count: Count) {
    let idx = id as usize;
    if totals.len() <= idx {
        totals.resize(idx + 1, 0);
    }
    totals[idx] = totals[idx].saturating_add(count);
}

/// Supplied totals take precedence; keys without one fall back to the fact sum.
fn merge_totals(len: usize, supplied: &FxHashMap<DimId, Count>, derived: &[Count]) -> Vec<Count> {
    (0..len)
        .map(|idx| {
            supplied
                .get(&(idx as DimId))
                .copied()
                .unwrap_or_else(|| derived.get(idx).copied().unwrap_or(0))
        })
        .collect()
}
