//! FILENAME: pivot-aggregation/src/view.rs
//! Pivot View - Renderable output for the frontend.
//!
//! This module transforms a projection into a 2D grid structure
//! that the frontend can render. It includes metadata for:
//! - Group membership and expand/collapse affordances
//! - Cell types (data, synthesized group data, totals)
//! - Heat-map intensity for proportional shading

use serde::{Deserialize, Serialize};
use crate::definition::{Axis, Count, PivotOptions, ShowValuesAs};
use crate::engine::{safe_ratio, AxisKey, PivotProjection};
use crate::error::PivotResult;

// ============================================================================
// CELL TYPES AND METADATA
// ============================================================================

/// The type of a cell in the pivot view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotCellType {
    /// Empty corner cell (top-left area).
    Corner,
    /// Row header label (individual key or collapsed group).
    RowHeader,
    /// Column header label (individual key or collapsed group).
    ColumnHeader,
    /// Individual (row, column) value.
    Data,
    /// Value synthesized from a collapsed group.
    GroupData,
    /// Total column.
    RowTotal,
    /// Total row.
    ColumnTotal,
    /// Grand total (intersection of the total row and total column).
    GrandTotal,
}

/// Display value for a pivot cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PivotCellValue {
    Empty,
    Number(f64),
    Text(String),
}

/// Background style hints for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackgroundStyle {
    Normal,
    Header,
    GroupHeader,
    Total,
    GrandTotal,
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        BackgroundStyle::Normal
    }
}

// ============================================================================
// VIEW CELL
// ============================================================================

/// A single cell in the pivot table view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotViewCell {
    pub value: PivotCellValue,

    pub cell_type: PivotCellType,

    /// Pre-formatted display string.
    pub formatted_value: String,

    /// Whether this header's group is collapsed.
    pub is_collapsed: bool,

    /// Whether this header carries the expand/collapse control of a group.
    pub is_expandable: bool,

    pub is_bold: bool,

    pub background_style: BackgroundStyle,

    /// `value / max_value`, in [0, 1]. Zero for headers and totals.
    pub intensity: f64,

    /// Discrete heat bucket, 0 for no data.
    pub intensity_level: u8,

    /// Secondary metric; only individual data cells carry it.
    pub avg_duration: Option<f64>,
}

impl PivotViewCell {
    fn base(value: PivotCellValue, formatted_value: String, cell_type: PivotCellType) -> Self {
        PivotViewCell {
            value,
            cell_type,
            formatted_value,
            is_collapsed: false,
            is_expandable: false,
            is_bold: false,
            background_style: BackgroundStyle::Normal,
            intensity: 0.0,
            intensity_level: 0,
            avg_duration: None,
        }
    }

    /// Creates a corner cell.
    pub fn corner() -> Self {
        let mut cell = Self::base(PivotCellValue::Empty, String::new(), PivotCellType::Corner);
        cell.background_style = BackgroundStyle::Header;
        cell
    }

    /// Creates a row or column header cell.
    pub fn header(label: &str, cell_type: PivotCellType) -> Self {
        let mut cell = Self::base(PivotCellValue::Text(label.to_string()), label.to_string(), cell_type);
        cell.background_style = BackgroundStyle::Header;
        cell.is_bold = cell_type == PivotCellType::ColumnHeader;
        cell
    }

    /// Creates a data cell for a pair with no fact.
    pub fn no_data(label: &str, cell_type: PivotCellType) -> Self {
        Self::base(PivotCellValue::Empty, label.to_string(), cell_type)
    }

    /// Creates a data cell.
    pub fn data(display: f64, formatted_value: String, cell_type: PivotCellType) -> Self {
        Self::base(PivotCellValue::Number(display), formatted_value, cell_type)
    }

    /// Sets expandable state.
    pub fn with_expandable(mut self, expandable: bool, collapsed: bool) -> Self {
        self.is_expandable = expandable;
        self.is_collapsed = collapsed;
        if collapsed {
            self.background_style = BackgroundStyle::GroupHeader;
        }
        self
    }

    /// Sets cell as a total.
    pub fn as_total(mut self) -> Self {
        self.is_bold = true;
        self.background_style = if self.cell_type == PivotCellType::GrandTotal {
            BackgroundStyle::GrandTotal
        } else {
            BackgroundStyle::Total
        };
        self
    }

    pub fn with_intensity(mut self, intensity: f64, levels: u8) -> Self {
        self.intensity = intensity;
        self.intensity_level = intensity_level(intensity, levels);
        self
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.value, PivotCellValue::Empty)
    }
}

/// Buckets an intensity in [0, 1] into `1..=levels`; 0 stays 0.
pub fn intensity_level(intensity: f64, levels: u8) -> u8 {
    if intensity <= 0.0 || levels == 0 {
        return 0;
    }
    let level = (intensity * levels as f64).ceil();
    (level as u8).clamp(1, levels)
}

// ============================================================================
// ROW AND COLUMN DESCRIPTORS
// ============================================================================

/// Types of rows in the pivot view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotRowType {
    ColumnHeader,
    Data,
    /// A collapsed group standing in for its members.
    Group,
    GrandTotal,
}

/// Describes a row in the pivot view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotRowDescriptor {
    pub view_row: usize,
    pub row_type: PivotRowType,
    pub key: Option<AxisKey>,
    /// The group this row belongs to (or is).
    pub group_name: Option<String>,
    /// First rendered row of its group; carries the toggle.
    pub is_group_start: bool,
}

/// Types of columns in the pivot view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotColumnType {
    RowLabel,
    Data,
    Group,
    GrandTotal,
}

/// Describes a column in the pivot view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotColumnDescriptor {
    pub view_col: usize,
    pub col_type: PivotColumnType,
    pub key: Option<AxisKey>,
    pub group_name: Option<String>,
    pub is_group_start: bool,
}

// ============================================================================
// MAIN VIEW STRUCT
// ============================================================================

/// The complete rendered view of a pivot table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotView {
    /// Indexed as cells[row][col].
    pub cells: Vec<Vec<PivotViewCell>>,
    pub rows: Vec<PivotRowDescriptor>,
    pub columns: Vec<PivotColumnDescriptor>,
    pub row_count: usize,
    pub col_count: usize,
    pub grand_total: Count,
    pub max_value: Count,
    /// Data version for cache coherency with the frontend.
    pub version: u64,
}

impl PivotView {
    pub fn get_cell(&self, row: usize, col: usize) -> Option<&PivotViewCell> {
        self.cells.get(row).and_then(|r| r.get(col))
    }

    pub fn find_row(&self, key: &AxisKey) -> Option<usize> {
        self.rows.iter().position(|r| r.key.as_ref() == Some(key))
    }

    pub fn find_column(&self, key: &AxisKey) -> Option<usize> {
        self.columns.iter().position(|c| c.key.as_ref() == Some(key))
    }

    /// The cell at the intersection of a row key and a column key.
    pub fn cell_at(&self, row: &AxisKey, col: &AxisKey) -> Option<&PivotViewCell> {
        self.get_cell(self.find_row(row)?, self.find_column(col)?)
    }

    pub fn to_json(&self) -> PivotResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// VIEW GENERATION
// ============================================================================

/// Converts a count into its displayed number for the given mode.
pub fn display_value(
    value: Count,
    row_total: Count,
    col_total: Count,
    grand_total: Count,
    mode: ShowValuesAs,
) -> f64 {
    let value = value as f64;
    match mode {
        ShowValuesAs::Normal => value,
        ShowValuesAs::PercentOfGrandTotal => safe_ratio(value, grand_total as f64) * 100.0,
        ShowValuesAs::PercentOfRowTotal => safe_ratio(value, row_total as f64) * 100.0,
        ShowValuesAs::PercentOfColumnTotal => safe_ratio(value, col_total as f64) * 100.0,
    }
}

fn format_display(display: f64, mode: ShowValuesAs) -> String {
    match mode {
        ShowValuesAs::Normal => format!("{}", display),
        _ => format!("{:.1}%", display),
    }
}

/// Group name and group-start flag for each entry of an axis layout.
fn axis_group_info(projection: &PivotProjection, axis: Axis, layout: &[AxisKey]) -> Vec<(Option<String>, bool)> {
    let mut seen: Vec<&str> = Vec::new();
    layout
        .iter()
        .map(|key| {
            let group = match key {
                AxisKey::Group(name) => Some(name.as_str()),
                AxisKey::Item(k) => projection.group_of(axis, k),
            };
            match group {
                Some(name) => {
                    let is_start = !seen.contains(&name);
                    if is_start {
                        seen.push(name);
                    }
                    (Some(name.to_string()), is_start)
                }
                None => (None, false),
            }
        })
        .collect()
}

fn header_cell(key: &AxisKey, cell_type: PivotCellType, is_group_start: bool) -> PivotViewCell {
    let collapsed = key.is_group();
    PivotViewCell::header(key.name(), cell_type).with_expandable(collapsed || is_group_start, collapsed)
}

fn data_cell(projection: &PivotProjection, row: &AxisKey, col: &AxisKey, options: &PivotOptions) -> PivotViewCell {
    let synthesized = row.is_group() || col.is_group();
    let cell_type = if synthesized { PivotCellType::GroupData } else { PivotCellType::Data };

    let Some(count) = projection.cell_value(row, col) else {
        return PivotViewCell::no_data(&options.empty_cell_label, cell_type);
    };

    let mode = options.show_values_as;
    let display = display_value(
        count,
        projection.row_total(row),
        projection.col_total(col),
        projection.grand_total(),
        mode,
    );

    let mut cell = PivotViewCell::data(display, format_display(display, mode), cell_type)
        .with_intensity(projection.intensity(count), options.intensity_levels);
    if !synthesized {
        cell.avg_duration = projection
            .cell(row.name(), col.name())
            .and_then(|record| record.avg_duration);
    }
    cell
}

fn total_cell(value: Count, row_total: Count, col_total: Count, grand: Count, cell_type: PivotCellType, mode: ShowValuesAs) -> PivotViewCell {
    let display = display_value(value, row_total, col_total, grand, mode);
    PivotViewCell::data(display, format_display(display, mode), cell_type).as_total()
}

/// Lays out the projection as a grid: one header row, one row per row-axis
/// entry, then the total row; one label column, one column per column-axis
/// entry, then the total column.
pub fn build_view(projection: &PivotProjection, options: &PivotOptions, version: u64) -> PivotView {
    let mode = options.show_values_as;
    let grand = projection.grand_total();
    let row_info = axis_group_info(projection, Axis::Row, &projection.row_axis);
    let col_info = axis_group_info(projection, Axis::Column, &projection.col_axis);

    // Columns
    let mut columns = Vec::with_capacity(projection.col_axis.len() + 2);
    columns.push(PivotColumnDescriptor {
        view_col: 0,
        col_type: PivotColumnType::RowLabel,
        key: None,
        group_name: None,
        is_group_start: false,
    });
    for (key, (group_name, is_group_start)) in projection.col_axis.iter().zip(&col_info) {
        columns.push(PivotColumnDescriptor {
            view_col: columns.len(),
            col_type: if key.is_group() { PivotColumnType::Group } else { PivotColumnType::Data },
            key: Some(key.clone()),
            group_name: group_name.clone(),
            is_group_start: *is_group_start,
        });
    }
    if options.show_totals {
        columns.push(PivotColumnDescriptor {
            view_col: columns.len(),
            col_type: PivotColumnType::GrandTotal,
            key: None,
            group_name: None,
            is_group_start: false,
        });
    }

    let mut cells: Vec<Vec<PivotViewCell>> = Vec::with_capacity(projection.row_axis.len() + 2);
    let mut rows = Vec::with_capacity(projection.row_axis.len() + 2);

    // Header row
    let mut header = Vec::with_capacity(columns.len());
    header.push(PivotViewCell::corner());
    for (key, (_, is_group_start)) in projection.col_axis.iter().zip(&col_info) {
        header.push(header_cell(key, PivotCellType::ColumnHeader, *is_group_start));
    }
    if options.show_totals {
        header.push(PivotViewCell::header("Total", PivotCellType::ColumnHeader));
    }
    cells.push(header);
    rows.push(PivotRowDescriptor {
        view_row: 0,
        row_type: PivotRowType::ColumnHeader,
        key: None,
        group_name: None,
        is_group_start: false,
    });

    // Data rows
    for (row, (group_name, is_group_start)) in projection.row_axis.iter().zip(&row_info) {
        let mut line = Vec::with_capacity(columns.len());
        line.push(header_cell(row, PivotCellType::RowHeader, *is_group_start));
        for col in &projection.col_axis {
            line.push(data_cell(projection, row, col, options));
        }
        if options.show_totals {
            let total = projection.row_total(row);
            line.push(total_cell(total, total, grand, grand, PivotCellType::RowTotal, mode));
        }
        rows.push(PivotRowDescriptor {
            view_row: cells.len(),
            row_type: if row.is_group() { PivotRowType::Group } else { PivotRowType::Data },
            key: Some(row.clone()),
            group_name: group_name.clone(),
            is_group_start: *is_group_start,
        });
        cells.push(line);
    }

    // Total row
    if options.show_totals {
        let mut line = Vec::with_capacity(columns.len());
        line.push(PivotViewCell::header("Total", PivotCellType::RowHeader).as_total());
        for col in &projection.col_axis {
            let total = projection.col_total(col);
            line.push(total_cell(total, grand, total, grand, PivotCellType::ColumnTotal, mode));
        }
        line.push(total_cell(grand, grand, grand, grand, PivotCellType::GrandTotal, mode));
        rows.push(PivotRowDescriptor {
            view_row: cells.len(),
            row_type: PivotRowType::GrandTotal,
            key: None,
            group_name: None,
            is_group_start: false,
        });
        cells.push(line);
    }

    PivotView {
        row_count: cells.len(),
        col_count: columns.len(),
        cells,
        rows,
        columns,
        grand_total: grand,
        max_value: projection.max_value(),
        version,
    }
}
