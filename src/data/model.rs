use std::collections::BTreeMap;
use std::fmt;

use crate::error::{NoseError, Result};

// ---------------------------------------------------------------------------
// CellValue – a single parsed cell before column typing
// ---------------------------------------------------------------------------

/// A dynamically-typed cell as produced by the loaders, before the
/// per-column type inference in [`Table::from_cells`].
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Null => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – ordered, typed columns
// ---------------------------------------------------------------------------

/// Values of one column. Missing numeric cells are stored as NaN,
/// missing text cells as the empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn is_numeric(&self) -> bool {
        matches!(self.values, ColumnValues::Numeric(_))
    }

    /// Numeric values of this column, if it is a numeric column.
    pub fn numeric(&self) -> Option<&[f64]> {
        match &self.values {
            ColumnValues::Numeric(v) => Some(v),
            ColumnValues::Text(_) => None,
        }
    }
}

/// A parsed tabular recording: ordered named columns of equal length.
///
/// A column is numeric when every non-null cell is a number and at least
/// one cell is non-null; all other columns are kept as text and pass
/// through calibration unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table from header names and row-major cells, inferring the
    /// type of each column. Short rows are padded with nulls.
    pub fn from_cells(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let n_rows = rows.len();
        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(col_idx, name)| {
                let cells: Vec<&CellValue> = rows
                    .iter()
                    .map(|row| row.get(col_idx).unwrap_or(&CellValue::Null))
                    .collect();

                let numeric = cells.iter().any(|c| !matches!(c, CellValue::Null))
                    && cells
                        .iter()
                        .all(|c| matches!(c, CellValue::Number(_) | CellValue::Null));

                let values = if numeric {
                    ColumnValues::Numeric(
                        cells
                            .iter()
                            .map(|c| match c {
                                CellValue::Number(v) => *v,
                                _ => f64::NAN,
                            })
                            .collect(),
                    )
                } else {
                    ColumnValues::Text(cells.iter().map(|c| c.to_string()).collect())
                };

                Column { name, values }
            })
            .collect();

        Table { columns, n_rows }
    }

    /// Build a table directly from named numeric channels (used by tests
    /// and the action protocol's synthetic fixtures).
    pub fn from_numeric_columns(columns: Vec<(String, Vec<f64>)>) -> Self {
        let n_rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        Table {
            columns: columns
                .into_iter()
                .map(|(name, values)| Column {
                    name,
                    values: ColumnValues::Numeric(values),
                })
                .collect(),
            n_rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Names of the numeric channels, in table order.
    pub fn numeric_channel_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Iterate over the numeric channels as `(name, values)` pairs.
    pub fn numeric_channels(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().filter_map(|c| match &c.values {
            ColumnValues::Numeric(v) => Some((c.name.as_str(), v.as_slice())),
            ColumnValues::Text(_) => None,
        })
    }

    /// Snapshot of all numeric channel values at one row, in table order.
    /// Returns `None` when the row is out of range.
    pub fn feature_vector_at(&self, row: usize) -> Option<Vec<f64>> {
        if row >= self.n_rows {
            return None;
        }
        Some(
            self.numeric_channels()
                .map(|(_, values)| values[row])
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Dataset – raw plus derived corrected table
// ---------------------------------------------------------------------------

/// One uploaded recording: the raw table and the calibration-corrected
/// table derived from it. `corrected == raw` while no calibration is
/// applied; recalibration always re-derives `corrected` from `raw`.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub raw: Table,
    pub corrected: Table,
}

impl Dataset {
    pub fn new(name: impl Into<String>, raw: Table) -> Self {
        let corrected = raw.clone();
        Dataset {
            name: name.into(),
            raw,
            corrected,
        }
    }

    /// Drop any applied calibration.
    pub fn reset_corrected(&mut self) {
        self.corrected = self.raw.clone();
    }

    pub fn is_calibrated(&self) -> bool {
        self.corrected != self.raw
    }
}

// ---------------------------------------------------------------------------
// DatasetStore – all uploaded datasets, keyed by name
// ---------------------------------------------------------------------------

/// Owns every uploaded [`Dataset`], keyed by name, and tracks which one
/// is active. Upload order is preserved for display.
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    datasets: BTreeMap<String, Dataset>,
    upload_order: Vec<String>,
    active: Option<String>,
}

impl DatasetStore {
    /// Add a parsed table under `name`. A name already present is a
    /// no-op reported as `DuplicateName`.
    pub fn ingest(&mut self, name: &str, table: Table) -> Result<()> {
        if self.datasets.contains_key(name) {
            return Err(NoseError::DuplicateName {
                name: name.to_string(),
            });
        }
        self.datasets
            .insert(name.to_string(), Dataset::new(name, table));
        self.upload_order.push(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Dataset> {
        self.datasets.get_mut(name)
    }

    /// Make `name` the active dataset. The caller is responsible for the
    /// per-dataset resets (calibration spec, baseline points, pending
    /// selection) that a switch implies.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.datasets.contains_key(name) {
            return Err(NoseError::UnknownDataset {
                name: name.to_string(),
            });
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&Dataset> {
        self.active.as_deref().and_then(|n| self.datasets.get(n))
    }

    pub fn active_mut(&mut self) -> Option<&mut Dataset> {
        let name = self.active.clone()?;
        self.datasets.get_mut(&name)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Dataset names in upload order.
    pub fn names(&self) -> &[String] {
        &self.upload_order
    }
}
