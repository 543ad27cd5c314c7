use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Table};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a sensor recording from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row of channel names, one sample per row
/// * `.json`    – `[{ "ch1": 0.41, "ch2": 0.38, "phase": "baseline" }, ...]`
/// * `.parquet` – wide table of primitive columns
///
/// Each file yields one [`Table`]; column types (numeric channel vs.
/// text) are inferred per column from the cell contents.
pub fn load_table(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    if table.is_empty() {
        bail!("File contains no data rows");
    }
    log::info!(
        "Loaded {} ({} rows, {} numeric channels)",
        path.display(),
        table.n_rows(),
        table.numeric_channel_names().len()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with channel names, one sample per row.
/// Cells that parse as numbers become channel values; anything else is
/// kept as text and the whole column falls back to a text column.
fn load_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(guess_cell).collect());
    }

    Ok(Table::from_cells(headers, rows))
}

fn guess_cell(s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(v) = s.parse::<f64>() {
        return CellValue::Number(v);
    }
    CellValue::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default
/// `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "ch1": 0.41, "ch2": 0.38, "phase": "baseline" },
///   { "ch1": 0.45, "ch2": 0.37, "phase": "odor" }
/// ]
/// ```
///
/// Columns are the union of all record keys, sorted by name; keys
/// missing from a record become nulls.
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut keys: BTreeSet<String> = BTreeSet::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        keys.extend(obj.keys().cloned());
    }
    let headers: Vec<String> = keys.into_iter().collect();

    let mut rows = Vec::with_capacity(records.len());
    for rec in records {
        let obj = rec.as_object().expect("checked above");
        rows.push(
            headers
                .iter()
                .map(|key| json_to_cell(obj.get(key)))
                .collect(),
        );
    }

    Ok(Table::from_cells(headers, rows))
}

fn json_to_cell(val: Option<&JsonValue>) -> CellValue {
    match val {
        None | Some(JsonValue::Null) => CellValue::Null,
        Some(JsonValue::Number(n)) => match n.as_f64() {
            Some(f) => CellValue::Number(f),
            None => CellValue::Text(n.to_string()),
        },
        Some(JsonValue::String(s)) => CellValue::Text(s.clone()),
        Some(JsonValue::Bool(b)) => CellValue::Text(b.to_string()),
        Some(other) => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing a wide sensor table.
///
/// Expected schema: primitive columns only (Float64/Float32/Int64/Int32
/// become numeric channels; Utf8 and Boolean become text columns).
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<CellValue>> = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        if headers.is_empty() {
            headers = schema.fields().iter().map(|f| f.name().clone()).collect();
        }

        for row in 0..batch.num_rows() {
            let cells: Vec<CellValue> = (0..batch.num_columns())
                .map(|col_idx| extract_cell(batch.column(col_idx), row))
                .collect();
            rows.push(cells);
        }
    }

    Ok(Table::from_cells(headers, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>().unwrap();
            CellValue::Number(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col.as_any().downcast_ref::<Float32Array>().unwrap();
            CellValue::Number(arr.value(row) as f64)
        }
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>().unwrap();
            CellValue::Number(arr.value(row) as f64)
        }
        DataType::Int32 => {
            let arr = col.as_any().downcast_ref::<Int32Array>().unwrap();
            CellValue::Number(arr.value(row) as f64)
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
                CellValue::Text(s.value(row).to_string())
            } else {
                // LargeStringArray
                let s = col.as_string::<i64>();
                CellValue::Text(s.value(row).to_string())
            }
        }
        DataType::Boolean => {
            let arr = col.as_any().downcast_ref::<BooleanArray>().unwrap();
            CellValue::Text(arr.value(row).to_string())
        }
        _ => CellValue::Text(format!("{:?}", col.data_type())),
    }
}
