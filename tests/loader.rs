//! File-format round trips through the loader.

use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempdir::TempDir;

use rusty_nose::data::loader::load_table;

#[test]
fn csv_with_text_column_loads() {
    let dir = TempDir::new("loader").unwrap();
    let path = dir.path().join("run.csv");
    let mut file = File::create(&path).unwrap();
    writeln!(file, "t,MQ2,MQ3,phase").unwrap();
    writeln!(file, "0,120.5,95.1,baseline").unwrap();
    writeln!(file, "1,121.0,94.8,odor").unwrap();
    writeln!(file, "2,,94.9,odor").unwrap();
    drop(file);

    let table = load_table(&path).unwrap();
    assert_eq!(table.n_rows(), 3);
    assert_eq!(table.numeric_channel_names(), vec!["t", "MQ2", "MQ3"]);
    assert!(!table.column("phase").unwrap().is_numeric());

    // Empty cell in a numeric column becomes NaN.
    let mq2 = table.column("MQ2").unwrap().numeric().unwrap();
    assert!(mq2[2].is_nan());
}

#[test]
fn json_records_load_with_union_of_keys() {
    let dir = TempDir::new("loader").unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(
        &path,
        r#"[
            { "ch1": 0.41, "ch2": 0.38, "phase": "baseline" },
            { "ch1": 0.45, "phase": "odor" }
        ]"#,
    )
    .unwrap();

    let table = load_table(&path).unwrap();
    assert_eq!(table.n_rows(), 2);
    // Keys are sorted; ch2 missing from row 1 becomes NaN.
    assert_eq!(table.numeric_channel_names(), vec!["ch1", "ch2"]);
    let ch2 = table.column("ch2").unwrap().numeric().unwrap();
    assert_eq!(ch2[0], 0.38);
    assert!(ch2[1].is_nan());
}

#[test]
fn parquet_wide_table_loads() {
    let dir = TempDir::new("loader").unwrap();
    let path = dir.path().join("run.parquet");

    let schema = Arc::new(Schema::new(vec![
        Field::new("MQ2", DataType::Float64, false),
        Field::new("t", DataType::Int64, false),
        Field::new("phase", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(vec![120.5, 121.0, 122.3])),
            Arc::new(Int64Array::from(vec![0, 1, 2])),
            Arc::new(StringArray::from(vec!["baseline", "odor", "odor"])),
        ],
    )
    .unwrap();

    let file = File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let table = load_table(&path).unwrap();
    assert_eq!(table.n_rows(), 3);
    assert_eq!(table.numeric_channel_names(), vec!["MQ2", "t"]);
    assert_eq!(table.column("MQ2").unwrap().numeric().unwrap()[2], 122.3);
    assert!(!table.column("phase").unwrap().is_numeric());
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = TempDir::new("loader").unwrap();
    let path = dir.path().join("run.xlsx");
    std::fs::write(&path, b"not a spreadsheet").unwrap();
    let err = load_table(&path).unwrap_err();
    assert!(err.to_string().contains("Unsupported file extension"));
}

#[test]
fn empty_csv_is_rejected() {
    let dir = TempDir::new("loader").unwrap();
    let path = dir.path().join("empty.csv");
    std::fs::write(&path, "t,MQ2\n").unwrap();
    let err = load_table(&path).unwrap_err();
    assert!(err.to_string().contains("no data rows"));
}
