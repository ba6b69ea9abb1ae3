use crate::data::datatable::{DataColumn, DataRow, DataTable, DataType, DataValue};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Rows sampled for type inference
const TYPE_SAMPLE_SIZE: usize = 100;

/// Load a CSV file into a DataTable
pub fn load_csv_to_datatable<P: AsRef<Path>>(path: P, table_name: &str) -> Result<DataTable> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path.as_ref()))?;

    let mut table = load_csv_from_reader(file, table_name)?;
    table
        .metadata
        .insert("source_path".to_string(), path.as_ref().display().to_string());
    Ok(table)
}

/// Load CSV text from any reader; the first record is the header
pub fn load_csv_from_reader<R: Read>(reader: R, table_name: &str) -> Result<DataTable> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut string_rows = Vec::new();
    for result in reader.records() {
        let record = result.context("Malformed CSV record")?;
        string_rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    let mut table = build_table(table_name, headers, string_rows)?;
    table
        .metadata
        .insert("source_type".to_string(), "csv".to_string());
    Ok(table)
}

/// Load a JSON file (an array of objects) into a DataTable
pub fn load_json_to_datatable<P: AsRef<Path>>(path: P, table_name: &str) -> Result<DataTable> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open JSON file: {:?}", path.as_ref()))?;

    let json_data: Vec<JsonValue> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| "Failed to parse JSON file")?;

    let mut table = load_json_data_to_datatable(json_data, table_name)?;
    table
        .metadata
        .insert("source_path".to_string(), path.as_ref().display().to_string());
    Ok(table)
}

/// Load already-parsed JSON objects into a DataTable.
///
/// Columns follow the key order of the first object; keys that only appear
/// in later objects are appended in the order they are first seen.
pub fn load_json_data_to_datatable(data: Vec<JsonValue>, table_name: &str) -> Result<DataTable> {
    let mut column_names: Vec<String> = Vec::new();
    for item in &data {
        let obj = item
            .as_object()
            .context("JSON data must be an array of objects")?;
        for key in obj.keys() {
            if !column_names.contains(key) {
                column_names.push(key.clone());
            }
        }
    }

    let string_rows = data
        .iter()
        .filter_map(|item| item.as_object())
        .map(|obj| {
            column_names
                .iter()
                .map(|name| match obj.get(name) {
                    Some(JsonValue::Null) | None => String::new(),
                    Some(JsonValue::Bool(b)) => b.to_string(),
                    Some(JsonValue::Number(n)) => n.to_string(),
                    Some(JsonValue::String(s)) => s.clone(),
                    // Nested values are kept as their JSON text
                    Some(nested) => nested.to_string(),
                })
                .collect()
        })
        .collect();

    let mut table = build_table(table_name, column_names, string_rows)?;
    table
        .metadata
        .insert("source_type".to_string(), "json".to_string());
    Ok(table)
}

fn build_table(
    table_name: &str,
    column_names: Vec<String>,
    string_rows: Vec<Vec<String>>,
) -> Result<DataTable> {
    let mut table = DataTable::new(table_name);
    for name in &column_names {
        table.add_column(DataColumn::new(name));
    }

    let mut column_types = vec![DataType::Null; column_names.len()];
    for row in string_rows.iter().take(TYPE_SAMPLE_SIZE) {
        for (col_idx, value) in row.iter().enumerate() {
            if !value.is_empty() && col_idx < column_types.len() {
                let inferred = DataType::infer_from_string(value);
                column_types[col_idx] = column_types[col_idx].merge(&inferred);
            }
        }
    }

    for (column, data_type) in table.columns.iter_mut().zip(&column_types) {
        column.data_type = data_type.clone();
    }

    for string_row in string_rows {
        let values = string_row
            .iter()
            .zip(&column_types)
            .map(|(value, data_type)| DataValue::from_string(value, data_type))
            .collect();
        table
            .add_row(DataRow::new(values))
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    table.infer_column_types();

    debug!(
        "Loaded table '{}' with {} rows and {} columns",
        table.name,
        table.row_count(),
        table.column_count()
    );

    Ok(table)
}
