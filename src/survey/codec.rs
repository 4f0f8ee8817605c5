//! Conversion between sheets and persisted rows.
//!
//! Encoding drops zero cells and turns sentinels back into NULL; decoding
//! does the reverse and skips anything outside the table vocabulary.

use crate::models::{Row, Scope};
use crate::survey::input::{coerce_count, MAX_COUNT};
use crate::survey::key::CellKey;
use crate::survey::schema::{Dimension, DimensionKind, Layout, TableSchema};
use crate::survey::sheet::Sheet;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Outcome of decoding a batch of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Non-zero cells loaded into the sheet.
    pub cells: usize,
    /// Rows or columns ignored because they did not fit the vocabulary.
    pub skipped: usize,
}

/// Rows to persist for `sheet` within `scope`, in key order.
pub fn encode(sheet: &Sheet, scope: Scope) -> Vec<Row> {
    let schema = sheet.schema();
    match schema.layout {
        Layout::Long { value_column } => sheet
            .entries()
            .filter(|(_, count)| *count > 0)
            .map(|(key, count)| {
                let mut row = scope.row();
                write_dimensions(&mut row, &schema.dimensions, key.values());
                row.insert(value_column.to_string(), Value::from(count));
                row
            })
            .collect(),
        Layout::GenderWide => {
            let gender_columns = schema.blocks[0].axes()[schema.arity() - 1];
            let mut grouped: BTreeMap<&[String], Row> = BTreeMap::new();

            for (key, count) in sheet.entries().filter(|(_, count)| *count > 0) {
                let row = grouped.entry(key.prefix()).or_insert_with(|| {
                    let mut row = scope.row();
                    write_dimensions(&mut row, &schema.dimensions, key.prefix());
                    for column in gender_columns {
                        row.insert(column.to_string(), Value::from(0u64));
                    }
                    row
                });
                if let Some(gender) = key.values().last() {
                    row.insert(gender.clone(), Value::from(count));
                }
            }
            grouped.into_values().collect()
        }
        Layout::SingleRow { .. } => {
            let mut row = scope.row();
            for key in schema.cells() {
                row.insert(TableSchema::wide_column(&key), Value::from(sheet.get(&key)));
            }
            vec![row]
        }
    }
}

/// Load `rows` into `sheet`. Existing cells are kept; callers clear first.
pub fn decode(sheet: &mut Sheet, rows: &[Row]) -> DecodeReport {
    let mut report = DecodeReport::default();
    let schema = sheet.schema().clone();

    match schema.layout {
        Layout::Long { value_column } => {
            for row in rows {
                let Some(values) = read_dimensions(row, &schema.dimensions) else {
                    report.skipped += 1;
                    continue;
                };
                let count = read_count(row.get(value_column));
                store(sheet, &schema, &values, count, &mut report);
            }
        }
        Layout::GenderWide => {
            let dims = &schema.dimensions[..schema.arity() - 1];
            let genders = schema.blocks[0].axes()[schema.arity() - 1];
            for row in rows {
                let Some(prefix) = read_dimensions(row, dims) else {
                    report.skipped += 1;
                    continue;
                };
                for gender in genders {
                    let mut values = prefix.clone();
                    values.push(gender.to_string());
                    let count = read_count(row.get(*gender));
                    store(sheet, &schema, &values, count, &mut report);
                }
            }
        }
        Layout::SingleRow { .. } => {
            if rows.len() > 1 {
                warn!(
                    "{} rows for single-row table {}, using the first",
                    rows.len(),
                    schema.name
                );
            }
            if let Some(row) = rows.first() {
                for key in schema.cells() {
                    let count = read_count(row.get(&TableSchema::wide_column(&key)));
                    if count > 0 {
                        store_key(sheet, key, count, &mut report);
                    }
                }
            }
        }
    }

    debug!(
        "Decoded {} cells into {} ({} skipped)",
        report.cells, schema.name, report.skipped
    );
    report
}

fn store(
    sheet: &mut Sheet,
    schema: &TableSchema,
    values: &[String],
    count: u64,
    report: &mut DecodeReport,
) {
    if count == 0 {
        return;
    }
    match schema.key(values) {
        Ok(key) => store_key(sheet, key, count, report),
        Err(e) => {
            warn!("Skipping persisted row: {}", e);
            report.skipped += 1;
        }
    }
}

fn store_key(sheet: &mut Sheet, key: CellKey, count: u64, report: &mut DecodeReport) {
    match sheet.set(key, count) {
        Ok(()) => report.cells += 1,
        Err(e) => {
            warn!("Skipping persisted cell: {}", e);
            report.skipped += 1;
        }
    }
}

fn write_dimensions(row: &mut Row, dimensions: &[Dimension], values: &[String]) {
    for (dimension, value) in dimensions.iter().zip(values) {
        row.insert(dimension.name.to_string(), dimension_value(dimension, value));
    }
}

/// Persisted form of one dimension value.
fn dimension_value(dimension: &Dimension, value: &str) -> Value {
    if dimension.null_sentinel == Some(value) {
        return Value::Null;
    }
    match dimension.kind {
        DimensionKind::Integer => value
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(value)),
        DimensionKind::Text => Value::from(value),
    }
}

fn read_dimensions(row: &Row, dimensions: &[Dimension]) -> Option<Vec<String>> {
    dimensions
        .iter()
        .map(|dimension| match row.get(dimension.name) {
            None | Some(Value::Null) => dimension.null_sentinel.map(String::from),
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                warn!("Unexpected value {} for {}", other, dimension.name);
                None
            }
        })
        .collect()
}

fn read_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .map_or(0, |v| v.min(MAX_COUNT)),
        Some(Value::String(s)) => coerce_count(s),
        _ => 0,
    }
}
