//! Sheet-to-record mapping.
//!
//! A sheet is a 2-D array of string cells whose first row holds the field
//! names. Every following row becomes one [`Record`].

use crate::error::CrmError;
use crate::hints;
use crate::record::{FieldMap, Record, ensure_notes};
use serde_json::Value;

/// Knobs for [`map_sheet_with`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MapOptions {
    /// Rename columns through the Italian header hints.
    pub apply_hints: bool,
}

/// Maps `rows` (header row first) to records with verbatim headers.
///
/// Record `i` (0-based, header excluded) gets id `"{sheet_name}-{i}"` and
/// section `sheet_name`. A sheet without data rows maps to no records.
///
/// # Examples
/// ```
/// use sheetcrm::mapper::map_sheet;
///
/// let rows = vec![
///     vec!["Company".to_string(), "Notes".to_string()],
///     vec!["Acme".to_string(), String::new()],
/// ];
/// let records = map_sheet("sheet", &rows);
/// assert_eq!(records[0].id, "sheet-0");
/// assert_eq!(records[0].get("Company"), "Acme");
/// ```
pub fn map_sheet(sheet_name: &str, rows: &[Vec<String>]) -> Vec<Record> {
    map_sheet_with(sheet_name, rows, MapOptions::default())
}

pub fn map_sheet_with(sheet_name: &str, rows: &[Vec<String>], options: MapOptions) -> Vec<Record> {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Vec::new();
    };

    let headers = resolve_headers(header_row, options);

    data_rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut data = pair_cells(&headers, row);
            ensure_notes(&mut data);
            Record::create(format!("{}-{}", sheet_name, i), sheet_name, data)
        })
        .collect()
}

/// Validates an untyped JSON sheet and maps it.
///
/// The value must be an array whose elements are arrays (the first being
/// the header row). Cells may be strings, numbers, booleans or null.
pub fn map_json(sheet_name: &str, value: &Value, options: MapOptions) -> Result<Vec<Record>, CrmError> {
    let rows = rows_from_json(sheet_name, value)?;
    Ok(map_sheet_with(sheet_name, &rows, options))
}

/// Converts a JSON 2-D array into string rows.
pub fn rows_from_json(sheet_name: &str, value: &Value) -> Result<Vec<Vec<String>>, CrmError> {
    let rows = value
        .as_array()
        .ok_or_else(|| CrmError::format(format!("Sheet '{}' is not an array of rows", sheet_name)))?;

    if rows.is_empty() {
        return Err(CrmError::format(format!("Sheet '{}' has no header row", sheet_name)));
    }

    rows.iter()
        .enumerate()
        .map(|(r, row)| {
            let cells = row.as_array().ok_or_else(|| {
                CrmError::format(format!("Sheet '{}' row {} is not an array", sheet_name, r + 1))
            })?;
            Ok(cells.iter().map(json_cell).collect())
        })
        .collect()
}

/// Header-keyed maps without ids or the `Notes` guarantee.
///
/// This is the shape the remote range endpoint answers with.
pub fn format_rows(rows: &[Vec<String>]) -> Vec<FieldMap> {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Vec::new();
    };

    data_rows
        .iter()
        .map(|row| {
            header_row
                .iter()
                .enumerate()
                .map(|(j, header)| (header.clone(), row.get(j).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

fn resolve_headers(header_row: &[String], options: MapOptions) -> Vec<String> {
    let mut hinted: Vec<&'static str> = Vec::new();

    header_row
        .iter()
        .enumerate()
        .map(|(j, header)| {
            if header.trim().is_empty() {
                return format!("Column {}", j + 1);
            }
            if options.apply_hints {
                if let Some(label) = hints::resolve_header(header) {
                    // Only the first column hinted to a label takes it.
                    if hinted.contains(&label) {
                        log::warn!(
                            "header '{}' also maps to '{}', keeping it verbatim",
                            header,
                            label
                        );
                        return header.clone();
                    }
                    hinted.push(label);
                    return label.to_string();
                }
            }
            header.clone()
        })
        .collect()
}

fn pair_cells(headers: &[String], row: &[String]) -> FieldMap {
    let mut data = FieldMap::with_capacity(headers.len() + 1);
    for (j, header) in headers.iter().enumerate() {
        // A repeated header keeps its first position and takes the later value.
        data.insert(header.clone(), row.get(j).cloned().unwrap_or_default());
    }
    data
}

fn json_cell(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
