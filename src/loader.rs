use crate::error::CrmError;
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use indexmap::IndexMap;
use std::io::Cursor;
use std::path::Path;

/// Sheet name to rows of string cells, in workbook order.
pub type Workbook = IndexMap<String, Vec<Vec<String>>>;

/// Load every sheet of an Excel or OpenDocument workbook
///
/// The format (xlsx, xlsm, xlsb, xls, ods) is detected from the bytes. Each
/// cell is rendered as display text so that every sheet becomes a plain
/// 2-D array of strings.
///
/// # Arguments
/// * `bytes` - Raw content of the uploaded file
///
/// # Returns
/// * `Result<Workbook, CrmError>` - The sheets, or `CrmError::Parse`
///
/// # Examples
/// ```no_run
/// use sheetcrm::loader::read_workbook;
///
/// let bytes = std::fs::read("leads.xlsx").unwrap();
/// match read_workbook(&bytes) {
///     Ok(book) => println!("{} sheets", book.len()),
///     Err(e) => eprintln!("Error reading workbook: {}", e),
/// }
/// ```
pub fn read_workbook(bytes: &[u8]) -> Result<Workbook, CrmError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| CrmError::Parse(format!("Failed to process Excel file: {}", e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut book = Workbook::with_capacity(sheet_names.len());

    for sheet_name in sheet_names {
        let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
            CrmError::Parse(format!("Failed to read sheet '{}': {}", sheet_name, e))
        })?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        log::debug!("sheet '{}': {} rows", sheet_name, rows.len());
        book.insert(sheet_name, rows);
    }

    Ok(book)
}

/// Load a CSV file as a single sheet
///
/// Rows may have different lengths. The first row is kept as the header
/// row like any other sheet.
///
/// # Arguments
/// * `bytes` - Raw CSV content
/// * `sheet_name` - Name given to the single sheet
pub fn read_csv(bytes: &[u8], sheet_name: &str) -> Result<Workbook, CrmError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| CrmError::Parse(format!("Failed to parse CSV line {}: {}", line + 1, e)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let mut book = Workbook::with_capacity(1);
    book.insert(sheet_name.to_string(), rows);
    Ok(book)
}

/// Detect file type from the upload name and load it
///
/// `.csv` files become one sheet named after the file stem; everything else
/// goes through the workbook reader, which sniffs the actual format.
pub fn read_upload(file_name: Option<&str>, bytes: &[u8]) -> Result<Workbook, CrmError> {
    let path = Path::new(file_name.unwrap_or_default());
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .unwrap_or("Sheet1");
            read_csv(bytes, stem)
        }
        _ => read_workbook(bytes),
    }
}

/// Parse the optional `sheets` form field
///
/// The field must hold a JSON array of sheet names.
pub fn parse_sheet_selection(raw: &str) -> Result<Vec<String>, CrmError> {
    serde_json::from_str::<Vec<String>>(raw)
        .map_err(|_| CrmError::format("Invalid sheets parameter format"))
}

/// Keep the requested sheets
///
/// `None` selects every sheet. Requested names missing from the workbook are
/// ignored, and sheets without any row are dropped. Workbook order is kept.
pub fn select_sheets(book: Workbook, selection: Option<&[String]>) -> Workbook {
    book.into_iter()
        .filter(|(name, _)| selection.is_none_or(|wanted| wanted.iter().any(|w| w == name)))
        .filter(|(_, rows)| !rows.is_empty())
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                value.format("%Y-%m-%d").to_string()
            }
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        other => other.to_string(),
    }
}
