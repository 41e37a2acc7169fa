//! View state controller.
//!
//! Owns the record collection and the active tab. Every operation runs to
//! completion synchronously on `&mut self`; the server wraps one instance in
//! a lock.

use crate::error::CrmError;
use crate::mapper::{self, MapOptions};
use crate::merge::{Collection, MergeOutcome};
use crate::projection;
use crate::record::{
    DEFAULT_SECTION, FieldMap, LAST_CONTACT_DATE, NOTES, REQUIRED_FIELDS, Record, ensure_notes,
};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub const COMPANIES_VIEW: &str = "companies";
pub const IMPORT_VIEW: &str = "import";

/// The tab currently selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActiveView {
    Companies,
    Section(String),
    Import,
}

impl ActiveView {
    pub fn as_str(&self) -> &str {
        match self {
            ActiveView::Companies => COMPANIES_VIEW,
            ActiveView::Section(name) => name,
            ActiveView::Import => IMPORT_VIEW,
        }
    }
}

impl fmt::Display for ActiveView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActiveView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One sheet of a multi-sheet import.
#[derive(Clone, Debug)]
pub struct SheetImport {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Result of [`Crm::import_batch`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct ImportSummary {
    /// Records appended per sheet, in import order.
    pub imported: IndexMap<String, usize>,
    /// Sheets that produced no records.
    pub skipped: Vec<String>,
    /// Sheets that could not be mapped, with the reason.
    pub errors: IndexMap<String, String>,
}

/// Snapshot of what the table shows.
#[derive(Clone, Debug, Serialize)]
pub struct ViewSnapshot {
    pub active_view: ActiveView,
    pub sections: Vec<String>,
    pub columns: Vec<String>,
    pub companies: Vec<Record>,
}

#[derive(Clone, Debug)]
pub struct Crm {
    collection: Collection,
    active: ActiveView,
    map_options: MapOptions,
}

impl Default for Crm {
    fn default() -> Self {
        Self::new(MapOptions::default())
    }
}

impl Crm {
    pub fn new(map_options: MapOptions) -> Self {
        Crm {
            collection: Collection::new(),
            active: ActiveView::Companies,
            map_options,
        }
    }

    pub fn records(&self) -> &[Record] {
        self.collection.records()
    }

    pub fn sections(&self) -> &[String] {
        self.collection.sections()
    }

    pub fn active_view(&self) -> &ActiveView {
        &self.active
    }

    pub fn map_options(&self) -> MapOptions {
        self.map_options
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.collection.get(id)
    }

    /// Adds a company from the form. The section is always `"Default"`.
    pub fn add(&mut self, mut data: FieldMap) -> Result<String, CrmError> {
        validate_required(&data)?;
        ensure_notes(&mut data);

        let record = Record::create(Uuid::new_v4().to_string(), DEFAULT_SECTION, data);
        let id = self.collection.push(record);
        log::info!("added company {}", id);
        Ok(id)
    }

    /// Replaces the record with the same id; no-op when absent.
    ///
    /// A section other than `"Default"` joins the section set, so the record
    /// stays reachable from a tab.
    pub fn update(&mut self, record: Record) {
        let id = record.id.clone();
        let section = record.section.clone();
        if !self.collection.replace(record) {
            log::debug!("update ignored, no record {}", id);
            return;
        }
        if section != DEFAULT_SECTION && self.collection.add_section(&section) {
            log::info!("record {} moved into new section '{}'", id, section);
        }
    }

    /// Removes the record; no-op when absent.
    pub fn delete(&mut self, id: &str) {
        if !self.collection.remove(id) {
            log::debug!("delete ignored, no record {}", id);
        }
    }

    /// Sets one field, creating it if new; no-op when `id` is absent.
    pub fn update_field(&mut self, id: &str, field: &str, value: &str) {
        match self.collection.get_mut(id) {
            Some(record) => record.set(field, value),
            None => log::debug!("field update ignored, no record {}", id),
        }
    }

    pub fn update_date(&mut self, id: &str, date: &str) {
        self.update_field(id, LAST_CONTACT_DATE, date);
    }

    pub fn update_notes(&mut self, id: &str, notes: &str) {
        self.update_field(id, NOTES, notes);
    }

    /// Merges imported records and switches to their section.
    pub fn import_complete(&mut self, records: Vec<Record>, group_key: &str) -> MergeOutcome {
        let outcome = self.collection.merge(records, group_key);
        if !outcome.renamed.is_empty() {
            log::warn!(
                "{} imported identifiers collided in section '{}' and were renamed",
                outcome.renamed.len(),
                group_key
            );
        }
        self.active = ActiveView::Section(group_key.to_string());
        log::info!("imported {} records into '{}'", outcome.appended, group_key);
        outcome
    }

    /// Maps and merges each sheet independently.
    ///
    /// A sheet without data rows is skipped; the others still import.
    pub fn import_batch(&mut self, sheets: Vec<SheetImport>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for sheet in sheets {
            let records = mapper::map_sheet_with(&sheet.name, &sheet.rows, self.map_options);
            self.merge_sheet(sheet.name, records, &mut summary);
        }
        summary
    }

    /// Like [`Crm::import_batch`] for untyped JSON sheets.
    ///
    /// A sheet that is `null` or `[]` is skipped. A sheet that fails to map
    /// is reported under `errors` and the others still import.
    pub fn import_json_batch(&mut self, sheets: Vec<(String, Value)>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for (name, rows) in sheets {
            let records = match &rows {
                Value::Null => Vec::new(),
                Value::Array(cells) if cells.is_empty() => Vec::new(),
                value => match mapper::map_json(&name, value, self.map_options) {
                    Ok(records) => records,
                    Err(e) => {
                        log::warn!("sheet '{}' rejected: {}", name, e);
                        summary.errors.insert(name, e.to_string());
                        continue;
                    }
                },
            };
            self.merge_sheet(name, records, &mut summary);
        }
        summary
    }

    fn merge_sheet(&mut self, name: String, records: Vec<Record>, summary: &mut ImportSummary) {
        if records.is_empty() {
            log::info!("sheet '{}' has no data rows, skipping", name);
            summary.skipped.push(name);
            return;
        }
        let outcome = self.import_complete(records, &name);
        *summary.imported.entry(name).or_insert(0) += outcome.appended;
    }

    /// Explicit tab selection.
    pub fn select_view(&mut self, view: &str) -> Result<(), CrmError> {
        self.active = match view {
            COMPANIES_VIEW => ActiveView::Companies,
            IMPORT_VIEW => ActiveView::Import,
            section if self.collection.has_section(section) => {
                ActiveView::Section(section.to_string())
            }
            unknown => return Err(CrmError::validation(format!("Unknown view '{}'", unknown))),
        };
        Ok(())
    }

    /// Records visible under the active tab.
    pub fn view_records(&self) -> Vec<&Record> {
        match &self.active {
            ActiveView::Companies => self.collection.records().iter().collect(),
            ActiveView::Section(section) => self.collection.in_section(section).collect(),
            ActiveView::Import => Vec::new(),
        }
    }

    /// Columns for the active tab.
    pub fn columns(&self) -> Vec<String> {
        projection::project(self.view_records().iter().copied())
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            active_view: self.active.clone(),
            sections: self.sections().to_vec(),
            columns: self.columns(),
            companies: self.view_records().into_iter().cloned().collect(),
        }
    }
}

fn validate_required(data: &FieldMap) -> Result<(), CrmError> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| data.get(*field).is_none_or(|v| v.trim().is_empty()))
        .collect();

    if !missing.is_empty() {
        return Err(CrmError::validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let date = data.get(LAST_CONTACT_DATE).map(|d| d.trim()).unwrap_or_default();
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(CrmError::validation(format!(
            "{} must be a date (YYYY-MM-DD), got '{}'",
            LAST_CONTACT_DATE, date
        )));
    }

    Ok(())
}
