use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Free-form field storage: insertion-ordered, string keys and values.
pub type FieldMap = IndexMap<String, String>;

/// Grouping key given to records that carry none.
pub const DEFAULT_SECTION: &str = "Default";

pub const COMPANY_NAME: &str = "Company Name";
pub const CONTACT_PERSON: &str = "Contact Person";
pub const EMAIL: &str = "Email";
pub const PHONE: &str = "Phone";
pub const ADDRESS: &str = "Address";
pub const LAST_CONTACT_DATE: &str = "Last Contact Date";
/// Rendered as its own column, never part of a projection.
pub const NOTES: &str = "Notes";

/// Fields the add-company form requires.
pub const REQUIRED_FIELDS: [&str; 6] = [
    COMPANY_NAME,
    CONTACT_PERSON,
    EMAIL,
    PHONE,
    ADDRESS,
    LAST_CONTACT_DATE,
];

/// One CRM entry (company or lead).
///
/// The well-known fields are lookups into `data`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    #[serde(default = "default_section")]
    pub section: String,
    #[serde(default)]
    pub data: FieldMap,
}

fn default_section() -> String {
    DEFAULT_SECTION.to_string()
}

impl Record {
    pub fn create(id: impl Into<String>, section: impl Into<String>, data: FieldMap) -> Self {
        let mut record = Record {
            id: id.into(),
            section: section.into(),
            data,
        };
        record.normalize();
        record
    }

    /// Value of `field`, or `""` when the record has no such field.
    pub fn get(&self, field: &str) -> &str {
        self.data.get(field).map(String::as_str).unwrap_or("")
    }

    /// Sets `field`, appending it to the field order when new.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.data.insert(field.into(), value.into());
    }

    pub fn name(&self) -> &str {
        self.get(COMPANY_NAME)
    }

    pub fn contact_person(&self) -> &str {
        self.get(CONTACT_PERSON)
    }

    pub fn email(&self) -> &str {
        self.get(EMAIL)
    }

    pub fn phone(&self) -> &str {
        self.get(PHONE)
    }

    pub fn address(&self) -> &str {
        self.get(ADDRESS)
    }

    pub fn last_contact_date(&self) -> &str {
        self.get(LAST_CONTACT_DATE)
    }

    pub fn notes(&self) -> &str {
        self.get(NOTES)
    }

    /// Blank section becomes `"Default"` and a `Notes` field always exists.
    pub fn normalize(&mut self) {
        if self.section.trim().is_empty() {
            self.section = DEFAULT_SECTION.to_string();
        }
        ensure_notes(&mut self.data);
    }
}

/// Adds an empty `Notes` entry when the map lacks one.
pub fn ensure_notes(data: &mut FieldMap) {
    if !data.contains_key(NOTES) {
        data.insert(NOTES.to_string(), String::new());
    }
}
