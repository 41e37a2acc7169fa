//! Server-side rendering of the single page.

use crate::controller::{ActiveView, COMPANIES_VIEW, Crm, IMPORT_VIEW};
use crate::error::CrmError;
use crate::record::{
    ADDRESS, COMPANY_NAME, CONTACT_PERSON, EMAIL, LAST_CONTACT_DATE, NOTES, PHONE,
};
use handlebars::Handlebars;
use serde::Serialize;

const INDEX_TEMPLATE: &str = "index";

#[derive(Serialize)]
struct Tab {
    /// Percent-encoded view name for the tab link.
    href: String,
    label: String,
    active: bool,
}

#[derive(Serialize)]
struct Cell {
    field: String,
    value: String,
    is_date: bool,
}

#[derive(Serialize)]
struct Row {
    id: String,
    cells: Vec<Cell>,
    notes: String,
}

#[derive(Serialize)]
struct FormField {
    name: &'static str,
    input_type: &'static str,
}

#[derive(Serialize)]
struct Page<'a> {
    title: String,
    tabs: Vec<Tab>,
    is_import: bool,
    columns: Vec<String>,
    rows: Vec<Row>,
    form_fields: Vec<FormField>,
    error: Option<&'a str>,
}

/// Compiled page templates.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self, CrmError> {
        let mut registry = Handlebars::new();
        registry
            .register_template_string(INDEX_TEMPLATE, include_str!("./templates/index.hbs"))
            .map_err(|e| CrmError::format(format!("Invalid page template: {}", e)))?;
        Ok(Renderer { registry })
    }

    /// Renders the page for the controller's active tab.
    pub fn page(&self, crm: &Crm, error: Option<&str>) -> Result<String, CrmError> {
        let active = crm.active_view();
        let view = crm.view_records();
        let columns = crm.columns();

        let rows = view
            .iter()
            .map(|record| Row {
                id: record.id.clone(),
                cells: columns
                    .iter()
                    .map(|field| Cell {
                        field: field.clone(),
                        value: record.get(field).to_string(),
                        is_date: field == LAST_CONTACT_DATE,
                    })
                    .collect(),
                notes: record.get(NOTES).to_string(),
            })
            .collect();

        let page = Page {
            title: match active {
                ActiveView::Companies => "All Companies".to_string(),
                ActiveView::Section(name) => name.clone(),
                ActiveView::Import => "Import Data".to_string(),
            },
            tabs: tabs(crm),
            is_import: *active == ActiveView::Import,
            columns,
            rows,
            form_fields: form_fields(),
            error,
        };

        self.registry
            .render(INDEX_TEMPLATE, &page)
            .map_err(|e| CrmError::format(format!("Failed to render page: {}", e)))
    }
}

fn tabs(crm: &Crm) -> Vec<Tab> {
    let active = crm.active_view().as_str();
    let mut tabs = Vec::with_capacity(crm.sections().len() + 2);
    tabs.push(Tab {
        href: COMPANIES_VIEW.to_string(),
        label: "Companies".to_string(),
        active: active == COMPANIES_VIEW,
    });
    for section in crm.sections() {
        tabs.push(Tab {
            href: urlencoding::encode(section).into_owned(),
            label: section.clone(),
            active: matches!(crm.active_view(), ActiveView::Section(s) if s == section),
        });
    }
    tabs.push(Tab {
        href: IMPORT_VIEW.to_string(),
        label: "Import Data".to_string(),
        active: active == IMPORT_VIEW,
    });
    tabs
}

fn form_fields() -> Vec<FormField> {
    vec![
        FormField { name: COMPANY_NAME, input_type: "text" },
        FormField { name: CONTACT_PERSON, input_type: "text" },
        FormField { name: EMAIL, input_type: "email" },
        FormField { name: PHONE, input_type: "tel" },
        FormField { name: LAST_CONTACT_DATE, input_type: "date" },
        FormField { name: ADDRESS, input_type: "text" },
    ]
}
