/*!
# sheetcrm

A single-page CRM that keeps a list of companies in memory, groups them into
sections and fills them from spreadsheets.

## Overview

Companies are free-form records: an identifier, a section and an ordered map
of field name to text. The usual CRM fields (company name, contact person,
email, phone, address, last contact date, notes) are just well-known keys in
that map, so any column a spreadsheet brings along is kept and shown.

## Architecture

### Import adapters
- **loader**: reads uploaded workbooks (xlsx, xls, xlsb, ods) and CSV files
  into sheet name → rows of text cells
- **sheets**: fetches a range from the Google Sheets API with service-account
  credentials

### Core
- **mapper**: turns a sheet (header row first) into records
- **merge**: appends imported records, keeps identifiers unique and tracks
  sections
- **projection**: picks the columns worth showing for a set of records
- **controller**: owns the records and the selected tab, and runs every
  record operation

### Web layer
- **app**: axum router with the JSON API and the upload endpoints
- **render**: handlebars page with tabs, the projected table and inline errors

### Support
- **error**: error taxonomy with HTTP status mapping
- **config**: environment configuration
- **hints**: optional Italian header table
- **record**: the record type and the well-known field names

## REST API Endpoints

- `GET /` - The page, `?view=` selects a tab
- `GET /api/companies` - Records and columns of the active tab
- `POST /api/companies` - Add a company
- `PUT|DELETE /api/companies/{id}` - Replace or remove a company
- `PATCH /api/companies/{id}/field|date|notes` - Edit one field
- `POST /api/view` - Select a tab
- `POST /api/import-excel` - Read an uploaded workbook
- `POST /api/import` - Import sheets into sections
- `POST /api/import-sheet` - Import a Google Sheets range
*/

pub mod config;
pub mod controller;
pub mod error;
pub mod hints;
pub mod loader;
pub mod mapper;
pub mod merge;
pub mod projection;
pub mod record;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod render;
#[cfg(feature = "web")]
pub mod sheets;

pub use controller::{ActiveView, Crm};
pub use error::CrmError;
pub use record::{FieldMap, Record};
