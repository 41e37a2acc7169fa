use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, patch, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::controller::{ActiveView, Crm, ImportSummary, ViewSnapshot};
use crate::error::CrmError;
use crate::loader;
use crate::mapper::{self, MapOptions};
use crate::record::{FieldMap, Record};
use crate::render::Renderer;
use crate::sheets::{GoogleSheetsClient, SheetSource, range_sheet_name};

/// Section used for remote ranges that do not name a sheet.
pub const REMOTE_SECTION: &str = "Google Sheet";

const UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

pub struct AppState {
    pub crm: RwLock<Crm>,
    pub config: Config,
    pub sheets: Arc<dyn SheetSource>,
    renderer: Renderer,
}

impl AppState {
    pub fn new(config: Config, sheets: Arc<dyn SheetSource>) -> Result<Self, CrmError> {
        let crm = Crm::new(MapOptions {
            apply_hints: config.apply_header_hints,
        });
        Ok(AppState {
            crm: RwLock::new(crm),
            config,
            sheets,
            renderer: Renderer::new()?,
        })
    }
}

#[derive(Deserialize)]
struct PageQuery {
    view: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct UpdateBody {
    section: Option<String>,
    #[serde(default)]
    data: FieldMap,
}

#[derive(Deserialize)]
struct FieldUpdate {
    field: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct DateUpdate {
    #[serde(default)]
    date: String,
}

#[derive(Deserialize)]
struct NotesUpdate {
    #[serde(default)]
    notes: String,
}

#[derive(Deserialize)]
struct ViewSelection {
    view: String,
}

#[derive(Deserialize)]
struct SheetPayload {
    name: String,
    #[serde(default)]
    rows: Value,
}

#[derive(Deserialize)]
struct ImportRequest {
    sheets: Vec<SheetPayload>,
}

#[derive(Serialize)]
struct ImportResponse {
    #[serde(flatten)]
    summary: ImportSummary,
    active_view: ActiveView,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteImport {
    spreadsheet_id: Option<String>,
    range: Option<String>,
}

/// Builds the router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(serve_page))
        .route("/health", get(health))
        .route("/api/companies", get(list_companies).post(add_company))
        .route(
            "/api/companies/:id",
            put(update_company).delete(delete_company),
        )
        .route("/api/companies/:id/field", patch(update_field))
        .route("/api/companies/:id/date", patch(update_date))
        .route("/api/companies/:id/notes", patch(update_notes))
        .route("/api/view", post(select_view))
        .route("/api/import-excel", post(import_excel))
        .route("/api/import", post(import_sheets))
        .route("/api/import-sheet", post(import_remote_sheet))
        .nest_service("/static", static_dir)
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let sheets = Arc::new(GoogleSheetsClient::new(config.google.clone())?);
    if config.google.is_none() {
        log::warn!("Google Sheets credentials not configured, remote import disabled");
    }

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, sheets)?);
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_page(
    Query(params): Query<PageQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, CrmError> {
    let mut crm = state.crm.write().await;
    let mut error = params.error;

    if let Some(view) = params.view.as_deref() {
        if let Err(e) = crm.select_view(view) {
            error.get_or_insert_with(|| e.to_string());
        }
    }

    let html = state.renderer.page(&crm, error.as_deref())?;
    Ok(Html(html))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_companies(State(state): State<Arc<AppState>>) -> Json<ViewSnapshot> {
    Json(state.crm.read().await.snapshot())
}

async fn add_company(
    State(state): State<Arc<AppState>>,
    Json(data): Json<FieldMap>,
) -> Result<impl IntoResponse, CrmError> {
    let id = state.crm.write().await.add(data)?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn update_company(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateBody>,
) -> Json<ViewSnapshot> {
    let mut crm = state.crm.write().await;
    let section = body
        .section
        .or_else(|| crm.get(&id).map(|r| r.section.clone()))
        .unwrap_or_default();
    crm.update(Record::create(id, section, body.data));
    Json(crm.snapshot())
}

async fn delete_company(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<ViewSnapshot> {
    let mut crm = state.crm.write().await;
    crm.delete(&id);
    Json(crm.snapshot())
}

async fn update_field(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<FieldUpdate>,
) -> Json<ViewSnapshot> {
    let mut crm = state.crm.write().await;
    crm.update_field(&id, &body.field, &body.value);
    Json(crm.snapshot())
}

async fn update_date(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<DateUpdate>,
) -> Json<ViewSnapshot> {
    let mut crm = state.crm.write().await;
    crm.update_date(&id, &body.date);
    Json(crm.snapshot())
}

async fn update_notes(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<NotesUpdate>,
) -> Json<ViewSnapshot> {
    let mut crm = state.crm.write().await;
    crm.update_notes(&id, &body.notes);
    Json(crm.snapshot())
}

async fn select_view(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ViewSelection>,
) -> Result<Json<ViewSnapshot>, CrmError> {
    let mut crm = state.crm.write().await;
    crm.select_view(&body.view)?;
    Ok(Json(crm.snapshot()))
}

/// Reads an uploaded workbook and returns its sheets without importing them.
async fn import_excel(mut multipart: Multipart) -> Result<impl IntoResponse, CrmError> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut selection: Option<Vec<String>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CrmError::format(format!("Invalid multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| CrmError::format(format!("Failed to read upload: {}", e)))?;
                file = Some((file_name, bytes.to_vec()));
            }
            "sheets" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| CrmError::format(format!("Failed to read sheets field: {}", e)))?;
                if !raw.trim().is_empty() {
                    selection = Some(loader::parse_sheet_selection(&raw)?);
                }
            }
            other => log::debug!("ignoring multipart field '{}'", other),
        }
    }

    let (file_name, bytes) = file
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| CrmError::validation("No file provided"))?;

    let book = loader::read_upload(file_name.as_deref(), &bytes)?;
    let book = loader::select_sheets(book, selection.as_deref());
    log::info!(
        "read {} sheet(s) from upload {}",
        book.len(),
        file_name.as_deref().unwrap_or("<unnamed>")
    );

    Ok(Json(json!({
        "success": true,
        "message": format!("Read {} sheet(s)", book.len()),
        "data": book,
    })))
}

/// Maps and merges each posted sheet on its own.
async fn import_sheets(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImportRequest>,
) -> Json<ImportResponse> {
    let sheets = request
        .sheets
        .into_iter()
        .map(|sheet| (sheet.name, sheet.rows))
        .collect();

    let mut crm = state.crm.write().await;
    let summary = crm.import_json_batch(sheets);
    Json(ImportResponse {
        summary,
        active_view: crm.active_view().clone(),
    })
}

/// Fetches a remote range, answers with its rows and merges them.
async fn import_remote_sheet(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RemoteImport>,
) -> Result<impl IntoResponse, CrmError> {
    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(spreadsheet_id), Some(range)) = (non_blank(body.spreadsheet_id), non_blank(body.range))
    else {
        return Err(CrmError::validation("Missing spreadsheetId or range"));
    };

    state.config.google_credentials()?;

    let rows = state.sheets.fetch_range(&spreadsheet_id, &range).await?;
    if rows.is_empty() {
        return Err(CrmError::NotFound(
            "No data found in the specified range".into(),
        ));
    }

    let group_key = range_sheet_name(&range).unwrap_or_else(|| REMOTE_SECTION.to_string());
    let data = mapper::format_rows(&rows);

    let mut crm = state.crm.write().await;
    let records = mapper::map_sheet_with(&group_key, &rows, crm.map_options());
    if !records.is_empty() {
        crm.import_complete(records, &group_key);
    }

    Ok(Json(json!({ "data": data })))
}
