use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use sheetcrm::app::{AppState, build_router};
use sheetcrm::config::{Config, GoogleCredentials};
use sheetcrm::error::CrmError;
use sheetcrm::sheets::SheetSource;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "crm-test-boundary";

/// Answers every range with the same rows.
struct StubSheets {
    rows: Vec<Vec<String>>,
}

#[async_trait]
impl SheetSource for StubSheets {
    async fn fetch_range(&self, _spreadsheet_id: &str, _range: &str) -> Result<Vec<Vec<String>>, CrmError> {
        Ok(self.rows.clone())
    }
}

/// Fails every fetch the way an unreachable API would.
struct FailingSheets;

#[async_trait]
impl SheetSource for FailingSheets {
    async fn fetch_range(&self, _spreadsheet_id: &str, _range: &str) -> Result<Vec<Vec<String>>, CrmError> {
        Err(CrmError::upstream("Sheets API returned HTTP 503: backend unavailable"))
    }
}

fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
    cells
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn credentials() -> Option<GoogleCredentials> {
    Some(GoogleCredentials {
        client_email: "svc@project.iam.gserviceaccount.com".into(),
        private_key: "unused".into(),
    })
}

fn router_over(sheets: Arc<dyn SheetSource>, google: Option<GoogleCredentials>) -> Router {
    let config = Config {
        google,
        ..Config::default()
    };
    let state = AppState::new(config, sheets).unwrap();
    build_router(Arc::new(state))
}

fn router_with(remote_rows: Vec<Vec<String>>, google: Option<GoogleCredentials>) -> Router {
    router_over(Arc::new(StubSheets { rows: remote_rows }), google)
}

fn router() -> Router {
    router_with(Vec::new(), credentials())
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn send_text(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn multipart_request(file: Option<(&str, &[u8])>, sheets: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some((name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(sheets) = sheets {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"sheets\"\r\n\r\n{sheets}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/import-excel")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn workbook() -> Vec<u8> {
    let mut book = rust_xlsxwriter::Workbook::new();

    let leads = book.add_worksheet();
    leads.set_name("Leads").unwrap();
    leads.write_string(0, 0, "Company").unwrap();
    leads.write_string(0, 1, "Phone").unwrap();
    leads.write_string(1, 0, "Acme").unwrap();
    leads.write_number(1, 1, 5551234.0).unwrap();

    let clients = book.add_worksheet();
    clients.set_name("Clients").unwrap();
    clients.write_string(0, 0, "Company").unwrap();
    clients.write_string(1, 0, "Beta").unwrap();

    book.save_to_buffer().unwrap()
}

fn company() -> Value {
    json!({
        "Company Name": "Acme",
        "Contact Person": "Jane Roe",
        "Email": "jane@acme.test",
        "Phone": "555-0100",
        "Address": "1 Main St",
        "Last Contact Date": "2024-05-01",
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = send(&router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn empty_remote_range_is_not_found() {
    let app = router();
    let (status, body) = send(
        &app,
        json_request("POST", "/api/import-sheet", json!({"spreadsheetId": "abc", "range": "Sheet1!A1:D10"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No data found in the specified range");

    let (_, companies) = send(&app, get("/api/companies")).await;
    assert_eq!(companies["companies"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn page_shows_inline_error_text() {
    let (status, html) = send_text(
        &router(),
        get("/?view=import&error=No%20data%20found%20in%20the%20specified%20range"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("No data found in the specified range"));
}

#[tokio::test]
async fn remote_import_requires_id_and_range() {
    let (status, body) = send(
        &router(),
        json_request("POST", "/api/import-sheet", json!({"spreadsheetId": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn remote_import_without_credentials_is_a_server_error() {
    let app = router_with(rows(&[&["Company"], &["Acme"]]), None);
    let (status, body) = send(
        &app,
        json_request("POST", "/api/import-sheet", json!({"spreadsheetId": "abc", "range": "A1:B2"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Google Sheets credentials not configured");
}

#[tokio::test]
async fn remote_rows_are_returned_and_merged() {
    let app = router_with(
        rows(&[&["Company", "Phone"], &["Acme", "1"], &["Beta"]]),
        credentials(),
    );
    let (status, body) = send(
        &app,
        json_request("POST", "/api/import-sheet", json!({"spreadsheetId": "abc", "range": "Leads!A1:B3"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["Company"], "Acme");
    assert_eq!(body["data"][1]["Phone"], "");

    let (_, snapshot) = send(&app, get("/api/companies")).await;
    assert_eq!(snapshot["active_view"], "Leads");
    assert_eq!(snapshot["sections"], json!(["Leads"]));
    assert_eq!(snapshot["companies"][0]["id"], "Leads-0");
    assert_eq!(snapshot["columns"], json!(["Company", "Phone"]));
}

#[tokio::test]
async fn excel_upload_returns_every_sheet() {
    let bytes = workbook();
    let (status, body) = send(&router(), multipart_request(Some(("leads.xlsx", bytes.as_slice())), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["Leads"][1], json!(["Acme", "5551234"]));
    assert_eq!(body["data"]["Clients"][1], json!(["Beta"]));
}

#[tokio::test]
async fn excel_upload_honours_sheet_selection() {
    let bytes = workbook();
    let (status, body) = send(
        &router(),
        multipart_request(Some(("leads.xlsx", bytes.as_slice())), Some(r#"["Clients"]"#)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&String> = body["data"].as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["Clients"]);
}

#[tokio::test]
async fn excel_upload_rejects_bad_requests() {
    let app = router();

    let (status, body) = send(&app, multipart_request(None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let bytes = workbook();
    let (status, body) = send(
        &app,
        multipart_request(Some(("leads.xlsx", bytes.as_slice())), Some("Leads,Clients")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid sheets parameter format");

    let (status, _) = send(&app, multipart_request(Some(("leads.xlsx", &b"not a workbook"[..])), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn batch_import_skips_header_only_sheets() {
    let app = router();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/import",
            json!({"sheets": [
                {"name": "Header", "rows": [["Company"]]},
                {"name": "Clients", "rows": [["Company", "Seats"], ["Acme", 3], ["Beta", null]]},
            ]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imported"], json!({"Clients": 2}));
    assert_eq!(body["skipped"], json!(["Header"]));
    assert_eq!(body["active_view"], "Clients");

    let (_, snapshot) = send(&app, get("/api/companies")).await;
    assert_eq!(snapshot["sections"], json!(["Clients"]));
    assert_eq!(snapshot["companies"][0]["data"]["Seats"], "3");
}

#[tokio::test]
async fn malformed_batch_sheet_is_reported() {
    let (status, body) = send(
        &router(),
        json_request(
            "POST",
            "/api/import",
            json!({"sheets": [
                {"name": "Bad", "rows": [["A"], "oops"]},
                {"name": "Leads", "rows": [["Company"], ["Acme"]]},
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errors"]["Bad"], "Sheet 'Bad' row 2 is not an array");
    assert_eq!(body["skipped"], json!([]));
    assert_eq!(body["imported"], json!({"Leads": 1}));
}

#[tokio::test]
async fn remote_fetch_failure_is_a_server_error() {
    let app = router_over(Arc::new(FailingSheets), credentials());
    let (status, body) = send(
        &app,
        json_request("POST", "/api/import-sheet", json!({"spreadsheetId": "abc", "range": "Leads!A1:B2"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Sheets API returned HTTP 503: backend unavailable");

    let (_, snapshot) = send(&app, get("/api/companies")).await;
    assert_eq!(snapshot["sections"], json!([]));
}

#[tokio::test]
async fn moving_a_company_to_a_new_section_adds_its_tab() {
    let app = router();
    let (_, body) = send(&app, json_request("POST", "/api/companies", company())).await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, snapshot) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/companies/{id}"),
            json!({"section": "Archive", "data": company()}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["sections"], json!(["Archive"]));

    let (status, snapshot) = send(&app, json_request("POST", "/api/view", json!({"view": "Archive"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["companies"][0]["id"], id.as_str());
}

#[tokio::test]
async fn tab_links_reach_sections_with_reserved_characters() {
    let app = router();
    send(
        &app,
        json_request(
            "POST",
            "/api/import",
            json!({"sheets": [{"name": "R&D", "rows": [["Company"], ["Acme"]]}]}),
        ),
    )
    .await;
    send(&app, json_request("POST", "/api/view", json!({"view": "companies"}))).await;

    let (_, html) = send_text(&app, get("/")).await;
    assert!(html.contains(r#"href="/?view=R%26D""#));

    let (status, html) = send_text(&app, get("/?view=R%26D")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!html.contains("Unknown view"));
    assert!(html.contains("<h1>R&amp;D</h1>"));
}

#[tokio::test]
async fn add_edit_and_delete_a_company() {
    let app = router();

    let (status, body) = send(&app, json_request("POST", "/api/companies", company())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, snapshot) = send(
        &app,
        json_request("PATCH", &format!("/api/companies/{id}/notes"), json!({"notes": "call back"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["companies"][0]["data"]["Notes"], "call back");
    assert_eq!(snapshot["companies"][0]["section"], "Default");

    let (_, snapshot) = send(
        &app,
        json_request("PATCH", &format!("/api/companies/{id}/date"), json!({"date": "2024-06-01"})),
    )
    .await;
    assert_eq!(snapshot["companies"][0]["data"]["Last Contact Date"], "2024-06-01");

    let (_, snapshot) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/companies/{id}"),
            json!({"data": {"Company Name": "Acme Corp"}}),
        ),
    )
    .await;
    assert_eq!(snapshot["companies"][0]["data"]["Company Name"], "Acme Corp");
    assert_eq!(snapshot["companies"][0]["section"], "Default");

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/companies/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, snapshot) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["companies"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn add_with_missing_fields_is_rejected() {
    let mut incomplete = company();
    incomplete["Email"] = json!("  ");

    let (status, body) = send(&router(), json_request("POST", "/api/companies", incomplete)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Email"));
}

#[tokio::test]
async fn edits_to_unknown_ids_are_ignored() {
    let app = router();
    send(&app, json_request("POST", "/api/companies", company())).await;
    let (_, before) = send(&app, get("/api/companies")).await;

    let (status, after) = send(
        &app,
        json_request("PATCH", "/api/companies/missing-id/field", json!({"field": "Phone", "value": "555"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(before, after);
}

#[tokio::test]
async fn selecting_an_unknown_view_fails() {
    let app = router();
    let (status, _) = send(&app, json_request("POST", "/api/view", json!({"view": "Nowhere"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, json_request("POST", "/api/view", json!({"view": "import"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_view"], "import");
    assert_eq!(body["companies"], json!([]));
}
