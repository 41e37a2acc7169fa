//! Google Sheets range fetch.
//!
//! Authenticates as a service account: a self-signed RS256 assertion is
//! exchanged for a short-lived bearer token, then `values.get` is called for
//! the requested A1 range.

use crate::config::GoogleCredentials;
use crate::error::CrmError;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const API_BASE: &str = "https://sheets.googleapis.com/v4";
const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires.
const TOKEN_SLACK_SECS: i64 = 60;

lazy_static! {
    static ref SHEET_PREFIX: Regex = Regex::new(r"^(?:'((?:[^']|'')+)'|([^!']+))!").unwrap();
}

/// Anything that can return the cells of a spreadsheet range.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Rows of the range, header row first. An empty range yields no rows.
    async fn fetch_range(&self, spreadsheet_id: &str, range: &str)
    -> Result<Vec<Vec<String>>, CrmError>;
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Sheets v4 client authenticated with service-account credentials.
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    credentials: Option<GoogleCredentials>,
    token: Mutex<Option<CachedToken>>,
    token_url: String,
    api_base: String,
}

impl GoogleSheetsClient {
    pub fn new(credentials: Option<GoogleCredentials>) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("sheetcrm/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CrmError::upstream(format!("Failed to create HTTP client: {}", e)))?;

        Ok(GoogleSheetsClient {
            http,
            credentials,
            token: Mutex::new(None),
            token_url: TOKEN_URL.to_string(),
            api_base: API_BASE.to_string(),
        })
    }

    fn credentials(&self) -> Result<&GoogleCredentials, CrmError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| CrmError::Configuration("Google Sheets credentials not configured".into()))
    }

    async fn access_token(&self) -> Result<String, CrmError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_SLACK_SECS > now {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = sign_assertion(self.credentials()?, &self.token_url, now)?;
        log::debug!("requesting Sheets access token");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| CrmError::upstream(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::upstream(format!(
                "Token request returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CrmError::upstream(format!("Invalid token response: {}", e)))?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + token.expires_in,
        });
        Ok(access_token)
    }
}

#[async_trait]
impl SheetSource for GoogleSheetsClient {
    async fn fetch_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, CrmError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.api_base,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        );

        log::info!("fetching range '{}' from spreadsheet {}", range, spreadsheet_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CrmError::upstream(format!("Sheets request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::upstream(format!(
                "Sheets API returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| CrmError::upstream(format!("Invalid Sheets response: {}", e)))?;

        Ok(values_to_rows(body.values))
    }
}

fn sign_assertion(creds: &GoogleCredentials, audience: &str, now: i64) -> Result<String, CrmError> {
    let claims = Claims {
        iss: &creds.client_email,
        scope: READONLY_SCOPE,
        aud: audience,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let key = EncodingKey::from_rsa_pem(creds.private_key.as_bytes()).map_err(|e| {
        CrmError::Configuration(format!("Invalid Google Sheets private key: {}", e))
    })?;

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| CrmError::Configuration(format!("Failed to sign service account token: {}", e)))
}

/// Stringifies the untyped cells the API returns.
pub fn values_to_rows(values: Vec<Vec<Value>>) -> Vec<Vec<String>> {
    values
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    Value::Null => String::new(),
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

/// Sheet part of an A1 range, e.g. `Sheet1` for `Sheet1!A1:D10`.
///
/// Quoted names (`'My Sheet'!A:B`) are unquoted. A range without a sheet
/// part yields `None`.
pub fn range_sheet_name(range: &str) -> Option<String> {
    let captures = SHEET_PREFIX.captures(range.trim())?;
    if let Some(quoted) = captures.get(1) {
        return Some(quoted.as_str().replace("''", "'"));
    }
    captures
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sheet_names_from_ranges() {
        assert_eq!(range_sheet_name("Sheet1!A1:D10").as_deref(), Some("Sheet1"));
        assert_eq!(range_sheet_name("Leads!A:D").as_deref(), Some("Leads"));
        assert_eq!(range_sheet_name("'My Sheet'!A1:B2").as_deref(), Some("My Sheet"));
        assert_eq!(range_sheet_name("'Bob''s list'!A1").as_deref(), Some("Bob's list"));
        assert_eq!(range_sheet_name("A1:D10"), None);
        assert_eq!(range_sheet_name("Leads"), None);
    }

    #[test]
    fn cells_are_stringified() {
        let rows = values_to_rows(vec![
            vec![json!("Company"), json!("Employees")],
            vec![json!("Acme"), json!(42)],
            vec![json!(null), json!(true)],
        ]);
        assert_eq!(rows[1], vec!["Acme", "42"]);
        assert_eq!(rows[2], vec!["", "true"]);
    }

    #[test]
    fn missing_values_key_means_no_rows() {
        let body: ValueRange = serde_json::from_str(r#"{"range":"Sheet1!A1:B2"}"#).unwrap();
        assert!(body.values.is_empty());
    }

    #[tokio::test]
    async fn fetch_without_credentials_is_a_configuration_error() {
        let client = GoogleSheetsClient::new(None).unwrap();
        let result = client.fetch_range("sheet-id", "Sheet1!A1:B2").await;
        assert!(matches!(result, Err(CrmError::Configuration(_))));
    }

    #[test]
    fn malformed_private_key_is_rejected() {
        let creds = GoogleCredentials {
            client_email: "svc@project.iam.gserviceaccount.com".into(),
            private_key: "not a key".into(),
        };
        assert!(matches!(
            sign_assertion(&creds, TOKEN_URL, 0),
            Err(CrmError::Configuration(_))
        ));
    }
}
