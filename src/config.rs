//! Runtime configuration read from the environment.

use crate::error::CrmError;

pub const BIND_ADDR_VAR: &str = "CRM_BIND_ADDR";
pub const STATIC_DIR_VAR: &str = "CRM_STATIC_DIR";
pub const HEADER_HINTS_VAR: &str = "CRM_APPLY_HEADER_HINTS";
pub const CLIENT_EMAIL_VAR: &str = "GOOGLE_SHEETS_CLIENT_EMAIL";
pub const PRIVATE_KEY_VAR: &str = "GOOGLE_SHEETS_PRIVATE_KEY";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_STATIC_DIR: &str = "static";

/// Service-account credentials for the Sheets API.
#[derive(Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    pub client_email: String,
    /// PEM private key with real newlines.
    pub private_key: String,
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub static_dir: String,
    pub apply_header_hints: bool,
    /// `None` when either variable is unset or blank.
    pub google: Option<GoogleCredentials>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            static_dir: DEFAULT_STATIC_DIR.to_string(),
            apply_header_hints: false,
            google: None,
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    #[cfg(feature = "web")]
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            log::info!("loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let google = match (non_blank(CLIENT_EMAIL_VAR), non_blank(PRIVATE_KEY_VAR)) {
            (Some(client_email), Some(raw_key)) => Some(GoogleCredentials {
                client_email: client_email.trim().to_string(),
                private_key: unescape_newlines(&raw_key),
            }),
            _ => None,
        };

        Config {
            bind_addr: non_blank(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            static_dir: non_blank(STATIC_DIR_VAR).unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
            apply_header_hints: non_blank(HEADER_HINTS_VAR).is_some_and(|v| parse_flag(&v)),
            google,
        }
    }

    /// Credentials, or the configuration error the import endpoint reports.
    pub fn google_credentials(&self) -> Result<&GoogleCredentials, CrmError> {
        self.google
            .as_ref()
            .ok_or_else(|| CrmError::Configuration("Google Sheets credentials not configured".into()))
    }
}

/// Turns literal `\n` sequences (as stored in env files) into newlines.
pub fn unescape_newlines(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
