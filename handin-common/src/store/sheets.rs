//! Google Sheets v4 backend.
//!
//! Authenticates as a service account: an RS256-signed JWT assertion is
//! exchanged for a short-lived access token, which is cached until shortly
//! before it expires. Each course maps to one spreadsheet; without an
//! explicit worksheet title all ranges target the first sheet.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ureq::Agent;
use url::Url;

use super::{StoreError, TabularStore, column_letter, row_range};

const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
/// Refresh cached tokens this long before the provider says they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The parts of a service account key file we use.
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key_id: Option<String>,
    private_key: SecretString,
    pub token_uri: String,
}

#[derive(Deserialize)]
struct KeyFile {
    client_email: String,
    #[serde(default)]
    private_key_id: Option<String>,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let file: KeyFile = serde_json::from_str(json)
            .map_err(|e| StoreError::Config(format!("service account key: {e}")))?;
        let key = Self {
            client_email: file.client_email,
            private_key_id: file.private_key_id,
            private_key: SecretString::from(file.private_key),
            token_uri: file.token_uri,
        };
        if key.client_email.trim().is_empty() {
            return Err(StoreError::Config(
                "service account key has an empty client_email".to_string(),
            ));
        }
        if key.private_key.expose_secret().trim().is_empty() {
            return Err(StoreError::Config(
                "service account key has an empty private_key".to_string(),
            ));
        }
        Ok(key)
    }

    /// Load a key file downloaded from the cloud console.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("reading service account key {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    token: SecretString,
    refresh_after: Instant,
}

/// Mints and caches access tokens for one service account.
///
/// Shared by every course store so that a single token serves all sheets.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    agent: Agent,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, agent: Agent) -> Self {
        Self {
            key,
            agent,
            cached: Mutex::new(None),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn signed_assertion(&self, now: u64) -> Result<String, StoreError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.key.private_key.expose_secret().as_bytes())
            .map_err(|e| StoreError::Auth(format!("invalid service account private key: {e}")))?;
        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| StoreError::Auth(format!("signing assertion: {e}")))
    }

    /// A valid access token, minting a new one when the cache is stale.
    pub fn access_token(&self) -> Result<SecretString, StoreError> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_after {
                return Ok(token.token.clone());
            }
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StoreError::Auth(e.to_string()))?
            .as_secs();
        let assertion = self.signed_assertion(now)?;

        debug!(client_email = %self.key.client_email, "Requesting sheets access token");
        let mut response = self
            .agent
            .post(&self.key.token_uri)
            .send_form([("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .map_err(|e| StoreError::Auth(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| StoreError::Auth(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(StoreError::Auth(format!("token endpoint returned HTTP {status}: {body}")));
        }

        let payload: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| StoreError::Auth(format!("token response: {e}")))?;
        let lifetime = Duration::from_secs(payload.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let token = SecretString::from(payload.access_token);
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_after: Instant::now() + lifetime,
        });
        Ok(token)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<&'a str>,
    major_dimension: &'static str,
    values: [&'a [String]; 1],
}

#[derive(Debug, Default, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a `majorDimension=COLUMNS` response holding a single column.
fn parse_column(body: &str) -> Result<Vec<String>, StoreError> {
    let parsed: ValueRangeResponse =
        serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(parsed
        .values
        .first()
        .map(|column| column.iter().map(cell_to_string).collect())
        .unwrap_or_default())
}

/// One course spreadsheet.
pub struct SheetsStore {
    auth: Arc<ServiceAccountAuth>,
    agent: Agent,
    api_base: Url,
    spreadsheet_id: String,
    worksheet: Option<String>,
}

impl SheetsStore {
    pub fn new(
        auth: Arc<ServiceAccountAuth>,
        agent: Agent,
        spreadsheet_id: impl Into<String>,
        worksheet: Option<String>,
    ) -> Result<Self, StoreError> {
        let spreadsheet_id = spreadsheet_id.into();
        if spreadsheet_id.trim().is_empty() {
            return Err(StoreError::Config("spreadsheet id must not be empty".to_string()));
        }
        let api_base = Url::parse(SHEETS_API_BASE_URL)
            .map_err(|e| StoreError::Config(format!("sheets api base url: {e}")))?;
        Ok(Self {
            auth,
            agent,
            api_base,
            spreadsheet_id,
            worksheet,
        })
    }

    /// Agent that reports non-2xx statuses as responses rather than errors.
    pub fn default_agent() -> Agent {
        Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into()
    }

    /// `'Title'!` prefix for ranges, or nothing to target the first sheet.
    fn sheet_prefix(&self) -> String {
        match &self.worksheet {
            Some(title) => format!("'{}'!", title.replace('\'', "''")),
            None => String::new(),
        }
    }

    fn values_url(&self, range: &str, suffix: &str, query: &[(&str, &str)]) -> Result<Url, StoreError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Config("sheets api base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                format!("{range}{suffix}").as_str(),
            ]);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn send(&self, request: ureq::RequestBuilder<ureq::typestate::WithBody>, body: &str) -> Result<String, StoreError> {
        let token = self.auth.access_token()?;
        let mut response = request
            .header("Authorization", format!("Bearer {}", token.expose_secret()))
            .header("Content-Type", "application/json")
            .send(body.as_bytes())
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        read_body(&mut response)
    }
}

fn read_body(response: &mut ureq::http::Response<ureq::Body>) -> Result<String, StoreError> {
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| StoreError::Transport(e.to_string()))?;
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(StoreError::Api { status, body })
    }
}

impl TabularStore for SheetsStore {
    fn column_values(&self, column: usize) -> Result<Vec<String>, StoreError> {
        let letter = column_letter(column);
        let range = format!("{}{letter}:{letter}", self.sheet_prefix());
        let url = self.values_url(&range, "", &[("majorDimension", "COLUMNS")])?;

        let token = self.auth.access_token()?;
        let mut response = self
            .agent
            .get(url.as_str())
            .header("Authorization", format!("Bearer {}", token.expose_secret()))
            .call()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let body = read_body(&mut response)?;
        parse_column(&body)
    }

    fn update_row(&self, row: usize, values: &[String]) -> Result<(), StoreError> {
        let range = format!("{}{}", self.sheet_prefix(), row_range(row, values.len()));
        let url = self.values_url(&range, "", &[("valueInputOption", "RAW")])?;
        let body = serde_json::to_string(&ValueRangeBody {
            range: Some(&range),
            major_dimension: "ROWS",
            values: [values],
        })
        .map_err(|e| StoreError::Decode(e.to_string()))?;

        debug!(store = %self.describe(), %range, "Updating row");
        self.send(self.agent.put(url.as_str()), &body)?;
        Ok(())
    }

    fn append_row(&self, values: &[String]) -> Result<(), StoreError> {
        let range = format!("{}A1", self.sheet_prefix());
        let url = self.values_url(
            &range,
            ":append",
            &[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")],
        )?;
        let body = serde_json::to_string(&ValueRangeBody {
            range: None,
            major_dimension: "ROWS",
            values: [values],
        })
        .map_err(|e| StoreError::Decode(e.to_string()))?;

        debug!(store = %self.describe(), "Appending row");
        self.send(self.agent.post(url.as_str()), &body)?;
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.worksheet {
            Some(title) => format!("sheets:{}/{}", self.spreadsheet_id, title),
            None => format!("sheets:{}", self.spreadsheet_id),
        }
    }
}
