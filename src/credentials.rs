// Explicitly injected credentials: service account key files or a pre-issued access token.
// Nothing here reads or writes process-wide environment state.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::error::{ReportError, ReportResult};

/// Read-only monitoring scope; the tool never asks for more.
pub const MONITORING_READ_SCOPE: &str = "https://www.googleapis.com/auth/monitoring.read";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the cached token expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Service account key file (the JSON downloaded from the console).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> ReportResult<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| ReportError::credential(path, e))?;
        Self::from_json(&s).map_err(|reason| ReportError::credential(path, reason))
    }

    pub fn from_json(s: &str) -> Result<Self, String> {
        let key: ServiceAccountKey = serde_json::from_str(s).map_err(|e| e.to_string())?;
        if key.project_id.is_empty() {
            return Err("project_id must be non-empty".into());
        }
        if key.client_email.is_empty() {
            return Err("client_email must be non-empty".into());
        }
        if key.private_key.is_empty() {
            return Err("private_key must be non-empty".into());
        }
        Ok(key)
    }
}

/// Project id of a key file, or None when the file is missing or malformed.
pub fn project_from_service_account(path: &Path) -> Option<String> {
    match ServiceAccountKey::from_file(path) {
        Ok(key) => Some(key.project_id),
        Err(e) => {
            warn!(error = %e, "skipping service account file");
            None
        }
    }
}

/// Every `*.json` file in `dir`, sorted by path.
pub fn discover_key_files(dir: &Path) -> ReportResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ReportError::credential(dir, e))?;
    let mut out: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    out.sort();
    Ok(out)
}

/// Supplies bearer tokens for monitoring API calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> ReportResult<String>;
}

/// A token issued elsewhere (e.g. `gcloud auth print-access-token`).
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> ReportResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Exchanges a signed JWT for an access token; caches it until shortly before expiry.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    key_path: PathBuf,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(
        key: ServiceAccountKey,
        key_path: PathBuf,
        request_timeout: Duration,
    ) -> ReportResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(crate::version::user_agent())
            .build()
            .map_err(|e| ReportError::Backend {
                status: 0,
                message: format!("http client: {}", e),
            })?;
        Ok(Self {
            key,
            key_path,
            http,
            cached: Mutex::new(None),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.key.project_id
    }

    /// Signed RS256 assertion for the JWT bearer grant.
    pub fn signed_assertion(&self, issued_at: i64) -> ReportResult<String> {
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: MONITORING_READ_SCOPE,
            aud: &self.key.token_uri,
            iat: issued_at,
            exp: issued_at + TOKEN_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| ReportError::credential(&self.key_path, e))?;
        jsonwebtoken::encode(&header, &claims, &encoding_key)
            .map_err(|e| ReportError::credential(&self.key_path, e))
    }

    #[instrument(skip(self), fields(operation = "token_exchange", client = %self.key.client_email))]
    async fn fetch_token(&self) -> ReportResult<CachedToken> {
        let assertion = self.signed_assertion(chrono::Utc::now().timestamp())?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReportError::Timeout(format!("token exchange: {}", e))
                } else {
                    ReportError::Backend {
                        status: 0,
                        message: format!("token exchange failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Authorization(format!(
                "token exchange for {} returned {}: {}",
                self.key.client_email, status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ReportError::Decode(format!("token response: {}", e)))?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
        Ok(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> ReportResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(c) = cached.as_ref()
            && c.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN
        {
            return Ok(c.token.clone());
        }
        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
