//! Service-account authentication for the Google Sheets API.
//!
//! The key JSON yields a signed RS256 assertion which is exchanged at the
//! token endpoint for a short-lived bearer token; the token is cached until
//! shortly before expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use leadsync_core::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

const SERVICE: &str = "google-sheets";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const EXPIRY_LEEWAY_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// ServiceAccountKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "cannot read service-account key {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| SyncError::Config(format!("invalid service-account key: {e}")))
    }
}

// ---------------------------------------------------------------------------
// TokenProvider
// ---------------------------------------------------------------------------

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
    3600
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

enum ProviderKind {
    ServiceAccount(ServiceAccountKey),
    /// Pre-issued token, used by tests and local tooling.
    Fixed(String),
}

pub struct TokenProvider {
    http: reqwest::Client,
    kind: ProviderKind,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn service_account(key: ServiceAccountKey) -> Result<Self> {
        Ok(Self {
            http: build_http()?,
            kind: ProviderKind::ServiceAccount(key),
            cache: Mutex::new(None),
        })
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            kind: ProviderKind::Fixed(token.into()),
            cache: Mutex::new(None),
        }
    }

    /// Current bearer token, refreshed through the JWT grant when the cached
    /// one is gone or about to expire.
    pub async fn bearer(&self) -> Result<String> {
        let key = match &self.kind {
            ProviderKind::Fixed(token) => return Ok(token.clone()),
            ProviderKind::ServiceAccount(key) => key,
        };

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at - Utc::now() > Duration::seconds(EXPIRY_LEEWAY_SECS) {
                return Ok(cached.value.clone());
            }
        }

        let fresh = self.exchange(key).await?;
        let value = fresh.value.clone();
        *cache = Some(fresh);
        Ok(value)
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<CachedToken> {
        let now = Utc::now();
        let claims = Claims {
            iss: &key.client_email,
            scope: SCOPE,
            aud: &key.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| SyncError::auth(SERVICE, format!("invalid private key: {e}")))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| SyncError::auth(SERVICE, format!("cannot sign assertion: {e}")))?;

        let resp = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::auth(
                SERVICE,
                format!("token exchange failed with {status}: {body}"),
            ));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::auth(SERVICE, format!("invalid token response: {e}")))?;
        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

fn build_http() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| SyncError::transport(SERVICE, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn key_file_parses_and_defaults_token_uri() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(
            br#"{"client_email": "svc@project.iam.gserviceaccount.com", "private_key": "---"}"#,
        )
        .unwrap();

        let key = ServiceAccountKey::from_file(f.path()).unwrap();
        assert_eq!(key.client_email, "svc@project.iam.gserviceaccount.com");
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn missing_key_file_is_a_config_error() {
        let err = ServiceAccountKey::from_file(Path::new("/nonexistent/key.json")).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn truncated_key_file_is_a_config_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"client_email": "svc@x"#).unwrap();
        let err = ServiceAccountKey::from_file(f.path()).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[tokio::test]
    async fn fixed_provider_returns_the_token_verbatim() {
        let provider = TokenProvider::fixed("tok-123");
        assert_eq!(provider.bearer().await.unwrap(), "tok-123");
    }
}
