//! Service Credentials
//!
//! Access tokens for the billing API. The production provider reads a
//! service-account key and exchanges a signed JWT assertion for a bearer
//! token every time it is asked; nothing is cached because tokens can expire
//! between conversation turns.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Bearer token for one billing call
#[derive(Clone)]
pub struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of billing API credentials
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Acquire a fresh, already-refreshed credential
    async fn fetch_credential(&self) -> Result<Credential>;
}

/// Service-account key file contents (the fields we use)
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| BillingError::Auth(format!("invalid service account key: {e}")))
    }

    /// Read a key file
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            BillingError::Auth(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Build and sign the JWT assertion for `scope`
    pub fn assertion(&self, scope: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.private_key_id);

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| BillingError::Auth(format!("invalid private key: {e}")))?;

        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| BillingError::Auth(format!("cannot sign assertion: {e}")))
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Service-account credential provider
pub struct ServiceAccountCredentials {
    path: PathBuf,
    scope: String,
    http: reqwest::Client,
}

impl ServiceAccountCredentials {
    pub fn new(path: impl Into<PathBuf>, scope: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            path: path.into(),
            scope: scope.into(),
            http,
        }
    }

    /// Exchange a signed assertion for an access token
    async fn refresh(&self, key: &ServiceAccountKey) -> Result<Credential> {
        let now = Utc::now();
        let assertion = key.assertion(&self.scope, now)?;

        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| BillingError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BillingError::Auth(format!(
                "token endpoint returned {}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BillingError::Auth(format!("invalid token response: {e}")))?;

        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        Ok(Credential::new(token.access_token, now + Duration::seconds(lifetime)))
    }
}

#[async_trait]
impl CredentialProvider for ServiceAccountCredentials {
    async fn fetch_credential(&self) -> Result<Credential> {
        let key = ServiceAccountKey::load(&self.path).await.inspect_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Error loading service account key");
        })?;

        let credential = self.refresh(&key).await.inspect_err(|e| {
            tracing::error!(client = %key.client_email, error = %e, "Error refreshing credentials");
        })?;

        tracing::debug!(expires_at = %credential.expires_at(), "Credential refreshed");
        Ok(credential)
    }
}

/// Fixed token, for local stubs and tests
#[derive(Clone, Debug)]
pub struct StaticCredential(pub Credential);

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn fetch_credential(&self) -> Result<Credential> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_JSON: &str = r#"{
        "type": "service_account",
        "client_email": "goods@example.iam.gserviceaccount.com",
        "private_key": "not a pem",
        "private_key_id": "abc123",
        "token_uri": "https://oauth2.example.test/token"
    }"#;

    #[test]
    fn test_parse_service_account_key() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        assert_eq!(key.client_email, "goods@example.iam.gserviceaccount.com");
        assert_eq!(key.private_key_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_bad_private_key_is_auth_error() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        let err = key.assertion("scope", Utc::now()).unwrap_err();
        assert!(matches!(err, BillingError::Auth(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = Credential::new("ya29.secret", Utc::now());
        assert!(!format!("{credential:?}").contains("ya29"));

        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        assert!(!format!("{key:?}").contains("not a pem"));
    }

    #[tokio::test]
    async fn test_missing_key_file_is_auth_error() {
        let provider = ServiceAccountCredentials::new(
            "/nonexistent/credentials.json",
            "scope",
            reqwest::Client::new(),
        );
        let err = provider.fetch_credential().await.unwrap_err();
        assert!(matches!(err, BillingError::Auth(_)));
    }
}
