use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::error::Error;
use crate::gmail_api::auth::{IdentityProvider, UserProfile};

const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scope covering read, metadata and batchDelete access.
const GMAIL_SCOPES: &[&str] = &["https://mail.google.com/"];

/// Identity provider backed by the Google installed-application OAuth flow.
///
/// Interactive issuance opens a browser consent page and blocks on the local
/// redirect; silent issuance relies on tokens previously persisted to disk
/// and fails fast when none exist.
pub struct GoogleIdentityProvider {
    http: reqwest::Client,
    secret_path: PathBuf,
    token_cache_path: PathBuf,
}

impl GoogleIdentityProvider {
    pub fn new(secret_path: impl AsRef<Path>, token_cache_path: impl AsRef<Path>) -> Self {
        GoogleIdentityProvider {
            http: reqwest::Client::new(),
            secret_path: secret_path.as_ref().to_path_buf(),
            token_cache_path: token_cache_path.as_ref().to_path_buf(),
        }
    }

    fn classify_flow_error(message: String) -> Error {
        let lower = message.to_lowercase();
        if lower.contains("access_denied") || lower.contains("consent") {
            Error::AuthDenied(message)
        } else {
            Error::AuthUnavailable(message)
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn issue(&self, interactive: bool) -> Result<String, Error> {
        if !interactive && !self.token_cache_path.exists() {
            return Err(Error::AuthDenied(
                "no granted credential available for silent issuance".to_string(),
            ));
        }

        let secret = yup_oauth2::read_application_secret(&self.secret_path)
            .await
            .map_err(|e| {
                Error::AuthUnavailable(format!(
                    "could not read {}: {}",
                    self.secret_path.display(),
                    e
                ))
            })?;

        let authenticator =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
                .persist_tokens_to_disk(&self.token_cache_path)
                .build()
                .await
                .map_err(|e| Error::AuthUnavailable(e.to_string()))?;

        let access = authenticator
            .token(GMAIL_SCOPES)
            .await
            .map_err(|e| Self::classify_flow_error(e.to_string()))?;

        access
            .token()
            .map(|t| t.to_string())
            .ok_or_else(|| Error::AuthUnavailable("issued token was empty".to_string()))
    }

    async fn invalidate(&self, token: &str) -> Result<(), Error> {
        let response = self
            .http
            .post(GOOGLE_REVOKE_URL)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if response.status().is_success() {
            debug!("Revoked credential with identity provider");
            Ok(())
        } else {
            Err(Error::AuthUnavailable(format!(
                "revocation failed with status {}",
                response.status()
            )))
        }
    }

    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, Error> {
        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Http {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<UserProfile>()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}
