use async_trait::async_trait;
use chrono::Utc;
use keyring::Entry;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Error;

pub const KEYRING_SERVICE_NAME: &str = "mailsweep";
pub const KEYRING_KEY: &str = "auth"; // Single-user slot; one record at a time

/// The persisted credential record. A record with a non-empty `token` counts
/// as signed in even when the profile fields are missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub token: String,
    #[serde(rename = "obtainedAt")]
    pub obtained_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Profile fields fetched opportunistically after issuance.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

// Define a trait for keyring operations to allow mocking
#[cfg_attr(test, mockall::automock)]
pub trait KeyringEntry: Send + Sync {
    fn get_password(&self) -> Result<String, keyring::Error>;
    fn set_password(&self, password: &str) -> Result<(), keyring::Error>;
    fn delete_password(&self) -> Result<(), keyring::Error>;
}

impl KeyringEntry for Entry {
    fn get_password(&self) -> Result<String, keyring::Error> {
        self.get_password()
    }
    fn set_password(&self, password: &str) -> Result<(), keyring::Error> {
        self.set_password(password)
    }
    fn delete_password(&self) -> Result<(), keyring::Error> {
        self.delete_password()
    }
}

/// Durable persistence for the single credential record.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<CredentialRecord>, Error>;
    fn save(&self, record: &CredentialRecord) -> Result<(), Error>;
    fn delete(&self) -> Result<(), Error>;
}

/// Keyring-backed store. The record is serialized as JSON under the
/// (`mailsweep`, `auth`) entry and survives process restarts.
pub struct KeyringStore<K: KeyringEntry = Entry> {
    entry: K,
}

impl KeyringStore<Entry> {
    pub fn new() -> Result<Self, Error> {
        let entry = Entry::new(KEYRING_SERVICE_NAME, KEYRING_KEY)
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(KeyringStore { entry })
    }
}

impl<K: KeyringEntry> KeyringStore<K> {
    pub fn with_entry(entry: K) -> Self {
        KeyringStore { entry }
    }
}

impl<K: KeyringEntry> CredentialStore for KeyringStore<K> {
    fn load(&self) -> Result<Option<CredentialRecord>, Error> {
        match self.entry.get_password() {
            Ok(json) => {
                let record: CredentialRecord =
                    serde_json::from_str(&json).map_err(|e| Error::Store(e.to_string()))?;
                Ok(Some(record))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Store(e.to_string())),
        }
    }

    fn save(&self, record: &CredentialRecord) -> Result<(), Error> {
        let json = serde_json::to_string(record).map_err(|e| Error::Store(e.to_string()))?;
        self.entry
            .set_password(&json)
            .map_err(|e| Error::Store(e.to_string()))
    }

    fn delete(&self) -> Result<(), Error> {
        match self.entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Store(e.to_string())),
        }
    }
}

// Define a trait for identity provider operations to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Issue a bearer token. An interactive request may block on user
    /// consent; a non-interactive one fails fast with `AuthDenied` when no
    /// credential is currently grantable.
    async fn issue(&self, interactive: bool) -> Result<String, Error>;

    /// Invalidate a previously issued token with the provider.
    async fn invalidate(&self, token: &str) -> Result<(), Error>;

    /// Fetch the profile associated with a token.
    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, Error>;
}

/// Anything that can hand out a usable bearer credential for one request.
/// Implemented by `TokenManager`; mocked in executor tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credential(&self, interactive: bool, force_refresh: bool) -> Result<String, Error>;
}

/// Owns the credential lifecycle: reuse the cached token on the cheap path,
/// invalidate-then-reissue on forced refresh, and keep the stored record in
/// sync. No other component writes the record.
pub struct TokenManager<S: CredentialStore, P: IdentityProvider> {
    store: S,
    provider: P,
    // Serializes invalidate-then-reacquire so two concurrent forced
    // refreshes cannot interleave and clobber each other's record.
    refresh_lock: Mutex<()>,
}

impl<S: CredentialStore, P: IdentityProvider> TokenManager<S, P> {
    pub fn new(store: S, provider: P) -> Self {
        TokenManager {
            store,
            provider,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Get a usable token, reusing the cached one unless `force_refresh`.
    ///
    /// Profile fetch failures are swallowed; a store write failure is not.
    pub async fn acquire(&self, interactive: bool, force_refresh: bool) -> Result<String, Error> {
        let _guard = self.refresh_lock.lock().await;

        let cached = match self.store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!("Credential store read failed, treating as absent: {}", e);
                None
            }
        };

        if let Some(record) = &cached {
            if !record.token.is_empty() && !force_refresh {
                debug!("Reusing cached credential");
                return Ok(record.token.clone());
            }
        }

        if force_refresh {
            if let Some(record) = &cached {
                if !record.token.is_empty() {
                    // Best effort: a stale server-side cache entry is worse
                    // than a failed invalidation.
                    if let Err(e) = self.provider.invalidate(&record.token).await {
                        warn!("Credential invalidation before refresh failed: {}", e);
                    }
                }
            }
        }

        let token = self.provider.issue(interactive).await?;

        let profile = match self.provider.fetch_profile(&token).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!("Profile fetch failed, continuing without it: {}", e);
                None
            }
        };

        let record = CredentialRecord {
            token: token.clone(),
            obtained_at: Utc::now().timestamp_millis(),
            email: profile.as_ref().map(|p| p.email.clone()),
            name: profile.as_ref().and_then(|p| p.name.clone()),
            picture: profile.as_ref().and_then(|p| p.picture.clone()),
        };
        self.store.save(&record)?;

        info!(
            "Stored credential record for {}",
            record.email.as_deref().unwrap_or("(unknown account)")
        );
        Ok(token)
    }

    /// Whether a token is stored locally. No network call.
    pub fn is_signed_in(&self) -> bool {
        matches!(self.store.load(), Ok(Some(record)) if !record.token.is_empty())
    }

    /// Email of the stored record, if the profile fetch ever succeeded.
    pub fn signed_in_email(&self) -> Option<String> {
        self.store.load().ok().flatten().and_then(|r| r.email)
    }

    /// Revoke the cached credential (best effort) and clear local state.
    /// Local state is cleared even when revocation fails.
    pub async fn sign_out(&self) -> Result<(), Error> {
        let _guard = self.refresh_lock.lock().await;

        if let Ok(Some(record)) = self.store.load() {
            if !record.token.is_empty() {
                if let Err(e) = self.provider.invalidate(&record.token).await {
                    warn!("Token revocation failed during sign-out: {}", e);
                }
            }
        }
        self.store.delete()?;
        info!("Signed out, local credential record cleared");
        Ok(())
    }
}

#[async_trait]
impl<S: CredentialStore, P: IdentityProvider> CredentialSource for TokenManager<S, P> {
    async fn credential(&self, interactive: bool, force_refresh: bool) -> Result<String, Error> {
        self.acquire(interactive, force_refresh).await
    }
}
