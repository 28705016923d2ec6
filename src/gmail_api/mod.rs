//! Gmail access layer split into logical submodules
//!
//! - auth: credential record, store, identity provider seam, token lifecycle
//! - identity: Google-backed identity provider implementation
//! - executor: retrying HTTP request execution
//! - client: Gmail REST operations
//! - enrich: per-message metadata fan-out

pub mod auth;
pub mod client;
pub mod enrich;
pub mod executor;
pub mod identity;

// Re-export the pieces callers wire together
pub use auth::{
    CredentialRecord, CredentialSource, CredentialStore, IdentityProvider, KeyringStore,
    TokenManager,
};
pub use client::MailClient;
pub use enrich::{MessageEnricher, MetadataSource};
pub use executor::{ApiRequest, RequestExecutor, RetryPolicy};
pub use identity::GoogleIdentityProvider;
