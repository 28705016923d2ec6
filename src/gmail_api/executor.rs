use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;

use crate::error::Error;
use crate::gmail_api::auth::CredentialSource;

/// Bounds for the transient-failure retry loop. The delay doubles after each
/// transient failure, capped so a long outage cannot grow the wait unbounded.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// One logical HTTP operation against the mail API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        ApiRequest {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        ApiRequest {
            method: Method::POST,
            url: url.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Issues a single logical request with bounded retries.
///
/// Policy per attempt: 2xx parses and returns; the first 401 forces an
/// interactive credential refresh and retries without consuming an attempt;
/// 429 and 5xx back off exponentially and consume one attempt; anything else
/// is fatal. Exhausting the budget surfaces `RetriesExceeded` so callers can
/// tell "service degraded" from "request rejected".
pub struct RequestExecutor<C: CredentialSource> {
    http: reqwest::Client,
    credentials: Arc<C>,
    policy: RetryPolicy,
}

impl<C: CredentialSource> RequestExecutor<C> {
    pub fn new(credentials: Arc<C>) -> Self {
        Self::with_policy(credentials, RetryPolicy::default())
    }

    pub fn with_policy(credentials: Arc<C>, policy: RetryPolicy) -> Self {
        RequestExecutor {
            http: reqwest::Client::new(),
            credentials,
            policy,
        }
    }

    /// Execute and parse the JSON response body.
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, Error> {
        let response = self.dispatch(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    /// Execute an operation whose success response carries no body
    /// (e.g. batchDelete returns 204 No Content).
    pub async fn execute_empty(&self, request: ApiRequest) -> Result<(), Error> {
        self.dispatch(request).await.map(|_| ())
    }

    async fn dispatch(&self, request: ApiRequest) -> Result<reqwest::Response, Error> {
        // Operations never prompt for consent up front; escalation happens
        // only after the server actually rejects the token.
        let mut token = self.credentials.credential(false, false).await?;
        let mut delay = self.policy.initial_delay;
        let mut reauth_used = false;
        let mut attempt = 0u32;

        while attempt < self.policy.max_attempts {
            let mut builder = self
                .http
                .request(request.method.clone(), &request.url)
                .bearer_auth(&token);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::Network(e.to_string()))?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED && !reauth_used {
                debug!("Mail API rejected the token, forcing a refresh");
                token = self.credentials.credential(true, true).await?;
                reauth_used = true;
                // Not a transient failure: no attempt or delay consumed.
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                attempt += 1;
                warn!(
                    "Transient {} from mail API (attempt {}/{}), retrying in {:?}",
                    status, attempt, self.policy.max_attempts, delay
                );
                sleep(delay).await;
                delay = (delay * 2).min(self.policy.max_delay);
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        Err(Error::RetriesExceeded(self.policy.max_attempts))
    }
}
