use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

use crate::error::Error;
use crate::gmail_api::auth::{CredentialStore, IdentityProvider, TokenManager};
use crate::gmail_api::client::MailClient;
use crate::gmail_api::enrich::MessageEnricher;
use crate::types::MessagePage;

/// Page size used for SEARCH requests from the UI boundary.
const SEARCH_PAGE_SIZE: u32 = 50;

/// Closed set of request tags accepted over the service channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServiceRequest {
    #[serde(rename = "SIGN_IN")]
    SignIn,
    #[serde(rename = "SIGN_OUT")]
    SignOut,
    #[serde(rename = "GET_SIGNIN_STATUS")]
    GetSigninStatus,
    #[serde(rename = "GET_ACCESS_TOKEN")]
    GetAccessToken {
        #[serde(default)]
        interactive: bool,
        #[serde(default, rename = "forceRefresh")]
        force_refresh: bool,
    },
    #[serde(rename = "SEARCH")]
    Search { query: String },
    #[serde(rename = "BATCH_TRASH")]
    BatchTrash { ids: Vec<String> },
}

/// Responses carry either a result or an `error` string field.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServiceResponse {
    SignIn {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    SignOut {
        success: bool,
    },
    SigninStatus {
        #[serde(rename = "signedIn")]
        signed_in: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    },
    AccessToken {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Search(MessagePage),
    BatchTrash {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Failed {
        error: String,
    },
}

pub type Envelope = (ServiceRequest, oneshot::Sender<ServiceResponse>);

/// Dispatcher binding the request tags to the domain components. The UI side
/// of the channel never touches the credential record or the HTTP layer.
pub struct MailService<S: CredentialStore, P: IdentityProvider> {
    manager: Arc<TokenManager<S, P>>,
    client: Arc<MailClient<TokenManager<S, P>>>,
    enricher: MessageEnricher<MailClient<TokenManager<S, P>>>,
}

impl<S, P> MailService<S, P>
where
    S: CredentialStore + 'static,
    P: IdentityProvider + 'static,
{
    pub fn new(
        manager: Arc<TokenManager<S, P>>,
        client: Arc<MailClient<TokenManager<S, P>>>,
    ) -> Self {
        let enricher = MessageEnricher::new(Arc::clone(&client));
        MailService {
            manager,
            client,
            enricher,
        }
    }

    pub async fn handle(&self, request: ServiceRequest) -> ServiceResponse {
        match request {
            ServiceRequest::SignIn => match self.manager.acquire(true, false).await {
                Ok(_) => ServiceResponse::SignIn {
                    success: true,
                    email: self.manager.signed_in_email(),
                    error: None,
                },
                Err(e) => ServiceResponse::SignIn {
                    success: false,
                    email: None,
                    error: Some(e.to_string()),
                },
            },
            ServiceRequest::SignOut => {
                let success = match self.manager.sign_out().await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Sign-out failed: {}", e);
                        false
                    }
                };
                ServiceResponse::SignOut { success }
            }
            ServiceRequest::GetSigninStatus => ServiceResponse::SigninStatus {
                signed_in: self.manager.is_signed_in(),
                email: self.manager.signed_in_email(),
            },
            ServiceRequest::GetAccessToken {
                interactive,
                force_refresh,
            } => match self.manager.acquire(interactive, force_refresh).await {
                Ok(token) => ServiceResponse::AccessToken {
                    success: true,
                    token: Some(token),
                    error: None,
                },
                Err(e) => ServiceResponse::AccessToken {
                    success: false,
                    token: None,
                    error: Some(e.to_string()),
                },
            },
            ServiceRequest::Search { query } => {
                match self.client.list_messages(&query, SEARCH_PAGE_SIZE, None).await {
                    Ok(page) => ServiceResponse::Search(self.enricher.enrich(page).await),
                    Err(e) => ServiceResponse::Failed {
                        error: e.to_string(),
                    },
                }
            }
            ServiceRequest::BatchTrash { ids } => match self.client.batch_trash(&ids).await {
                Ok(_) => ServiceResponse::BatchTrash {
                    success: true,
                    error: None,
                },
                Err(e) => ServiceResponse::BatchTrash {
                    success: false,
                    error: Some(e.to_string()),
                },
            },
        }
    }

    /// Service the channel until every handle is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<Envelope>) {
        while let Some((request, reply)) = rx.recv().await {
            let response = self.handle(request).await;
            if reply.send(response).is_err() {
                debug!("Caller dropped before the response was ready");
            }
        }
    }
}

/// Spawn the dispatcher on the current runtime and hand back the caller side.
pub fn spawn<S, P>(service: MailService<S, P>) -> ServiceHandle
where
    S: CredentialStore + 'static,
    P: IdentityProvider + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(service.run(rx));
    ServiceHandle { tx }
}

/// Caller-side wrapper around the service channel.
///
/// Applies a per-request timeout (longer for SIGN_IN, which may block on
/// interactive consent) and retries a failed send exactly once after a short
/// delay, for the case where the transport went away mid-reload.
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Envelope>,
}

impl ServiceHandle {
    const CALL_TIMEOUT: Duration = Duration::from_secs(8);
    const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(30);
    const RESEND_DELAY: Duration = Duration::from_millis(150);

    pub fn new(tx: mpsc::Sender<Envelope>) -> Self {
        ServiceHandle { tx }
    }

    pub async fn call(&self, request: ServiceRequest) -> Result<ServiceResponse, Error> {
        let wait = match request {
            ServiceRequest::SignIn => Self::SIGN_IN_TIMEOUT,
            _ => Self::CALL_TIMEOUT,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let pending = match self.tx.send((request, reply_tx)).await {
            Ok(()) => reply_rx,
            Err(mpsc::error::SendError((request, _))) => {
                debug!("Service channel send failed, retrying once");
                sleep(Self::RESEND_DELAY).await;
                let (reply_tx, reply_rx) = oneshot::channel();
                self.tx
                    .send((request, reply_tx))
                    .await
                    .map_err(|_| Error::ChannelClosed)?;
                reply_rx
            }
        };

        match timeout(wait, pending).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => Err(Error::Timeout(wait.as_millis() as u64)),
        }
    }
}
