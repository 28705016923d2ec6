use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mailsweep::error::Error;
use mailsweep::gmail_api::{
    CredentialRecord, CredentialStore, IdentityProvider, MailClient, RequestExecutor,
    TokenManager,
};
use mailsweep::gmail_api::auth::UserProfile;
use mailsweep::service::{self, MailService, ServiceRequest, ServiceResponse};

/// Credential store shared with the test body for assertions.
#[derive(Clone, Default)]
struct SharedStore(Arc<Mutex<Option<CredentialRecord>>>);

impl SharedStore {
    fn seeded(token: &str) -> Self {
        let store = SharedStore::default();
        *store.0.lock().unwrap() = Some(CredentialRecord {
            token: token.to_string(),
            obtained_at: 1_700_000_000_000,
            email: Some("user@example.com".to_string()),
            name: None,
            picture: None,
        });
        store
    }

    fn token(&self) -> Option<String> {
        self.0.lock().unwrap().as_ref().map(|r| r.token.clone())
    }
}

impl CredentialStore for SharedStore {
    fn load(&self) -> Result<Option<CredentialRecord>, Error> {
        Ok(self.0.lock().unwrap().clone())
    }
    fn save(&self, record: &CredentialRecord) -> Result<(), Error> {
        *self.0.lock().unwrap() = Some(record.clone());
        Ok(())
    }
    fn delete(&self) -> Result<(), Error> {
        *self.0.lock().unwrap() = None;
        Ok(())
    }
}

/// Identity provider that hands out a scripted sequence of tokens and
/// records what it was asked to invalidate.
#[derive(Clone, Default)]
struct ScriptedProvider {
    tokens: Arc<Mutex<VecDeque<String>>>,
    invalidated: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    fn with_tokens(tokens: &[&str]) -> Self {
        let provider = ScriptedProvider::default();
        provider
            .tokens
            .lock()
            .unwrap()
            .extend(tokens.iter().map(|t| t.to_string()));
        provider
    }

    fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn issue(&self, _interactive: bool) -> Result<String, Error> {
        self.tokens
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::AuthDenied("no more scripted tokens".to_string()))
    }

    async fn invalidate(&self, token: &str) -> Result<(), Error> {
        self.invalidated.lock().unwrap().push(token.to_string());
        Ok(())
    }

    async fn fetch_profile(&self, _token: &str) -> Result<UserProfile, Error> {
        Ok(UserProfile {
            email: "user@example.com".to_string(),
            name: Some("Test User".to_string()),
            picture: None,
        })
    }
}

fn spawn_service(
    store: SharedStore,
    provider: ScriptedProvider,
    base_url: String,
) -> service::ServiceHandle {
    let manager = Arc::new(TokenManager::new(store, provider));
    let client = Arc::new(MailClient::with_base_url(
        RequestExecutor::new(Arc::clone(&manager)),
        base_url,
    ));
    service::spawn(MailService::new(manager, client))
}

#[tokio::test]
async fn sign_in_status_sign_out_round_trip() {
    let store = SharedStore::default();
    let provider = ScriptedProvider::with_tokens(&["tok-1"]);
    let handle = spawn_service(store.clone(), provider.clone(), "http://unused".to_string());

    match handle.call(ServiceRequest::SignIn).await.unwrap() {
        ServiceResponse::SignIn {
            success, email, ..
        } => {
            assert!(success);
            assert_eq!(email.as_deref(), Some("user@example.com"));
        }
        other => panic!("unexpected response {:?}", other),
    }

    match handle.call(ServiceRequest::GetSigninStatus).await.unwrap() {
        ServiceResponse::SigninStatus { signed_in, email } => {
            assert!(signed_in);
            assert_eq!(email.as_deref(), Some("user@example.com"));
        }
        other => panic!("unexpected response {:?}", other),
    }

    match handle.call(ServiceRequest::SignOut).await.unwrap() {
        ServiceResponse::SignOut { success } => assert!(success),
        other => panic!("unexpected response {:?}", other),
    }
    assert_eq!(provider.invalidated(), vec!["tok-1"]);
    assert_eq!(store.token(), None);

    match handle.call(ServiceRequest::GetSigninStatus).await.unwrap() {
        ServiceResponse::SigninStatus { signed_in, .. } => assert!(!signed_in),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn search_returns_enriched_page_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"id": "m1", "threadId": "t1"}, {"id": "m2"}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "m1",
            "snippet": "first snippet",
            "payload": {"headers": [
                {"name": "Subject", "value": "First"},
                {"name": "From", "value": "a@example.com"},
                {"name": "Date", "value": "Mon, 1 Jan 2024 00:00:00 +0000"}
            ]}
        })))
        .mount(&server)
        .await;
    // The second metadata fetch fails; the page must still come back whole.
    Mock::given(method("GET"))
        .and(path("/messages/m2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let handle = spawn_service(
        SharedStore::seeded("tok-1"),
        ScriptedProvider::default(),
        server.uri(),
    );

    let page = match handle
        .call(ServiceRequest::Search {
            query: "from:news".to_string(),
        })
        .await
        .unwrap()
    {
        ServiceResponse::Search(page) => page,
        other => panic!("unexpected response {:?}", other),
    };

    assert_eq!(page.messages.len(), 2);
    assert_eq!(page.messages[0].id, "m1");
    assert_eq!(page.messages[1].id, "m2");
    let first = page.messages[0].meta.as_ref().unwrap();
    assert_eq!(first.subject, "First");
    assert_eq!(first.snippet, "first snippet");
    let second = page.messages[1].meta.as_ref().unwrap();
    assert!(second.subject.is_empty());
    assert!(second.snippet.is_empty());
}

#[tokio::test]
async fn rejected_token_is_refreshed_mid_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/messages"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
        .expect(1)
        .mount(&server)
        .await;

    let store = SharedStore::seeded("expired");
    let provider = ScriptedProvider::with_tokens(&["fresh"]);
    let handle = spawn_service(store.clone(), provider.clone(), server.uri());

    match handle
        .call(ServiceRequest::Search {
            query: String::new(),
        })
        .await
        .unwrap()
    {
        ServiceResponse::Search(page) => assert!(page.messages.is_empty()),
        other => panic!("unexpected response {:?}", other),
    }

    // The stale token was invalidated before reissue, and the record now
    // holds the replacement.
    assert_eq!(provider.invalidated(), vec!["expired"]);
    assert_eq!(store.token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn batch_trash_posts_ids_and_empty_set_is_local() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages/batchDelete"))
        .and(body_json(json!({"ids": ["m1", "m2"]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let handle = spawn_service(
        SharedStore::seeded("tok-1"),
        ScriptedProvider::default(),
        server.uri(),
    );

    match handle
        .call(ServiceRequest::BatchTrash {
            ids: vec!["m1".to_string(), "m2".to_string()],
        })
        .await
        .unwrap()
    {
        ServiceResponse::BatchTrash { success, .. } => assert!(success),
        other => panic!("unexpected response {:?}", other),
    }

    // Empty set: still a success, no additional request hits the server.
    match handle
        .call(ServiceRequest::BatchTrash { ids: vec![] })
        .await
        .unwrap()
    {
        ServiceResponse::BatchTrash { success, .. } => assert!(success),
        other => panic!("unexpected response {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn access_token_request_honors_force_refresh() {
    let store = SharedStore::seeded("cached");
    let provider = ScriptedProvider::with_tokens(&["replacement"]);
    let handle = spawn_service(store.clone(), provider.clone(), "http://unused".to_string());

    // Cached path first: no provider traffic.
    match handle
        .call(ServiceRequest::GetAccessToken {
            interactive: false,
            force_refresh: false,
        })
        .await
        .unwrap()
    {
        ServiceResponse::AccessToken { success, token, .. } => {
            assert!(success);
            assert_eq!(token.as_deref(), Some("cached"));
        }
        other => panic!("unexpected response {:?}", other),
    }

    match handle
        .call(ServiceRequest::GetAccessToken {
            interactive: true,
            force_refresh: true,
        })
        .await
        .unwrap()
    {
        ServiceResponse::AccessToken { success, token, .. } => {
            assert!(success);
            assert_eq!(token.as_deref(), Some("replacement"));
        }
        other => panic!("unexpected response {:?}", other),
    }
    assert_eq!(provider.invalidated(), vec!["cached"]);
}
