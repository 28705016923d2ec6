use serde_json::json;

use crate::error::Error;
use crate::gmail_api::auth::CredentialSource;
use crate::gmail_api::executor::{ApiRequest, RequestExecutor};
use crate::types::{LabelsResponse, ListMessagesResponse, MessageDetail, MessagePage, TrashOutcome};

/// Gmail API base URL (user scope is always `me`).
const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Stateless façade over the Gmail REST surface.
///
/// Search queries pass through verbatim; this layer knows nothing about the
/// query grammar. Authorization failures are handled entirely inside the
/// executor's 401 path.
pub struct MailClient<C: CredentialSource> {
    executor: RequestExecutor<C>,
    base_url: String,
}

impl<C: CredentialSource> MailClient<C> {
    pub fn new(executor: RequestExecutor<C>) -> Self {
        Self::with_base_url(executor, API_BASE)
    }

    /// Override the API base, used by tests to point at a local server.
    pub fn with_base_url(executor: RequestExecutor<C>, base_url: impl Into<String>) -> Self {
        MailClient {
            executor,
            base_url: base_url.into(),
        }
    }

    /// List message stubs matching `query`, one page at a time.
    pub async fn list_messages(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage, Error> {
        let mut request = ApiRequest::get(format!("{}/messages", self.base_url))
            .query("maxResults", max_results.to_string());
        if !query.is_empty() {
            request = request.query("q", query);
        }
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }
        let list: ListMessagesResponse = self.executor.execute(request).await?;
        Ok(list.into())
    }

    /// Fetch one message. `header_names` selects which headers come back;
    /// an empty selection leaves it to the service's default set.
    pub async fn get_message(
        &self,
        id: &str,
        format: &str,
        header_names: &[&str],
    ) -> Result<MessageDetail, Error> {
        let mut request = ApiRequest::get(format!(
            "{}/messages/{}",
            self.base_url,
            urlencoding::encode(id)
        ));
        if !format.is_empty() {
            request = request.query("format", format);
        }
        for name in header_names {
            // Repeatable parameter, one pair per requested header.
            request = request.query("metadataHeaders", *name);
        }
        self.executor.execute(request).await
    }

    /// Move a batch of messages to the trash. An empty id set short-circuits
    /// to a `no-ids` outcome without any network call.
    pub async fn batch_trash(&self, ids: &[String]) -> Result<TrashOutcome, Error> {
        if ids.is_empty() {
            return Ok(TrashOutcome::no_ids());
        }
        let request = ApiRequest::post(
            format!("{}/messages/batchDelete", self.base_url),
            json!({ "ids": ids }),
        );
        self.executor.execute_empty(request).await?;
        Ok(TrashOutcome::trashed(ids.len()))
    }

    pub async fn list_labels(&self) -> Result<LabelsResponse, Error> {
        self.executor
            .execute(ApiRequest::get(format!("{}/labels", self.base_url)))
            .await
    }
}
