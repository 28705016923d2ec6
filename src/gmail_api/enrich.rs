use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::debug;

use crate::error::Error;
use crate::gmail_api::auth::CredentialSource;
use crate::gmail_api::client::MailClient;
use crate::types::{MessageDetail, MessageMeta, MessagePage};

/// Headers requested for every enrichment fetch.
pub const METADATA_HEADERS: [&str; 3] = ["Subject", "From", "Date"];

/// Concurrent metadata fetches per page. Bounded so a large page cannot
/// overwhelm the mail service or the connection pool.
const DEFAULT_CONCURRENCY: usize = 12;

// Define a trait for metadata lookups to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn message_metadata(&self, id: &str) -> Result<MessageDetail, Error>;
}

#[async_trait]
impl<C: CredentialSource> MetadataSource for MailClient<C> {
    async fn message_metadata(&self, id: &str) -> Result<MessageDetail, Error> {
        self.get_message(id, "metadata", &METADATA_HEADERS).await
    }
}

/// Attaches subject/from/date/snippet metadata to a page of message stubs.
///
/// Fetches run concurrently but results are reassembled by index, so the
/// page order never changes. A failed fetch degrades that entry to empty
/// metadata instead of failing the page.
pub struct MessageEnricher<M: MetadataSource> {
    source: Arc<M>,
    concurrency: usize,
}

impl<M: MetadataSource> MessageEnricher<M> {
    pub fn new(source: Arc<M>) -> Self {
        Self::with_concurrency(source, DEFAULT_CONCURRENCY)
    }

    pub fn with_concurrency(source: Arc<M>, concurrency: usize) -> Self {
        MessageEnricher {
            source,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn enrich(&self, mut page: MessagePage) -> MessagePage {
        // Collected eagerly so the stream type does not borrow `page`;
        // the futures themselves stay lazy until `buffered` polls them.
        let fetches: Vec<_> = page
            .messages
            .iter()
            .map(|stub| {
                let source = Arc::clone(&self.source);
                let id = stub.id.clone();
                async move { source.message_metadata(&id).await }
            })
            .collect();
        // `buffered` preserves input order regardless of completion order.
        let results: Vec<Result<MessageDetail, Error>> = stream::iter(fetches)
            .buffered(self.concurrency)
            .collect()
            .await;

        for (stub, result) in page.messages.iter_mut().zip(results) {
            stub.meta = Some(match result {
                Ok(detail) => MessageMeta {
                    subject: detail.header("Subject").unwrap_or_default(),
                    from: detail.header("From").unwrap_or_default(),
                    date: detail.header("Date").unwrap_or_default(),
                    snippet: detail.snippet.clone().unwrap_or_default(),
                },
                Err(e) => {
                    debug!("Metadata fetch for {} failed: {}", stub.id, e);
                    MessageMeta::default()
                }
            });
        }
        page
    }
}
