use serde::{Deserialize, Serialize};

/// One page of a search result: ordered message stubs plus an optional
/// continuation cursor. Enrichment fills in `meta` without reordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<MessageStub>,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStub {
    pub id: String,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Per-message header metadata, attached by the enricher. Empty fields
    /// mean the metadata fetch for this id failed.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<MessageMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMeta {
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
}

/// Raw list response from `GET /messages`.
#[derive(Debug, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

impl From<ListMessagesResponse> for MessagePage {
    fn from(list: ListMessagesResponse) -> Self {
        MessagePage {
            messages: list
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| MessageStub {
                    id: m.id,
                    thread_id: m.thread_id,
                    meta: None,
                })
                .collect(),
            next_page_token: list.next_page_token,
        }
    }
}

/// Single message as returned by `GET /messages/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDetail {
    pub id: Option<String>,
    pub snippet: Option<String>,
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePart {
    pub headers: Option<Vec<Header>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: Option<String>,
    pub value: Option<String>,
}

impl MessageDetail {
    /// Value of the first header matching `name` (case-sensitive, matching
    /// the names requested via `metadataHeaders`).
    pub fn header(&self, name: &str) -> Option<String> {
        self.payload
            .as_ref()
            .and_then(|p| p.headers.as_ref())
            .and_then(|headers| {
                headers
                    .iter()
                    .find(|h| h.name.as_deref() == Some(name))
                    .and_then(|h| h.value.clone())
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct LabelsResponse {
    pub labels: Option<Vec<Label>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Outcome of a batch trash call. The empty-id short circuit reports
/// `{"result": "no-ids"}` without touching the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrashOutcome {
    pub result: String,
}

impl TrashOutcome {
    pub fn no_ids() -> Self {
        TrashOutcome {
            result: "no-ids".to_string(),
        }
    }

    pub fn trashed(count: usize) -> Self {
        TrashOutcome {
            result: format!("trashed-{}", count),
        }
    }
}
