use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use log::{info, warn};
use serde::Deserialize;

use crate::analysis::{MessageMetadata, MessageRef};
use crate::error::{FetchError, FetchResult};
use crate::identity::IdentityMode;
use crate::pipeline::StoreOpener;
use crate::store::{find_subject, parse_epoch_millis, MessageStore};

/// Mailbox export in the shape of the Gmail REST API, used for offline runs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MailboxExport {
    #[serde(default)]
    email_address: String,
    #[serde(default)]
    messages: Vec<ExportedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedMessage {
    id: String,
    snippet: Option<String>,
    internal_date: Option<String>,
    payload: Option<ExportedPayload>,
}

#[derive(Debug, Deserialize)]
struct ExportedPayload {
    #[serde(default)]
    headers: Vec<ExportedHeader>,
}

#[derive(Debug, Deserialize)]
struct ExportedHeader {
    name: String,
    value: Option<String>,
}

/// Message store backed by a JSON export instead of the live API.
pub struct FixtureStore {
    email_address: String,
    order: Vec<MessageRef>,
    messages: HashMap<MessageRef, MessageMetadata>,
}

impl FixtureStore {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading mailbox fixture from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read fixture file {}", path.display()))?;

        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let export: MailboxExport =
            serde_json::from_str(json).context("Invalid mailbox fixture JSON")?;

        let mut order = Vec::with_capacity(export.messages.len());
        let mut messages = HashMap::with_capacity(export.messages.len());

        for message in export.messages {
            let id = MessageRef::new(message.id);

            let received_at_millis = match message.internal_date.as_deref() {
                Some(raw) => {
                    let parsed = parse_epoch_millis(raw);
                    if parsed.is_none() {
                        warn!("Message {} has an unparseable internalDate '{}'", id, raw);
                    }
                    parsed
                }
                None => None,
            };

            let subject = message.payload.and_then(|payload| {
                find_subject(
                    payload
                        .headers
                        .iter()
                        .map(|h| (h.name.as_str(), h.value.as_deref())),
                )
            });

            let metadata = MessageMetadata::new(id.clone(), message.snippet, subject, received_at_millis);
            order.push(id.clone());
            messages.insert(id, metadata);
        }

        Ok(FixtureStore {
            email_address: export.email_address,
            order,
            messages,
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl MessageStore for FixtureStore {
    fn list_message_ids<'a>(
        &'a self,
        _query: &'a str,
        max_results: u32,
    ) -> BoxFuture<'a, Result<Vec<MessageRef>>> {
        // Fixtures are already scoped, the query is not interpreted
        let ids = self.order.iter().take(max_results as usize).cloned().collect();
        Box::pin(async move { Ok(ids) })
    }

    fn fetch_metadata<'a>(&'a self, id: &'a MessageRef) -> BoxFuture<'a, FetchResult<MessageMetadata>> {
        let result = self
            .messages
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(id.to_string()));
        Box::pin(async move { result })
    }

    fn authorized_identity<'a>(&'a self) -> BoxFuture<'a, Result<String>> {
        let email = self.email_address.clone();
        Box::pin(async move { Ok(email) })
    }
}

/// Reloads the fixture for every run, whatever identity mode is asked for.
pub struct FixtureOpener {
    path: PathBuf,
}

impl FixtureOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FixtureOpener { path: path.into() }
    }
}

impl StoreOpener for FixtureOpener {
    fn open<'a>(&'a self, mode: IdentityMode) -> BoxFuture<'a, Result<Box<dyn MessageStore>>> {
        Box::pin(async move {
            if mode == IdentityMode::SwitchAccount {
                info!("Fixture mode: account switch has no effect");
            }
            let store = FixtureStore::from_file(&self.path)?;
            Ok(Box::new(store) as Box<dyn MessageStore>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "emailAddress": "candidate@example.com",
        "messages": [
            {
                "id": "m1",
                "snippet": "Thanks for applying",
                "internalDate": "1704449600000",
                "payload": { "headers": [ { "name": "Subject", "value": "Acme careers" } ] }
            },
            { "id": "m2", "internalDate": "yesterday" },
            { "id": "m3", "snippet": "hello" }
        ]
    }"#;

    #[tokio::test]
    async fn test_loads_gmail_shaped_export() {
        let store = FixtureStore::from_json(EXPORT).unwrap();
        assert_eq!(store.len(), 3);

        let m1 = store.fetch_metadata(&MessageRef::new("m1")).await.unwrap();
        assert_eq!(m1.subject.as_deref(), Some("Acme careers"));
        assert_eq!(m1.received_at_millis, Some(1_704_449_600_000));

        let m2 = store.fetch_metadata(&MessageRef::new("m2")).await.unwrap();
        assert_eq!(m2.snippet, "");
        assert!(m2.received_at_millis.is_none());

        assert_eq!(store.authorized_identity().await.unwrap(), "candidate@example.com");
    }

    #[test]
    fn test_listing_respects_cap_and_order() {
        let store = FixtureStore::from_json(EXPORT).unwrap();
        let ids = tokio_test::block_on(store.list_message_ids("in:inbox", 2)).unwrap();
        assert_eq!(ids, vec![MessageRef::new("m1"), MessageRef::new("m2")]);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = FixtureStore::from_json(EXPORT).unwrap();
        let err = store.fetch_metadata(&MessageRef::new("nope")).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_opener_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, EXPORT.as_bytes()).unwrap();

        let opener = FixtureOpener::new(file.path());
        let store = opener.open(IdentityMode::Cached).await.unwrap();
        assert_eq!(store.list_message_ids("in:inbox", 500).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_opener_missing_file_fails() {
        let opener = FixtureOpener::new("/nonexistent/mailbox.json");
        assert!(opener.open(IdentityMode::Cached).await.is_err());
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(FixtureStore::from_json("{ not json").is_err());
    }
}
