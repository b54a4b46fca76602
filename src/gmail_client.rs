use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use google_gmail1::api::{Message, Scope};
use google_gmail1::{hyper, hyper_rustls, Gmail};
use log::{debug, info};

use crate::analysis::{MessageMetadata, MessageRef};
use crate::error::{FetchError, FetchResult};
use crate::identity::{Credential, IdentityMode, IdentityProvider};
use crate::pipeline::StoreOpener;
use crate::store::{find_subject, MessageStore};

type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>;

const USER_ID: &str = "me";

/// Read-only Gmail access bound to one bearer credential.
pub struct GmailClient {
    hub: GmailHub,
    list_timeout: Duration,
}

impl GmailClient {
    pub fn new(credential: &Credential, list_timeout: Duration) -> Result<Self> {
        debug!("Building Gmail API client");

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        let client = hyper::Client::builder().build(connector);

        // The bearer token is handed to the hub as-is, it is never refreshed mid-run
        let hub = Gmail::new(client, credential.secret().to_string());

        Ok(GmailClient { hub, list_timeout })
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
        info!("Searching for emails matching '{}' (max {})", query, max_results);

        let call = self
            .hub
            .users()
            .messages_list(USER_ID)
            .q(query)
            .max_results(max_results)
            .add_scope(Scope::Readonly)
            .doit();

        let result = tokio::time::timeout(self.list_timeout, call)
            .await
            .with_context(|| format!("Listing timed out after {:?}", self.list_timeout))?
            .context("Error searching for emails")?;

        let message_ids: Vec<MessageRef> = result
            .1
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| msg.id)
            .map(MessageRef)
            .collect();

        info!("Found {} email(s) matching '{}'", message_ids.len(), query);

        Ok(message_ids)
    }

    async fn metadata(&self, id: &MessageRef) -> FetchResult<MessageMetadata> {
        debug!("Retrieving email metadata for ID: {}", id);

        let (_, message) = self
            .hub
            .users()
            .messages_get(USER_ID, id.as_str())
            .format("metadata")
            .add_metadata_headers("Subject")
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .map_err(|e| fetch_error(id, e))?;

        Ok(metadata_from_message(id, message))
    }

    async fn profile_email(&self) -> Result<String> {
        let (_, profile) = self
            .hub
            .users()
            .get_profile(USER_ID)
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .context("Unable to retrieve Gmail profile")?;

        Ok(profile.email_address.unwrap_or_default())
    }
}

impl MessageStore for GmailClient {
    fn list_message_ids<'a>(
        &'a self,
        query: &'a str,
        max_results: u32,
    ) -> BoxFuture<'a, Result<Vec<MessageRef>>> {
        Box::pin(self.search(query, max_results))
    }

    fn fetch_metadata<'a>(&'a self, id: &'a MessageRef) -> BoxFuture<'a, FetchResult<MessageMetadata>> {
        Box::pin(self.metadata(id))
    }

    fn authorized_identity<'a>(&'a self) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.profile_email())
    }
}

/// Opens a [`GmailClient`] for whichever account the identity provider yields.
pub struct GmailOpener {
    provider: IdentityProvider,
    list_timeout: Duration,
}

impl GmailOpener {
    pub fn new(provider: IdentityProvider, list_timeout: Duration) -> Self {
        GmailOpener { provider, list_timeout }
    }
}

impl StoreOpener for GmailOpener {
    fn open<'a>(&'a self, mode: IdentityMode) -> BoxFuture<'a, Result<Box<dyn MessageStore>>> {
        Box::pin(async move {
            let credential = self.provider.credential(mode).await?;
            let client = GmailClient::new(&credential, self.list_timeout)
                .context("Unable to connect to Gmail API")?;
            info!("✅ Gmail API connection established successfully");
            Ok(Box::new(client) as Box<dyn MessageStore>)
        })
    }
}

fn fetch_error(id: &MessageRef, error: google_gmail1::Error) -> FetchError {
    match error {
        google_gmail1::Error::Failure(response) if response.status() == hyper::StatusCode::NOT_FOUND => {
            FetchError::NotFound(id.to_string())
        }
        // Also covers an unparseable internalDate, the hub decodes it as i64
        google_gmail1::Error::JsonDecodeError(_, e) => FetchError::Malformed(e.to_string()),
        other => FetchError::Transport(other.to_string()),
    }
}

/// Project a Gmail message in "metadata" format onto the fields the analysis needs.
pub fn metadata_from_message(id: &MessageRef, message: Message) -> MessageMetadata {
    let subject = message
        .payload
        .and_then(|payload| payload.headers)
        .and_then(|headers| {
            find_subject(
                headers
                    .iter()
                    .filter_map(|h| h.name.as_deref().map(|name| (name, h.value.as_deref()))),
            )
        });

    MessageMetadata::new(id.clone(), message.snippet, subject, message.internal_date)
}
