use anyhow::Result;
use futures::future::BoxFuture;

use crate::analysis::{MessageMetadata, MessageRef};
use crate::error::FetchResult;

/// Message store the pipeline reads from.
///
/// Implementations carry their own credential; it is shared read-only by all
/// concurrent fetches of a run.
pub trait MessageStore: Send + Sync {
    /// List message identifiers matching `query`, at most `max_results`.
    fn list_message_ids<'a>(
        &'a self,
        query: &'a str,
        max_results: u32,
    ) -> BoxFuture<'a, Result<Vec<MessageRef>>>;

    /// Fetch the metadata-only projection of one message.
    fn fetch_metadata<'a>(&'a self, id: &'a MessageRef) -> BoxFuture<'a, FetchResult<MessageMetadata>>;

    /// Email address of the account the credential belongs to.
    fn authorized_identity<'a>(&'a self) -> BoxFuture<'a, Result<String>>;
}

/// Parse an epoch-millisecond timestamp as sent by the Gmail API (decimal string).
pub fn parse_epoch_millis(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// Value of the first header named "subject", compared case-insensitively.
pub fn find_subject<'h, I>(headers: I) -> Option<String>
where
    I: IntoIterator<Item = (&'h str, Option<&'h str>)>,
{
    headers
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("subject"))
        .and_then(|(_, value)| value.map(str::to_string))
}
