use std::str::FromStr;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use super::classifier::Classifier;
use super::models::{MessageMetadata, MessageRef};
use crate::error::{FetchError, FetchResult, RunError};
use crate::store::MessageStore;

/// What to do when a single metadata fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and skip the failed message, keep the rest of the batch.
    #[default]
    Isolate,
    /// Abort the whole batch on the first failure.
    FailFast,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "isolate" | "skip" => Ok(FailurePolicy::Isolate),
            "fail-fast" | "failfast" | "fail_fast" => Ok(FailurePolicy::FailFast),
            other => anyhow::bail!("Unknown failure policy '{}' (expected 'isolate' or 'fail-fast')", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum number of fetches in flight at once.
    pub concurrency: usize,
    /// Delay after which a single fetch is abandoned.
    pub timeout: Duration,
    pub policy: FailurePolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            concurrency: 40,
            timeout: Duration::from_secs(30),
            policy: FailurePolicy::Isolate,
        }
    }
}

/// Result of a fan-out over a batch of message identifiers.
#[derive(Debug, Default)]
pub struct Retrieval {
    /// Messages accepted by the classifier, in completion order.
    pub classified: Vec<MessageMetadata>,
    /// Number of messages whose metadata was fetched.
    pub fetched: usize,
    /// Messages skipped under [`FailurePolicy::Isolate`].
    pub failed: Vec<(MessageRef, FetchError)>,
}

/// Fetch the metadata of one message, bounded by `timeout`.
pub async fn fetch_metadata<S>(store: &S, id: &MessageRef, timeout: Duration) -> FetchResult<MessageMetadata>
where
    S: MessageStore + ?Sized,
{
    match tokio::time::timeout(timeout, store.fetch_metadata(id)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

/// Fetch every message concurrently and keep the ones the classifier accepts.
pub async fn retrieve_classified<S>(
    store: &S,
    ids: Vec<MessageRef>,
    classifier: &Classifier,
    options: &FetchOptions,
) -> Result<Retrieval, RunError>
where
    S: MessageStore + ?Sized,
{
    let mut retrieval = Retrieval::default();
    if ids.is_empty() {
        return Ok(retrieval);
    }

    let total = ids.len();
    let concurrency = options.concurrency.max(1);
    debug!("Fetching metadata for {} message(s), {} at a time", total, concurrency);

    let mut fetches = stream::iter(ids)
        .map(|id| async move {
            let result = fetch_metadata(store, &id, options.timeout).await;
            (id, result)
        })
        .buffer_unordered(concurrency);

    while let Some((id, result)) = fetches.next().await {
        match result {
            Ok(metadata) => {
                retrieval.fetched += 1;
                if classifier.matches(&metadata) {
                    retrieval.classified.push(metadata);
                }
            }
            Err(e) => match options.policy {
                FailurePolicy::FailFast => {
                    warn!("❌ Fetch of message {} failed, aborting batch: {}", id, e);
                    return Err(RunError::Fetch { id: id.0, source: e });
                }
                FailurePolicy::Isolate => {
                    warn!("⚠️  Skipping message {}: {}", id, e);
                    retrieval.failed.push((id, e));
                }
            },
        }
    }

    info!(
        "Fetched {}/{} message(s), {} job application(s), {} skipped",
        retrieval.fetched,
        total,
        retrieval.classified.len(),
        retrieval.failed.len()
    );

    Ok(retrieval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeStore {
        messages: HashMap<String, MessageMetadata>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeStore {
        fn with(mut self, id: &str, snippet: &str) -> Self {
            self.messages.insert(
                id.to_string(),
                MessageMetadata::new(MessageRef::new(id), Some(snippet.to_string()), None, Some(0)),
            );
            self
        }
    }

    impl MessageStore for FakeStore {
        fn list_message_ids<'a>(
            &'a self,
            _query: &'a str,
            _max_results: u32,
        ) -> BoxFuture<'a, anyhow::Result<Vec<MessageRef>>> {
            Box::pin(async move { Ok(self.messages.keys().map(|id| MessageRef::new(id.clone())).collect()) })
        }

        fn fetch_metadata<'a>(&'a self, id: &'a MessageRef) -> BoxFuture<'a, FetchResult<MessageMetadata>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);

                self.messages
                    .get(id.as_str())
                    .cloned()
                    .ok_or_else(|| FetchError::NotFound(id.to_string()))
            })
        }

        fn authorized_identity<'a>(&'a self) -> BoxFuture<'a, anyhow::Result<String>> {
            Box::pin(async { Ok("fake@example.com".to_string()) })
        }
    }

    fn ids(list: &[&str]) -> Vec<MessageRef> {
        list.iter().map(|id| MessageRef::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_empty_batch_issues_no_fetch() {
        let store = FakeStore::default();
        let retrieval = retrieve_classified(&store, Vec::new(), &Classifier::default(), &FetchOptions::default())
            .await
            .unwrap();

        assert!(retrieval.classified.is_empty());
        assert_eq!(retrieval.fetched, 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keeps_only_classified_messages() {
        let store = FakeStore::default()
            .with("a", "Thanks for applying to Initech")
            .with("b", "Dinner tonight?")
            .with("c", "Your application for Backend Developer");

        let retrieval = retrieve_classified(&store, ids(&["a", "b", "c"]), &Classifier::default(), &FetchOptions::default())
            .await
            .unwrap();

        let mut kept: Vec<_> = retrieval.classified.iter().map(|m| m.id.to_string()).collect();
        kept.sort();
        assert_eq!(kept, vec!["a", "c"]);
        assert_eq!(retrieval.fetched, 3);
    }

    #[tokio::test]
    async fn test_isolate_skips_failed_items() {
        let store = FakeStore::default().with("a", "application received");
        let options = FetchOptions { policy: FailurePolicy::Isolate, ..FetchOptions::default() };

        let retrieval = retrieve_classified(&store, ids(&["a", "missing"]), &Classifier::default(), &options)
            .await
            .unwrap();

        assert_eq!(retrieval.classified.len(), 1);
        assert_eq!(retrieval.failed.len(), 1);
        assert_eq!(retrieval.failed[0].0, MessageRef::new("missing"));
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_batch() {
        let store = FakeStore::default().with("a", "application received");
        let options = FetchOptions { policy: FailurePolicy::FailFast, ..FetchOptions::default() };

        let err = retrieve_classified(&store, ids(&["a", "missing"]), &Classifier::default(), &options)
            .await
            .unwrap_err();

        match err {
            RunError::Fetch { id, source: FetchError::NotFound(_) } => assert_eq!(id, "missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut store = FakeStore { delay: Duration::from_millis(10), ..FakeStore::default() };
        for i in 0..20 {
            store = store.with(&format!("m{i}"), "applied");
        }
        let all: Vec<MessageRef> = (0..20).map(|i| MessageRef::new(format!("m{i}"))).collect();
        let options = FetchOptions { concurrency: 4, ..FetchOptions::default() };

        let retrieval = retrieve_classified(&store, all, &Classifier::default(), &options).await.unwrap();

        assert_eq!(retrieval.classified.len(), 20);
        assert!(store.peak.load(Ordering::SeqCst) <= 4);
        assert!(store.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let store = FakeStore { delay: Duration::from_secs(5), ..FakeStore::default() }.with("a", "applied");
        let timeout = Duration::from_millis(20);

        let err = fetch_metadata(&store, &MessageRef::new("a"), timeout).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(d) if d == timeout));
    }

    #[test]
    fn test_failure_policy_from_str() {
        assert_eq!("isolate".parse::<FailurePolicy>().unwrap(), FailurePolicy::Isolate);
        assert_eq!("Fail-Fast".parse::<FailurePolicy>().unwrap(), FailurePolicy::FailFast);
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
