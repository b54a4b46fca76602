use anyhow::Result;
use chrono::{DateTime, TimeZone};
use futures::future::BoxFuture;
use log::{error, info, warn};

use crate::analysis::{aggregate, retrieve_classified, Classifier, FetchOptions, RunOutcome, RunStatus};
use crate::config::Config;
use crate::error::RunError;
use crate::identity::IdentityMode;
use crate::store::MessageStore;

pub const DEFAULT_QUERY: &str = "in:inbox";
pub const DEFAULT_MAX_RESULTS: u32 = 500;

/// Resolves an identity and hands back a store bound to its credential.
pub trait StoreOpener: Send + Sync {
    fn open<'a>(&'a self, mode: IdentityMode) -> BoxFuture<'a, Result<Box<dyn MessageStore>>>;
}

/// Orchestrates one analysis run: list, fetch and classify, aggregate.
#[derive(Debug, Clone)]
pub struct Pipeline {
    query: String,
    max_results: u32,
    classifier: Classifier,
    fetch_options: FetchOptions,
}

impl Pipeline {
    pub fn new(classifier: Classifier, fetch_options: FetchOptions) -> Self {
        Pipeline {
            query: DEFAULT_QUERY.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            classifier,
            fetch_options,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Pipeline::new(config.classifier(), config.fetch_options()?)
            .with_query(&config.gmail.query, config.gmail.max_results))
    }

    pub fn with_query(mut self, query: &str, max_results: u32) -> Self {
        self.query = query.to_string();
        self.max_results = max_results;
        self
    }

    /// Obtain a store for `mode` and run the analysis. Never fails, errors
    /// are reported through [`RunStatus::Failed`].
    pub async fn execute<Tz: TimeZone>(
        &self,
        opener: &dyn StoreOpener,
        mode: IdentityMode,
        now: &DateTime<Tz>,
    ) -> RunOutcome {
        let store = match opener.open(mode).await {
            Ok(store) => store,
            Err(e) => {
                let e = RunError::Credential(format!("{:#}", e));
                error!("❌ {}", e);
                return RunOutcome::failed(e.to_string());
            }
        };

        self.run(&*store, now).await
    }

    /// Run the analysis against an already authorized store.
    pub async fn run<S, Tz>(&self, store: &S, now: &DateTime<Tz>) -> RunOutcome
    where
        S: MessageStore + ?Sized,
        Tz: TimeZone,
    {
        let authorized_identity = match store.authorized_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!("⚠️  Could not resolve the authorized identity: {:#}", e);
                String::new()
            }
        };
        info!("Running analysis for '{}'", authorized_identity);

        let mut outcome = RunOutcome {
            authorized_identity,
            analysis: None,
            status: RunStatus::NoMessages,
            scanned: 0,
            skipped: 0,
        };

        let ids = match store.list_message_ids(&self.query, self.max_results).await {
            Ok(ids) => ids,
            Err(e) => {
                let e = RunError::Listing(format!("{:#}", e));
                error!("❌ {}", e);
                outcome.status = RunStatus::Failed { reason: e.to_string() };
                return outcome;
            }
        };

        if ids.is_empty() {
            info!("No emails found matching '{}'", self.query);
            return outcome;
        }

        let retrieval = match retrieve_classified(store, ids, &self.classifier, &self.fetch_options).await {
            Ok(retrieval) => retrieval,
            Err(e) => {
                error!("❌ {}", e);
                outcome.status = RunStatus::Failed { reason: e.to_string() };
                return outcome;
            }
        };

        outcome.scanned = retrieval.fetched;
        outcome.skipped = retrieval.failed.len();

        match aggregate(&retrieval.classified, now) {
            Some(analysis) => {
                info!(
                    "✅ {} job application(s), {:.2} per day, {} month(s)",
                    analysis.total_applications,
                    analysis.average_per_day,
                    analysis.monthly_count.len()
                );
                outcome.analysis = Some(analysis);
                outcome.status = RunStatus::Completed;
            }
            None => {
                info!("No job application found among {} email(s)", retrieval.fetched);
                outcome.status = RunStatus::NoApplications;
            }
        }

        outcome
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new(Classifier::default(), FetchOptions::default())
    }
}
