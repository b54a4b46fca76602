use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::analysis::{Classifier, FailurePolicy, FetchOptions, DEFAULT_KEYWORDS};

/// Largest page a single Gmail `messages.list` call returns.
pub const MAX_LIST_PAGE: u32 = 500;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gmail: GmailConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    /// Only needed for live runs, fixture runs never authenticate.
    pub credentials_path: Option<String>,
    pub token_cache_path: String,
    pub query: String,
    pub max_results: u32,
    pub list_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    pub keywords: Vec<String>,
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub failure_policy: String,
}

impl Config {
    pub fn new() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Config {
            gmail: GmailConfig {
                credentials_path: lookup("GMAIL_CREDENTIALS_PATH"),
                token_cache_path: var("GMAIL_TOKEN_CACHE_PATH", "./gmail-token-cache.json"),
                query: var("JOBTRAIL_QUERY", "in:inbox"),
                max_results: var("JOBTRAIL_MAX_RESULTS", "500")
                    .parse()
                    .context("JOBTRAIL_MAX_RESULTS must be a positive integer")?,
                list_timeout_secs: var("JOBTRAIL_LIST_TIMEOUT_SECS", "60")
                    .parse()
                    .context("JOBTRAIL_LIST_TIMEOUT_SECS must be a number of seconds")?,
            },
            analysis: AnalysisConfig {
                keywords: match lookup("JOBTRAIL_KEYWORDS") {
                    Some(list) => list
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                    None => DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
                },
                fetch_concurrency: var("JOBTRAIL_FETCH_CONCURRENCY", "40")
                    .parse()
                    .context("JOBTRAIL_FETCH_CONCURRENCY must be a positive integer")?,
                fetch_timeout_secs: var("JOBTRAIL_FETCH_TIMEOUT_SECS", "30")
                    .parse()
                    .context("JOBTRAIL_FETCH_TIMEOUT_SECS must be a number of seconds")?,
                failure_policy: var("JOBTRAIL_FAILURE_POLICY", "isolate"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.gmail.max_results == 0 || self.gmail.max_results > MAX_LIST_PAGE {
            anyhow::bail!("JOBTRAIL_MAX_RESULTS must be between 1 and {}", MAX_LIST_PAGE);
        }
        if self.gmail.list_timeout_secs == 0 {
            anyhow::bail!("JOBTRAIL_LIST_TIMEOUT_SECS must be greater than 0");
        }
        if self.analysis.fetch_timeout_secs == 0 {
            anyhow::bail!("JOBTRAIL_FETCH_TIMEOUT_SECS must be greater than 0");
        }
        if self.analysis.fetch_concurrency == 0 {
            anyhow::bail!("JOBTRAIL_FETCH_CONCURRENCY must be greater than 0");
        }
        if self.analysis.keywords.is_empty() {
            anyhow::bail!("JOBTRAIL_KEYWORDS is set but contains no keyword");
        }
        self.failure_policy()?;
        Ok(())
    }

    pub fn failure_policy(&self) -> Result<FailurePolicy> {
        self.analysis.failure_policy.parse()
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(&self.analysis.keywords)
    }

    pub fn fetch_options(&self) -> Result<FetchOptions> {
        Ok(FetchOptions {
            concurrency: self.analysis.fetch_concurrency,
            timeout: Duration::from_secs(self.analysis.fetch_timeout_secs),
            policy: self.failure_policy()?,
        })
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.gmail.list_timeout_secs)
    }
}

impl GmailConfig {
    pub fn require_credentials(&self) -> Result<&str> {
        match self.credentials_path.as_deref() {
            Some(path) => Ok(path),
            None => anyhow::bail!(
                "Missing environment variable: GMAIL_CREDENTIALS_PATH\n\
                 \n\
                 💡 Solutions :\n\
                 1. Create a .env file with your credentials:\n\
                    GMAIL_CREDENTIALS_PATH=/path/to/client_credentials.json\n\
                 \n\
                 2. Or export it manually:\n\
                    export GMAIL_CREDENTIALS_PATH=/path/to/client_credentials.json\n\
                 \n\
                 3. Or run offline with --fixture <messages.json>"
            ),
        }
    }
}
