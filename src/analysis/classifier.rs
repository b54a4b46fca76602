use log::debug;

use super::models::MessageMetadata;

/// Phrases that strongly suggest a job application email.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "application",
    "applied",
    "applying",
    "application submitted",
    "thank you for applying",
    "thanks for applying",
    "we have received your application",
    "your application for",
    "submission to",
    "submitted to",
];

/// Keyword based job application classifier.
///
/// Matching is a plain case-insensitive substring test: no stemming, no
/// negation handling and no word boundaries ("applications" matches
/// "application").
#[derive(Debug, Clone)]
pub struct Classifier {
    keywords: Vec<String>,
}

impl Classifier {
    /// Build a classifier from a custom keyword list.
    ///
    /// Keywords are lower-cased and empty entries dropped. Whitespace is
    /// part of the keyword.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Classifier { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Returns true if any keyword appears in `text`.
    pub fn is_job_application(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|keyword| lower.contains(keyword.as_str()))
    }

    /// Snippet or subject, either one matching is enough.
    pub fn matches(&self, message: &MessageMetadata) -> bool {
        let matched = self.is_job_application(&message.snippet)
            || message
                .subject
                .as_deref()
                .is_some_and(|subject| self.is_job_application(subject));

        debug!("Message {} classified as job application: {}", message.id, matched);
        matched
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::new(DEFAULT_KEYWORDS)
    }
}
