use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, TimeZone};
use log::{debug, warn};

use super::models::{AnalysisResult, MessageMetadata};

const MILLIS_PER_DAY: i64 = 1000 * 60 * 60 * 24;

/// Compute application statistics over classified messages.
///
/// Timestamps are projected into the time zone of `now`, which is also the
/// reference for `todays_count`. Messages without a timestamp are left out of
/// every figure. Returns `None` only when `messages` is empty.
pub fn aggregate<Tz: TimeZone>(
    messages: &[MessageMetadata],
    now: &DateTime<Tz>,
) -> Option<AnalysisResult> {
    if messages.is_empty() {
        return None;
    }

    let timezone = now.timezone();
    let mut dates: Vec<DateTime<Tz>> = messages
        .iter()
        .filter_map(|message| {
            let millis = message.received_at_millis?;
            let date = DateTime::from_timestamp_millis(millis);
            if date.is_none() {
                warn!("Message {} has an out of range timestamp: {}", message.id, millis);
            }
            date
        })
        .map(|date| date.with_timezone(&timezone))
        .collect();

    let untimed = messages.len() - dates.len();
    if untimed > 0 {
        debug!("{} classified message(s) without timestamp excluded from statistics", untimed);
    }

    let total_applications = dates.len();

    let mut monthly_count = BTreeMap::new();
    for date in &dates {
        *monthly_count.entry(month_key(date)).or_insert(0) += 1;
    }

    dates.sort();
    let average_per_day = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => {
            let span = span_in_days(first, last);
            total_applications as f64 / span as f64
        }
        _ => 0.0,
    };

    let today = now.date_naive();
    let todays_count = dates.iter().filter(|date| date.date_naive() == today).count();

    Some(AnalysisResult {
        total_applications,
        monthly_count,
        average_per_day,
        todays_count,
    })
}

/// "YYYY-MM" bucket key, month is 1-based and zero padded.
pub fn month_key<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Inclusive number of whole days between two instants, never less than 1.
fn span_in_days<Tz: TimeZone>(first: &DateTime<Tz>, last: &DateTime<Tz>) -> i64 {
    let elapsed = last.timestamp_millis() - first.timestamp_millis();
    elapsed.div_euclid(MILLIS_PER_DAY).max(0) + 1
}
