use crate::analysis::{RunOutcome, RunStatus};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

/// Render an outcome as plain text for the terminal.
pub fn render(outcome: &RunOutcome) -> String {
    let identity = if outcome.authorized_identity.is_empty() {
        "unknown"
    } else {
        outcome.authorized_identity.as_str()
    };

    let mut lines = vec![format!("Analysis for: {}", identity)];

    let analysis = match (&outcome.status, &outcome.analysis) {
        (RunStatus::Failed { reason }, _) => {
            lines.push(format!("Analysis failed: {}", reason));
            return lines.join("\n");
        }
        (_, Some(analysis)) => analysis,
        (_, None) => {
            lines.push("No data available. Either no job applications found or Gmail access was not granted.".to_string());
            return lines.join("\n");
        }
    };

    lines.push(format!("Total applications: {}", analysis.total_applications));
    lines.push("Applications per month:".to_string());
    for (key, count) in &analysis.monthly_count {
        lines.push(format!("  {}: {}", month_label(key), count));
    }
    lines.push(format!("Average per day: {:.2}", analysis.average_per_day));
    lines.push(format!("Today's applications: {}", analysis.todays_count));

    if outcome.skipped > 0 {
        lines.push(format!(
            "Warning: {} of {} email(s) could not be fetched",
            outcome.skipped,
            outcome.scanned + outcome.skipped
        ));
    }

    lines.join("\n")
}

/// "2024-03" -> "March, 2024"
fn month_label(key: &str) -> String {
    let Some((year, month)) = key.split_once('-') else {
        return key.to_string();
    };

    let name = month
        .parse::<usize>()
        .ok()
        .and_then(|m| m.checked_sub(1))
        .and_then(|index| MONTH_NAMES.get(index))
        .copied()
        .unwrap_or("Unknown");

    format!("{}, {}", name, year)
}
