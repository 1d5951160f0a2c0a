//! CLI presenter for output formatting

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::entitlement::Entitlement;
use crate::domain::transaction::{TransactionDraft, TransactionType};
use crate::domain::usage::{UsageKind, UsageSnapshot, ALL_USAGE_KINDS};

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.finish_with_message(format!("{} {}", "✓".green(), message)),
            None => self.success(message),
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.finish_with_message(format!("{} {}", "✗".red(), message)),
            None => self.error(message),
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout (results meant for scripts)
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Print today's usage, one line per kind plus the overall bar
    pub fn usage(&self, snapshot: &UsageSnapshot) {
        for kind in ALL_USAGE_KINDS {
            self.key_value(kind.as_str(), &format_kind_usage(snapshot, *kind));
        }
        if snapshot.has_subscription {
            self.key_value("plan", "subscription (unlimited)");
        } else {
            self.key_value("plan", "free");
            self.key_value("used", &format_usage_bar(snapshot.usage_percentage()));
        }
    }

    /// Print the locally mirrored entitlement
    pub fn entitlement(&self, entitlement: Option<&Entitlement>) {
        let Some(e) = entitlement else {
            self.key_value("subscription", "(none)");
            return;
        };
        self.key_value("subscription", e.status.as_str());
        if let Some(ref price) = e.external_price_id {
            self.key_value("price", price);
        }
        if let Some(end) = e.current_period_end {
            self.key_value("period_end", &end.format("%Y-%m-%d").to_string());
        }
    }

    /// Print a transaction draft for confirmation
    pub fn draft(&self, draft: &TransactionDraft) {
        self.output(&format_draft(draft));
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// `1 used, 1 remaining` or `5 used, unlimited remaining`
pub fn format_kind_usage(snapshot: &UsageSnapshot, kind: UsageKind) -> String {
    format!(
        "{} used, {} remaining",
        snapshot.used(kind),
        snapshot.remaining(kind)
    )
}

/// Fixed-width bar for a percentage
pub fn format_usage_bar(percent: f64) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let bar_width = 20;
    let filled = ((percent / 100.0) * bar_width as f64).round() as usize;
    let empty = bar_width - filled;

    format!(
        "[{}{}] {:>3.0}%",
        "█".repeat(filled).cyan(),
        "░".repeat(empty),
        percent
    )
}

/// One-line draft: date, signed amount, category and description
pub fn format_draft(draft: &TransactionDraft) -> String {
    let amount = format!("{:+.2}", draft.signed_amount());
    let amount = match draft.kind {
        TransactionType::Income => amount.green(),
        TransactionType::Expense => amount.red(),
    };
    format!(
        "{}  {}  [{}]  {}",
        draft.date.format("%Y-%m-%d"),
        amount,
        draft.category,
        draft.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::usage::UsageCounter;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn snapshot(transcriptions: u32, has_subscription: bool) -> UsageSnapshot {
        UsageSnapshot {
            counter: UsageCounter {
                day: day(),
                transcription_count: transcriptions,
                natural_input_count: 0,
            },
            has_subscription,
        }
    }

    #[test]
    fn format_usage_bar_at_start() {
        colored::control::set_override(false);
        assert_eq!(format_usage_bar(0.0), format!("[{}]   0%", "░".repeat(20)));
    }

    #[test]
    fn format_usage_bar_at_half() {
        colored::control::set_override(false);
        let bar = format_usage_bar(50.0);
        assert!(bar.contains(&"█".repeat(10)));
        assert!(bar.ends_with(" 50%"));
    }

    #[test]
    fn format_usage_bar_clamps() {
        colored::control::set_override(false);
        assert!(format_usage_bar(140.0).ends_with("100%"));
    }

    #[test]
    fn kind_usage_for_free_and_paid() {
        assert_eq!(
            format_kind_usage(&snapshot(1, false), UsageKind::Transcription),
            "1 used, 1 remaining"
        );
        assert_eq!(
            format_kind_usage(&snapshot(5, true), UsageKind::Transcription),
            "5 used, unlimited remaining"
        );
    }

    #[test]
    fn draft_line_has_signed_amount() {
        colored::control::set_override(false);
        let draft = TransactionDraft {
            description: "Cena fuori".to_string(),
            amount: 45.0,
            category: "Cibo".to_string(),
            kind: TransactionType::Expense,
            date: day(),
        };
        assert_eq!(format_draft(&draft), "2026-03-01  -45.00  [Cibo]  Cena fuori");
    }
}
