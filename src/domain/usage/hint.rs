//! Locally remembered quota denials

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::UsageKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExhaustedKind {
    user_id: String,
    kind: UsageKind,
    day: NaiveDate,
}

/// Per-user, per-kind "denied today" flags kept on the client.
///
/// Advisory only: the server decides every action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaHints {
    #[serde(default)]
    exhausted: Vec<ExhaustedKind>,
}

impl QuotaHints {
    pub fn mark(&mut self, user_id: &str, kind: UsageKind, day: NaiveDate) {
        self.clear(user_id, kind);
        self.exhausted.push(ExhaustedKind {
            user_id: user_id.to_string(),
            kind,
            day,
        });
    }

    pub fn clear(&mut self, user_id: &str, kind: UsageKind) {
        self.exhausted
            .retain(|e| !(e.user_id == user_id && e.kind == kind));
    }

    pub fn clear_all(&mut self) {
        self.exhausted.clear();
    }

    /// A flag from an earlier day has already expired.
    pub fn is_marked(&self, user_id: &str, kind: UsageKind, today: NaiveDate) -> bool {
        self.exhausted
            .iter()
            .any(|e| e.user_id == user_id && e.kind == kind && e.day == today)
    }

    /// Drop flags from before `today`.
    pub fn prune(&mut self, today: NaiveDate) {
        self.exhausted.retain(|e| e.day == today);
    }

    pub fn is_empty(&self) -> bool {
        self.exhausted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn stale_hint_expires_with_the_day() {
        let mut hints = QuotaHints::default();
        hints.mark("u", UsageKind::Transcription, day(2));

        assert!(hints.is_marked("u", UsageKind::Transcription, day(2)));
        assert!(!hints.is_marked("u", UsageKind::Transcription, day(3)));
        assert!(!hints.is_marked("other", UsageKind::Transcription, day(2)));
        assert!(!hints.is_marked("u", UsageKind::NaturalInput, day(2)));

        hints.prune(day(3));
        assert!(hints.is_empty());
    }

    #[test]
    fn marking_again_keeps_one_entry() {
        let mut hints = QuotaHints::default();
        hints.mark("u", UsageKind::NaturalInput, day(2));
        hints.mark("u", UsageKind::NaturalInput, day(3));

        assert!(hints.is_marked("u", UsageKind::NaturalInput, day(3)));
        hints.clear("u", UsageKind::NaturalInput);
        assert!(hints.is_empty());
    }

    #[test]
    fn missing_field_reads_as_empty() {
        let hints: QuotaHints = serde_json::from_str("{}").unwrap();
        assert!(hints.is_empty());
    }
}
