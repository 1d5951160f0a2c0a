//! Transaction draft value objects

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidTransactionTypeError;

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl FromStr for TransactionType {
    type Err = InvalidTransactionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(InvalidTransactionTypeError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured result of analyzing a free-text transaction description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionAnalysis {
    pub amount: f64,
    pub description: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

impl TransactionAnalysis {
    /// Reject results the ledger cannot use
    pub fn is_usable(&self) -> bool {
        self.amount.is_finite() && !self.description.trim().is_empty()
    }

    /// Turn the analysis into a draft dated `date`
    pub fn into_draft(self, date: NaiveDate) -> TransactionDraft {
        TransactionDraft {
            description: self.description.trim().to_string(),
            amount: self.amount.abs(),
            category: self.category.trim().to_string(),
            kind: self.kind,
            date,
        }
    }
}

/// AI-produced transaction awaiting user confirmation.
/// `amount` is a magnitude; the sign comes from `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub description: String,
    pub amount: f64,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: NaiveDate,
}

impl TransactionDraft {
    /// Amount with expenses negative
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }
}
