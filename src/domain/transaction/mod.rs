//! Transaction draft domain module

mod analysis_prompt;
mod draft;

pub use analysis_prompt::AnalysisPrompt;
pub use draft::{TransactionAnalysis, TransactionDraft, TransactionType};
