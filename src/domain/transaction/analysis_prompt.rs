//! Analysis prompt value object

/// Instruction sent ahead of the user's text
const BASE_INSTRUCTION: &str = r#"Analyze this transaction and return a JSON with the fields: amount (number), description (string), category (string), type ("income" or "expense").

IMPORTANT: Detect the language of the input text and respond with categories in the SAME language as the input.

If the input is in Italian, use Italian categories like: "Cibo", "Trasporti", "Shopping", "Stipendio", "Casa", "Salute", "Intrattenimento", "Altro".
If the input is in English, use English categories like: "Food", "Transportation", "Shopping", "Salary", "Home", "Health", "Entertainment", "Other"."#;

/// User-role message asking the text service to structure a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    content: String,
}

impl AnalysisPrompt {
    pub fn build(text: &str) -> Self {
        let content = format!(
            "{}\n\nText to analyze: \"{}\"",
            BASE_INSTRUCTION,
            text.trim().replace('"', "'")
        );
        Self { content }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }
}
