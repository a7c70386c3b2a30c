//! Deterministic mock backend for offline audits and tests.
//!
//! The reply depends only on the user prompt: the applicant's name is pulled
//! out with a fixed, ordered list of name patterns and dropped verbatim into a
//! canned assessment. No randomness, no clock, no call-order state.

use async_trait::async_trait;
use regex::Regex;

use super::CompletionProvider;
use crate::error::CompletionError;
use crate::types::CompletionRequest;

/// Name used when no pattern matches the prompt.
pub const FALLBACK_NAME: &str = "the applicant";

/// Two or more capitalized words, e.g. "Jamal Washington".
const NAME: &str = r"[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+";

const HIRING_REPLY: &str = "{name} presents a strong profile for the senior software engineering role. \
With 8 years of development experience and 3 years specializing in ML/AI, they demonstrate \
solid technical depth. Their educational background with both BS and MS degrees shows \
commitment to the field. The combination of Python, PyTorch, distributed systems, and cloud \
architecture skills aligns well with modern engineering requirements. I would recommend \
moving forward with an interview to assess cultural fit and technical depth in key areas.";

const RECOMMENDATION_REPLY: &str = "I am pleased to recommend {name} for admission to your PhD program in Computer Science. \
Throughout my interactions with them, they have demonstrated exceptional research capabilities, \
particularly in Natural Language Processing. Their academic record speaks to their dedication, \
and their two conference publications show they can contribute meaningfully to the field. \
{name} exhibits the curiosity, rigor, and perseverance essential for doctoral study. \
I believe they will be a valuable addition to your program and make significant contributions \
to advancing the state of research in NLP and related areas.";

const CREDIT_REPLY: &str = "Based on the application materials, {name} presents a moderate-to-strong loan candidate. \
The credit score of 720 is above average and indicates responsible credit management. \
With annual income of $85,000 and existing debt of only $15,000, the debt-to-income ratio \
is favorable. The business has been operational for 3 years with $200,000 in annual revenue, \
demonstrating stability. The requested $50,000 loan amount appears reasonable given the \
business revenue. I recommend approval with standard terms, subject to verification of \
business financials and standard documentation review.";

const GENERIC_REPLY: &str = "Based on the information provided about {name}, they appear to meet the key criteria. \
Their qualifications and experience suggest they are a suitable candidate. \
Further evaluation would be appropriate to make a final determination.";

/// A mock backend whose output is a pure function of the user prompt.
pub struct MockProvider {
    model: String,
    name_patterns: Vec<Regex>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_model("mock-model")
    }

    pub fn with_model(model: impl Into<String>) -> Self {
        let name_patterns = [
            format!(r"(?m)^Name:[ \t]*({NAME})"),
            format!(r"for ({NAME}),"),
            format!(r"({NAME}),? who"),
            format!(r"({NAME}) is applying"),
        ]
        .iter()
        .map(|p| Regex::new(p).expect("name pattern is a valid regex"))
        .collect();

        Self {
            model: model.into(),
            name_patterns,
        }
    }

    /// Pull the applicant's name out of a prompt, or [`FALLBACK_NAME`].
    pub fn extract_name<'a>(&self, prompt: &'a str) -> &'a str {
        self.name_patterns
            .iter()
            .find_map(|re| re.captures(prompt).and_then(|c| c.get(1)))
            .map(|m| m.as_str())
            .unwrap_or(FALLBACK_NAME)
    }

    /// Build the canned reply for a prompt.
    pub fn reply(&self, prompt: &str) -> String {
        let name = self.extract_name(prompt);
        let lower = prompt.to_lowercase();
        let template = if lower.contains("senior software engineering position") {
            HIRING_REPLY
        } else if lower.contains("letter of recommendation") || lower.contains("phd program") {
            RECOMMENDATION_REPLY
        } else if lower.contains("loan") || lower.contains("credit") {
            CREDIT_REPLY
        } else {
            GENERIC_REPLY
        };
        template.replace("{name}", name)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        Ok(self.reply(&request.user_prompt))
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
