//! Core value types that flow through an audit run.

use serde::{Deserialize, Serialize};

/// Prefix marking a response whose backend call failed.
pub const ERROR_TAG_PREFIX: &str = "[ERROR: ";

/// One cell of the prompt matrix: a scenario rendered for one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptInstance {
    pub group: String,
    pub name: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// A model response attributed to the group and name that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub group: String,
    pub name: String,
    pub text: String,
}

impl ResponseRecord {
    pub fn new(group: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            text: text.into(),
        }
    }

    /// Build the error-tagged record for a failed completion.
    pub fn failed(prompt: &PromptInstance, message: impl std::fmt::Display) -> Self {
        Self {
            group: prompt.group.clone(),
            name: prompt.name.clone(),
            text: format!("{ERROR_TAG_PREFIX}{message}]"),
        }
    }

    /// Whether this record carries an error payload instead of model output.
    pub fn is_error(&self) -> bool {
        self.text.starts_with(ERROR_TAG_PREFIX)
    }
}

/// A single chat completion request sent to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn for_prompt(prompt: &PromptInstance, model: &str, temperature: f32, max_tokens: u32) -> Self {
        Self {
            system_prompt: prompt.system_prompt.clone(),
            user_prompt: prompt.user_prompt.clone(),
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }
}
