//! Chat-completions classifier.
//!
//! Asks an OpenAI-compatible model for strict JSON and nothing else. Decoding
//! is pinned to temperature 0 so repeated runs give the same answer as far
//! as the service allows. Anything that is not a JSON object of the expected
//! shape is a failure for the whole file or batch.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AdapterError, Classifier, RetryPolicy};
use crate::domain::{Category, Classification, Grouping, GroupingResponse};

/// Default API endpoint
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const CLASSIFY_MAX_TOKENS: u32 = 200;
const GROUPING_MAX_TOKENS: u32 = 16384;

/// LLM-backed classifier
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    /// Category labels offered to the model
    categories: Vec<String>,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    n: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiClassifier {
    /// Create a classifier against the default endpoint
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        categories: Vec<String>,
        request_timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE.to_string(),
            model: model.into(),
            categories,
            retry: RetryPolicy::default(),
        })
    }

    /// Point at a different OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send a single-message chat and return the reply text
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, AdapterError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            n: 1,
            temperature: 0.0,
        };
        let url = format!("{}/chat/completions", self.base_url);
        let (url, request) = (&url, &request);

        self.retry
            .run("chat_completion", move || async move {
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(&self.api_key)
                    .json(request)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AdapterError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }

                let chat: ChatResponse = response.json().await?;
                chat.choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| AdapterError::Malformed("No content in completion".to_string()))
            })
            .await
    }

    fn classify_prompt(&self, file_name: &str) -> String {
        format!(
            r#"Given the filename: "{file_name}", determine the appropriate category from the following list:
{categories:?}
Identify the TV show or movie this file represents; the name is usually in the filename. If you cannot confidently identify it, return empty data. Suggest subfolders only when they help organize a large library of movies and TV shows, and never repeat text already present in another field.

Respond in strict JSON only, with no explanation, comments or additional text. Use null for any unknown field.

{{
    "category": "category name",
    "subfolders": ["subfolder1", "subfolder2"],
    "title": "cleaned movie or episode title",
    "show_name": "name of tv show (if applicable)",
    "year": "year of release (if known)",
    "season": "season number (if applicable, at least 2 digits with leading zeros)",
    "episode": "episode number (if applicable, at least 2 digits with leading zeros)"
}}"#,
            categories = self.categories,
        )
    }

    fn grouping_prompt(category: &Category, titles: &[String]) -> String {
        format!(
            r#"Given the list of titles in the '{category}' category:
{titles:?}

Group these titles into sensible collections or subgroupings based on their similarities, such as 'Disney Movies', 'Pixar Movies', or 'Science Fiction TV Shows'. Copy every title exactly as it appears in the list.

Respond in strict JSON only, with no explanation, comments or additional text. Use null for any unknown field.

{{
    "groupings": [
        {{
            "group_name": "Group Name",
            "titles": ["Title1", "Title2"]
        }}
    ]
}}"#
        )
    }
}

/// Parse a per-file reply; it must be a single JSON object
pub fn parse_classification(content: &str) -> Result<Classification, AdapterError> {
    let value = parse_object(content)?;
    Ok(serde_json::from_value(value)?)
}

/// Parse a grouping reply; it must be a single JSON object
pub fn parse_groupings(content: &str) -> Result<Vec<Grouping>, AdapterError> {
    let value = parse_object(content)?;
    let response: GroupingResponse = serde_json::from_value(value)?;
    Ok(response.into_groupings())
}

fn parse_object(content: &str) -> Result<serde_json::Value, AdapterError> {
    let value: serde_json::Value = serde_json::from_str(content.trim())?;
    if !value.is_object() {
        return Err(AdapterError::Malformed(format!(
            "Expected a JSON object, got: {}",
            truncate(content, 80)
        )));
    }
    Ok(value)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(&self, file_name: &str) -> Result<Classification, AdapterError> {
        let prompt = self.classify_prompt(file_name);
        let content = self.complete(&prompt, CLASSIFY_MAX_TOKENS).await?;
        debug!(file = file_name, reply = %content, "Classification reply");
        parse_classification(&content)
    }

    async fn group(
        &self,
        category: &Category,
        titles: &[String],
    ) -> Result<Vec<Grouping>, AdapterError> {
        let prompt = Self::grouping_prompt(category, titles);
        let content = self.complete(&prompt, GROUPING_MAX_TOKENS).await?;
        debug!(category = %category, reply = %content, "Grouping reply");
        parse_groupings(&content)
    }
}
