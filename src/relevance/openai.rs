use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;

use super::RelevanceScorer;
use crate::config::OpenAiConfig;
use crate::error::ScoreError;

const PROVIDER: &str = "openai";
const API_KEY_VAR: &str = "OPENAI_API_KEY";

const INSTRUCTIONS: &str = "You are an SEO editor rating candidate anchor-text phrases for internal links.\n\
\n\
Rate how well each phrase represents a key topic, concept, product or industry term of the content.\n\
Scale:\n\
- 1.0 = essential theme or topic\n\
- 0.8 = important supporting concept\n\
- 0.6 = relevant but secondary\n\
- 0.4 or below = not very relevant\n\
\n\
Hard rules:\n\
- Score ONLY the phrases provided, spelled exactly as provided.\n\
- Every score MUST be a number between 0 and 1.\n\
\n\
Output:\n\
- Output ONLY a single JSON object (no markdown fences, no commentary).\n\
- Schema: {\"scores\":{\"<phrase>\":0.0}}\n";

/// Scores phrases through the OpenAI Responses API.
#[derive(Debug, Clone)]
pub struct OpenAiScorer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiScorer {
    /// A missing key is reported per call, so scoring degrades instead of failing.
    pub fn new(
        config: &OpenAiConfig,
        timeout: Duration,
        api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build openai http client")?;
        Ok(Self {
            client,
            endpoint: responses_endpoint(&config.base_url),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn from_env(config: &OpenAiConfig, timeout: Duration) -> anyhow::Result<Self> {
        let api_key = super::api_key_from_env(API_KEY_VAR);
        if api_key.is_none() {
            tracing::warn!("{API_KEY_VAR} is not set; openai scoring will degrade to zero scores");
        }
        Self::new(config, timeout, api_key)
    }
}

#[async_trait::async_trait]
impl RelevanceScorer for OpenAiScorer {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn score_phrases(
        &self,
        content: &str,
        phrases: &[String],
    ) -> Result<HashMap<String, f64>, ScoreError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ScoreError::MissingCredentials {
                provider: PROVIDER,
                var: API_KEY_VAR,
            });
        };

        let input = build_input(content, phrases)?;
        tracing::debug!(
            model = %self.model,
            phrases = phrases.len(),
            content_chars = content.chars().count(),
            "openai score request"
        );
        let text = responses_text(
            &self.client,
            &self.endpoint,
            api_key,
            &self.model,
            INSTRUCTIONS,
            &input,
            self.temperature,
        )
        .await?;
        parse_scores(&text)
    }
}

fn build_input(content: &str, phrases: &[String]) -> Result<String, ScoreError> {
    let phrases_json = serde_json::to_string_pretty(phrases)
        .map_err(|err| ScoreError::malformed(PROVIDER, format!("serialize phrases: {err}")))?;
    Ok(format!(
        "BEGIN_CONTENT\n{content}\nEND_CONTENT\n\nBEGIN_PHRASES_JSON\n{phrases_json}\nEND_PHRASES_JSON\n",
        content = content.trim(),
    ))
}

pub fn responses_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/responses")
}

pub async fn responses_text(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    model: &str,
    instructions: &str,
    input: &str,
    temperature: f32,
) -> Result<String, ScoreError> {
    let mut body = serde_json::json!({
        "model": model,
        "instructions": instructions,
        "input": input,
        "text": { "format": { "type": "text" } },
        "store": false,
    });

    // GPT-5 models reject sampling params like `temperature`.
    if !model.starts_with("gpt-5")
        && let Some(obj) = body.as_object_mut()
    {
        obj.insert("temperature".to_owned(), serde_json::json!(temperature));
    }

    let response = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|err| ScoreError::from_reqwest(PROVIDER, err))?;

    let status = response.status();
    let headers = response.headers().clone();
    let raw = response
        .text()
        .await
        .map_err(|err| ScoreError::from_reqwest(PROVIDER, err))?;
    if !status.is_success() {
        return Err(super::status_error(PROVIDER, status, &headers, &raw));
    }

    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| ScoreError::malformed(PROVIDER, format!("parse response: {err}")))?;
    extract_output_text(&value)
}

fn extract_output_text(value: &serde_json::Value) -> Result<String, ScoreError> {
    let output = value
        .get("output")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ScoreError::malformed(PROVIDER, "missing `output` array in response"))?;

    let mut text = String::new();
    for item in output {
        if item.get("type").and_then(|v| v.as_str()) != Some("message") {
            continue;
        }
        let Some(content) = item.get("content").and_then(|v| v.as_array()) else {
            continue;
        };
        for part in content {
            if part.get("type").and_then(|v| v.as_str()) != Some("output_text") {
                continue;
            }
            if let Some(part_text) = part.get("text").and_then(|v| v.as_str()) {
                text.push_str(part_text);
            }
        }
    }

    if text.trim().is_empty() {
        return Err(ScoreError::malformed(PROVIDER, "output text is empty"));
    }
    Ok(text)
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Accepts `{"scores":{..}}` or a flat `{"phrase": score}` object.
fn parse_scores(text: &str) -> Result<HashMap<String, f64>, ScoreError> {
    let json = extract_json_object(text)
        .ok_or_else(|| ScoreError::malformed(PROVIDER, "no json object in output"))?;
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|err| ScoreError::malformed(PROVIDER, format!("parse scores json: {err}")))?;
    let object = value
        .get("scores")
        .unwrap_or(&value)
        .as_object()
        .ok_or_else(|| ScoreError::malformed(PROVIDER, "scores is not an object"))?;

    Ok(object
        .iter()
        .filter_map(|(phrase, score)| {
            let score = score
                .as_f64()
                .or_else(|| score.as_str().and_then(|s| s.trim().parse().ok()))?;
            Some((phrase.clone(), score))
        })
        .collect())
}
