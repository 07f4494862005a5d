use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use super::RelevanceScorer;
use crate::config::HuggingFaceConfig;
use crate::error::ScoreError;

const PROVIDER: &str = "huggingface";
const API_KEY_VAR: &str = "HUGGING_FACE_API_KEY";

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
    multi_label: bool,
}

#[derive(Debug, Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f64>,
}

/// Zero-shot classification over the phrases as candidate labels
/// (Hugging Face inference API, multi-label).
#[derive(Debug, Clone)]
pub struct HuggingFaceScorer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HuggingFaceScorer {
    pub fn new(
        config: &HuggingFaceConfig,
        timeout: Duration,
        api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build huggingface http client")?;
        let endpoint = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.model.trim_start_matches('/')
        );
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn from_env(config: &HuggingFaceConfig, timeout: Duration) -> anyhow::Result<Self> {
        let api_key = super::api_key_from_env(API_KEY_VAR);
        if api_key.is_none() {
            tracing::warn!(
                "{API_KEY_VAR} is not set; huggingface scoring will degrade to zero scores"
            );
        }
        Self::new(config, timeout, api_key)
    }
}

#[async_trait::async_trait]
impl RelevanceScorer for HuggingFaceScorer {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn score_phrases(
        &self,
        content: &str,
        phrases: &[String],
    ) -> Result<HashMap<String, f64>, ScoreError> {
        self.zero_shot(content, phrases, true).await
    }

    /// Single-label classification: the scores compete across labels.
    async fn classify_themes(
        &self,
        content: &str,
        labels: &[String],
    ) -> Result<HashMap<String, f64>, ScoreError> {
        self.zero_shot(content, labels, false).await
    }
}

impl HuggingFaceScorer {
    async fn zero_shot(
        &self,
        content: &str,
        labels: &[String],
        multi_label: bool,
    ) -> Result<HashMap<String, f64>, ScoreError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ScoreError::MissingCredentials {
                provider: PROVIDER,
                var: API_KEY_VAR,
            });
        };

        let request = ZeroShotRequest {
            inputs: content,
            parameters: ZeroShotParameters {
                candidate_labels: labels,
                multi_label,
            },
        };
        tracing::debug!(
            endpoint = %self.endpoint,
            labels = labels.len(),
            multi_label,
            "zero-shot request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
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
        parse_response(&raw)
    }
}

fn parse_response(raw: &str) -> Result<HashMap<String, f64>, ScoreError> {
    let response: ZeroShotResponse = serde_json::from_str(raw)
        .map_err(|err| ScoreError::malformed(PROVIDER, format!("parse response: {err}")))?;
    if response.labels.len() != response.scores.len() {
        return Err(ScoreError::malformed(
            PROVIDER,
            format!(
                "{} labels but {} scores",
                response.labels.len(),
                response.scores.len()
            ),
        ));
    }
    Ok(response.labels.into_iter().zip(response.scores).collect())
}
