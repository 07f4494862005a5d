use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::{ScorerEngine, ScoringConfig};
use crate::error::ScoreError;
use crate::retry::Outcome;

mod huggingface;
mod openai;

pub use huggingface::HuggingFaceScorer;
pub use openai::OpenAiScorer;

/// A relevance provider. Implementations return scores keyed by the phrases
/// they were given; phrases missing from the map count as unscored.
#[async_trait::async_trait]
pub trait RelevanceScorer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn score_phrases(
        &self,
        content: &str,
        phrases: &[String],
    ) -> Result<HashMap<String, f64>, ScoreError>;

    /// How well `content` fits each theme label, keyed by label.
    async fn classify_themes(
        &self,
        content: &str,
        labels: &[String],
    ) -> Result<HashMap<String, f64>, ScoreError> {
        self.score_phrases(content, labels).await
    }
}

/// Scores every phrase with the same value; ranking then follows density.
#[derive(Debug, Clone, Copy)]
pub struct UniformScorer {
    score: f64,
}

impl UniformScorer {
    pub fn new(score: f64) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
        }
    }
}

impl Default for UniformScorer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait::async_trait]
impl RelevanceScorer for UniformScorer {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn score_phrases(
        &self,
        _content: &str,
        phrases: &[String],
    ) -> Result<HashMap<String, f64>, ScoreError> {
        Ok(phrases
            .iter()
            .map(|phrase| (phrase.clone(), self.score))
            .collect())
    }
}

pub fn scorer_for(config: &ScoringConfig) -> anyhow::Result<Arc<dyn RelevanceScorer>> {
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    Ok(match config.engine {
        ScorerEngine::Noop => Arc::new(UniformScorer::default()),
        ScorerEngine::Openai => Arc::new(OpenAiScorer::from_env(&config.openai, timeout)?),
        ScorerEngine::Huggingface => {
            Arc::new(HuggingFaceScorer::from_env(&config.huggingface, timeout)?)
        }
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringOutcome {
    /// One entry per input phrase, in `[0, 1]`.
    pub scores: HashMap<String, f64>,
    pub batches: usize,
    pub degraded_batches: usize,
}

/// The first `sentences` sentences of `content`, capped at `max_chars`.
pub fn content_summary(content: &str, sentences: usize, max_chars: usize) -> String {
    let summary = crate::phrases::sentences(content)
        .into_iter()
        .take(sentences.max(1))
        .collect::<Vec<_>>()
        .join(" ");
    crate::text::head_chars(&summary, max_chars.max(1)).to_owned()
}

/// Line-aligned chunks of at most `max_chars`, at most `max_chunks` of them.
pub fn content_chunks(content: &str, max_chars: usize, max_chunks: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    let pieces = content.lines().flat_map(|line| {
        let mut rest = line.trim();
        let mut parts = Vec::new();
        while !rest.is_empty() {
            let part = crate::text::head_chars(rest, max_chars);
            parts.push(part);
            rest = rest[part.len()..].trim_start();
        }
        parts
    });

    for piece in pieces {
        let needed = piece.chars().count() + usize::from(!current.is_empty());
        if !current.is_empty() && current.chars().count() + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(piece);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks.truncate(max_chunks.max(1));
    chunks
}

fn normalize_key(raw: &str) -> String {
    crate::text::collapse_whitespace(raw).to_lowercase()
}

/// Scores all phrases in batches with bounded parallelism. Each batch is
/// retried per the policy; a batch that still fails, or that outlives the
/// deadline, contributes no scores.
pub async fn score_all(
    scorer: Arc<dyn RelevanceScorer>,
    content: &str,
    phrases: &[String],
    config: &ScoringConfig,
    deadline: Instant,
) -> ScoringOutcome {
    let mut outcome = ScoringOutcome::default();
    if phrases.is_empty() {
        return outcome;
    }

    let contexts: Vec<Arc<str>> =
        if config.chunk_content && content.chars().count() > config.max_content_chars {
            content_chunks(content, config.max_content_chars, config.max_chunks)
                .into_iter()
                .map(Arc::from)
                .collect()
        } else {
            vec![Arc::from(content_summary(
                content,
                config.summary_sentences,
                config.max_content_chars,
            ))]
        };

    let mut units = Vec::new();
    for batch in phrases.chunks(config.batch_size.max(1)) {
        for context in &contexts {
            units.push((Arc::clone(context), batch.to_vec()));
        }
    }
    let total_units = units.len();
    let mut units = units.into_iter().enumerate();

    let concurrency = config.concurrency.max(1);
    let retry = config.retry;
    let provider = scorer.name();
    let mut tasks: JoinSet<(Vec<String>, Outcome<HashMap<String, f64>>)> = JoinSet::new();

    loop {
        while tasks.len() < concurrency {
            let Some((index, (context, batch))) = units.next() else {
                break;
            };
            let scorer = Arc::clone(&scorer);
            tasks.spawn(async move {
                let label = format!("{provider} batch {}/{total_units}", index + 1);
                let attempt = retry.run_or_degrade(&label, HashMap::new(), |_| {
                    scorer.score_phrases(&context, &batch)
                });
                let result = match tokio::time::timeout_at(deadline, attempt).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(batch = %label, "scoring deadline reached; batch abandoned");
                        Outcome::Degraded {
                            value: HashMap::new(),
                            error: "deadline exceeded".to_owned(),
                        }
                    }
                };
                (batch, result)
            });
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        outcome.batches += 1;
        let (batch, result) = match joined {
            Ok(done) => done,
            Err(err) => {
                tracing::warn!(?err, "scoring task failed");
                outcome.degraded_batches += 1;
                continue;
            }
        };
        if result.is_degraded() {
            outcome.degraded_batches += 1;
        }

        let by_key = batch
            .iter()
            .map(|phrase| (normalize_key(phrase), phrase))
            .collect::<HashMap<_, _>>();
        for (key, score) in result.into_value() {
            let Some(phrase) = by_key.get(&normalize_key(&key)) else {
                tracing::debug!(provider, key = %key, "score for unknown phrase ignored");
                continue;
            };
            if !score.is_finite() {
                continue;
            }
            let score = score.clamp(0.0, 1.0);
            let entry = outcome.scores.entry((*phrase).clone()).or_insert(score);
            *entry = entry.max(score);
        }
    }

    for phrase in phrases {
        outcome.scores.entry(phrase.clone()).or_insert(0.0);
    }

    tracing::info!(
        provider,
        phrases = phrases.len(),
        batches = outcome.batches,
        degraded = outcome.degraded_batches,
        "relevance scoring finished"
    );
    outcome
}

pub(crate) fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Maps a non-success response to the matching error.
pub(crate) fn status_error(
    provider: &'static str,
    status: reqwest::StatusCode,
    headers: &HeaderMap,
    raw: &str,
) -> ScoreError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return ScoreError::RateLimited {
            provider,
            retry_after: retry_after_header(headers),
        };
    }
    let message = parse_error_message(raw).unwrap_or_else(|| raw.trim().to_owned());
    ScoreError::Status {
        provider,
        status: status.as_u16(),
        message,
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|v| v.as_str())
        .or_else(|| error.as_str())
        .map(str::to_owned)
}

pub(crate) fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|key| key.trim().to_owned())
        .filter(|key| !key.is_empty())
}
