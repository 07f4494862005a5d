use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Context as _;
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct OpenAiStubConfig {
    /// Answer this many requests with `429 Retry-After: 0` before scoring.
    pub rate_limit_first: usize,
    /// Reply with prose instead of JSON.
    pub garbled: bool,
}

pub struct OpenAiStub {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl OpenAiStub {
    pub fn spawn(config: OpenAiStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start openai stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let requests = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                if request.method() != &tiny_http::Method::Post || path != "/v1/responses" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let index = seen.fetch_add(1, Ordering::SeqCst);
                if index < config.rate_limit_first {
                    let header = tiny_http::Header::from_bytes(&b"Retry-After"[..], &b"0"[..])
                        .expect("build header");
                    let _ = request.respond(
                        tiny_http::Response::from_string(
                            r#"{"error":{"message":"rate limited"}}"#,
                        )
                        .with_status_code(429)
                        .with_header(header),
                    );
                    continue;
                }

                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };

                let Some(prompt) = parsed.get("input").and_then(|v| v.as_str()) else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing input").with_status_code(400),
                    );
                    continue;
                };

                let output_text = if config.garbled {
                    "I think these phrases are all fine.".to_owned()
                } else {
                    match score_response(prompt) {
                        Ok(text) => text,
                        Err(err) => {
                            let _ = request.respond(
                                tiny_http::Response::from_string(format!(
                                    "failed to build score response: {err}"
                                ))
                                .with_status_code(400),
                            );
                            continue;
                        }
                    }
                };

                let response_body = serde_json::json!({
                    "id": "resp_stub",
                    "object": "response",
                    "model": parsed.get("model").cloned().unwrap_or(Value::String("stub-model".to_owned())),
                    "output": [
                        {
                            "type": "message",
                            "role": "assistant",
                            "content": [
                                { "type": "output_text", "text": output_text }
                            ]
                        }
                    ],
                    "output_text": output_text
                });

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(200)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    #[allow(dead_code)]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for OpenAiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn extract_between<'a>(text: &'a str, begin: &str, end: &str) -> Option<&'a str> {
    let start = text.find(begin)? + begin.len();
    let rest = &text[start..];
    let end_rel = rest.find(end)?;
    Some(&rest[..end_rel])
}

/// Phrases mentioning "camera" are on topic; everything else is secondary.
fn score_response(prompt: &str) -> anyhow::Result<String> {
    let begin = "BEGIN_PHRASES_JSON\n";
    let end = "\nEND_PHRASES_JSON";
    let raw = extract_between(prompt, begin, end)
        .ok_or_else(|| anyhow::anyhow!("missing phrase markers: {begin:?} .. {end:?}"))?;
    if extract_between(prompt, "BEGIN_CONTENT\n", "\nEND_CONTENT").is_none() {
        anyhow::bail!("missing content markers");
    }

    let phrases: Vec<String> = serde_json::from_str(raw).context("parse phrases json")?;
    let scores = phrases
        .iter()
        .map(|phrase| {
            let score = if phrase.contains("camera") { 0.9 } else { 0.3 };
            (phrase.clone(), serde_json::json!(score))
        })
        .collect::<serde_json::Map<_, _>>();

    Ok(serde_json::json!({ "scores": scores }).to_string())
}
