//! C4 — LLM Client: prompt assembly, JSON-format response enforcement, and
//! retry/backoff around a flaky upstream chat-completions endpoint.
//! See SPEC_FULL.md §4.4.

use crate::config::AppConfig;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_SECS: f64 = 2.0;
const BACKOFF_CAP_SECS: f64 = 5.0;
const MIN_USERS_FOR_PEOPLE_BLOCK: usize = 1;
const MAX_USERS_FOR_PEOPLE_BLOCK: usize = 15;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Round-robin cursor over the primary API keys, guarded by a mutex. A
/// process-wide singleton lives on [`crate::pool::AiWorkerPool`]; rotation is
/// observable only for diagnostics, never for correctness.
pub struct KeyRotation {
    keys: Vec<String>,
    fallback: Option<String>,
    cursor: Mutex<usize>,
}

impl KeyRotation {
    pub fn new(keys: Vec<String>, fallback: Option<String>) -> Self {
        Self { keys, fallback, cursor: Mutex::new(0) }
    }

    /// Ordered candidates to try this request: primaries starting from the
    /// rotated cursor, then the fallback. Empty when no credentials are set.
    fn candidates(&self) -> Vec<String> {
        if self.keys.is_empty() {
            return self.fallback.iter().cloned().collect();
        }
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let start = *cursor % self.keys.len();
        *cursor = (*cursor + 1) % self.keys.len();
        drop(cursor);

        let mut ordered: Vec<String> = self.keys[start..].to_vec();
        ordered.extend_from_slice(&self.keys[..start]);
        ordered.extend(self.fallback.clone());
        ordered
    }
}

pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    rotation: KeyRotation,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no LLM credentials configured")]
    NoCredentials,
    #[error("upstream returned non-JSON content")]
    InvalidJson,
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("upstream returned terminal status {0}")]
    TerminalStatus(u16),
    #[error("cancelled")]
    Cancelled,
}

impl LlmClient {
    pub fn new(config: &AppConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to build LLM HTTP client");

        Self {
            http,
            base_url: config.llm_base_url.clone(),
            model: config.llm_model.clone(),
            rotation: KeyRotation::new(config.llm_api_keys.clone(), config.llm_fallback_api_key.clone()),
        }
    }

    /// Dispatch the sampled conversation to the upstream model and return the
    /// first choice's content, already validated as a JSON object string.
    pub async fn analyze(
        &self,
        sample: &BTreeMap<String, Vec<String>>,
        sender_count: usize,
    ) -> Result<String, LlmError> {
        let candidates = self.rotation.candidates();
        if candidates.is_empty() {
            return Err(LlmError::NoCredentials);
        }

        let system_prompt = build_system_prompt(sender_count);
        let user_content = serde_json::to_string_pretty(sample).unwrap_or_default();

        let mut last_err = LlmError::NoCredentials;
        for key in &candidates {
            match self.try_with_retries(key, &system_prompt, &user_content).await {
                Ok(text) => return Ok(text),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    async fn try_with_retries(
        &self,
        api_key: &str,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.one_attempt(api_key, system_prompt, user_content).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt >= MAX_ATTEMPTS || !is_retryable(&e) => return Err(e),
                Err(_) => {
                    let backoff = (BACKOFF_BASE_SECS * 2f64.powi(attempt as i32 - 1)).min(BACKOFF_CAP_SECS);
                    let jitter = 1.0 + rand::thread_rng().gen_range(-0.2..=0.2);
                    tokio::time::sleep(Duration::from_secs_f64(backoff * jitter)).await;
                }
            }
        }
    }

    async fn one_attempt(
        &self,
        api_key: &str,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 1.3,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content },
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::TerminalStatus(status.as_u16()));
        }

        let parsed: serde_json::Value =
            response.json().await.map_err(|e| LlmError::Request(e.to_string()))?;

        let content = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LlmError::InvalidJson)?
            .trim()
            .to_string();

        if !is_json_object(&content) {
            return Err(LlmError::InvalidJson);
        }
        Ok(content)
    }
}

fn is_retryable(err: &LlmError) -> bool {
    match err {
        LlmError::TerminalStatus(code) => *code == 429 || (500..600).contains(code),
        LlmError::Request(_) => true,
        LlmError::InvalidJson | LlmError::NoCredentials | LlmError::Cancelled => false,
    }
}

fn is_json_object(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
}

fn build_system_prompt(sender_count: usize) -> String {
    let base = "You are analyzing a private chat transcript sample. Respond with a single JSON object only, no prose outside the JSON.";
    if sender_count > MIN_USERS_FOR_PEOPLE_BLOCK && sender_count <= MAX_USERS_FOR_PEOPLE_BLOCK {
        format!(
            "{base} Include a top-level \"summary\" string field and a \"people\" array, \
             one entry per participant, each with \"name\" and a short \"notes\" field."
        )
    } else {
        format!("{base} Include only a top-level \"summary\" string field.")
    }
}
