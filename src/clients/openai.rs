use crate::contexts::{GenerationRequest, Generator, GeneratorError};
use crate::data::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Loads the secrets file and reads the API key from the environment.
///
/// An explicitly named secrets file must load; otherwise `.env` in the
/// working directory is used when present.
pub fn load_api_key(env_file: Option<&Path>) -> Result<String, ConfigError> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| ConfigError::SecretsFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    match std::env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigError::MissingCredential(API_KEY_VAR.to_string())),
    }
}

/// Chat-completions client for OpenAI-compatible services
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Creates the client from the secrets file and environment
    pub fn from_env(env_file: Option<&Path>, api_base: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(load_api_key(env_file)?, api_base))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<(u16, String), GeneratorError> {
        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| GeneratorError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GeneratorError::Request(e.to_string()))?;
        Ok((status, text))
    }
}

impl Generator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system_instruction,
                },
                Message {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            response_format: request.json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let mut retries = 0;
        loop {
            let (status, text) = self.send_once(&body).await?;

            if (200..300).contains(&status) {
                return parse_completion(&text);
            }

            if status == 429 {
                if retries >= MAX_RETRIES {
                    return Err(GeneratorError::RateLimited { retries });
                }
                retries += 1;
                let backoff = backoff_for(retries);
                eprintln!(
                    "  Rate limited. Retrying in {}s (attempt {}/{})",
                    backoff.as_secs(),
                    retries,
                    MAX_RETRIES
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            let message = match status {
                401 => format!("Invalid API key. Check {}.", API_KEY_VAR),
                _ => text,
            };
            return Err(GeneratorError::Status {
                code: status,
                message,
            });
        }
    }
}

fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * BACKOFF_MULTIPLIER.pow(attempt.saturating_sub(1)))
}

/// Returns the text of the first choice
fn parse_completion(body: &str) -> Result<String, GeneratorError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GeneratorError::InvalidResponse(format!("{}: {}", e, body)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GeneratorError::InvalidResponse("response has no choices".to_string()))
}
