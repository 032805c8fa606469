use std::time::Duration;

use jobhunt_core::error::AppError;
use jobhunt_core::traits::QuestionAnswerer;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_TOKENS: u32 = 300;
const DEFAULT_SYSTEM_PROMPT: &str = "You are filling in a job application on behalf of a candidate. Answer the question in the first person, truthfully and concisely, in at most three sentences, using only the candidate background provided. If the background does not cover the question, give a brief, honest, positive answer.";

/// OpenAI-compatible chat client answering application questions.
///
/// Works with any OpenAI-compatible API, including:
/// - OpenAI directly (`https://api.openai.com/v1`)
/// - Gemini via compatibility layer (`https://generativelanguage.googleapis.com/v1beta/openai`)
#[derive(Clone)]
pub struct OpenAiAnswerer {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    max_tokens: u32,
    system_prompt: String,
}

impl OpenAiAnswerer {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, model, base_url, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        let rebuilt = Self::build(&self.api_key, &self.model, &self.base_url, timeout)?;
        Ok(Self {
            max_tokens: self.max_tokens,
            system_prompt: self.system_prompt,
            ..rebuilt
        })
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("LLM API key is empty".into()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }

    fn request(&self, question: &str, profile_summary: &str) -> ChatRequest {
        let background = if profile_summary.trim().is_empty() {
            "(no background provided)"
        } else {
            profile_summary
        };
        ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: self.system_prompt.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: format!(
                        "Candidate background:\n{background}\n\nApplication question:\n{}",
                        question.trim()
                    ),
                },
            ],
        }
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl QuestionAnswerer for OpenAiAnswerer {
    async fn answer(&self, question: &str, profile_summary: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.request(question, profile_summary);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            if status_code == 429 {
                return Err(AppError::RateLimitExceeded);
            }
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"));

            return Err(AppError::LlmError {
                message,
                status_code,
                retryable: status_code >= 500,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse LLM response: {e}")))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|answer| answer.trim().to_string())
            .filter(|answer| !answer.is_empty())
            .ok_or_else(|| AppError::LlmError {
                message: "Empty response from LLM".into(),
                status_code: 200,
                retryable: false,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(matches!(
            OpenAiAnswerer::new(" ", "gpt-4o-mini"),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn request_carries_background_and_question() {
        let answerer = OpenAiAnswerer::with_base_url("sk-test", "gpt-4o-mini", "http://localhost:1/v1/")
            .unwrap()
            .with_max_tokens(120);
        assert_eq!(answerer.base_url, "http://localhost:1/v1");

        let json = serde_json::to_value(answerer.request(" Why Stripe? ", "PM, 8 years in payments")).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 120);
        assert_eq!(json["messages"][0]["role"], "system");
        let user = json["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("PM, 8 years in payments"));
        assert!(user.ends_with("Why Stripe?"));
    }

    #[test]
    fn missing_background_is_marked() {
        let answerer = OpenAiAnswerer::new("sk-test", "gpt-4o-mini").unwrap();
        let json = serde_json::to_value(answerer.request("Why us?", "")).unwrap();
        assert!(
            json["messages"][1]["content"]
                .as_str()
                .unwrap()
                .contains("(no background provided)")
        );
    }

    #[test]
    fn with_timeout_keeps_settings() {
        let answerer = OpenAiAnswerer::new("sk-test", "gpt-4o-mini")
            .unwrap()
            .with_max_tokens(50)
            .with_system_prompt("Be brief.")
            .with_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(answerer.max_tokens, 50);
        assert_eq!(answerer.system_prompt, "Be brief.");
        assert_eq!(answerer.timeout_secs, 5);
    }
}
