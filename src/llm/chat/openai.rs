use async_trait::async_trait;
use log::{ debug, warn };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ build_http_client, error_for_response, read_json, ChatClient, CompletionResponse };
use crate::llm::{ LlmConfig, LlmError, LlmType };

/// Chat-completions client for OpenAI and the providers that speak its wire format
/// (Groq, DeepSeek, xAI, Ollama).
pub struct OpenAIChatClient {
    http: HttpClient,
    headers: HeaderMap,
    model: String,
    base_url: String,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

fn provider_defaults(llm_type: &LlmType) -> (&'static str, &'static str) {
    match llm_type {
        LlmType::Groq => ("https://api.groq.com/openai/v1", "llama-3.1-8b-instant"),
        LlmType::DeepSeek => ("https://api.deepseek.com/v1", "deepseek-chat"),
        LlmType::XAI => ("https://api.x.ai/v1", "grok-2-latest"),
        LlmType::Ollama => ("http://localhost:11434/v1", "llama3"),
        LlmType::OpenAI | LlmType::Gemini => ("https://api.openai.com/v1", "gpt-4o-mini"),
    }
}

impl OpenAIChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let (default_url, default_model) = provider_defaults(&config.llm_type);
        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());

        if api_key.is_none() && config.llm_type != LlmType::Ollama {
            return Err(
                LlmError::NotConfigured(format!("API key is required for {:?}", config.llm_type))
            );
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e|
                    LlmError::NotConfigured(format!("Invalid API key format: {}", e))
                )?
            );
        }

        Ok(Self {
            http: build_http_client(config)?,
            headers,
            model: config.completion_model.clone().unwrap_or_else(|| default_model.to_string()),
            base_url: config.base_url.clone().unwrap_or_else(|| default_url.to_string()),
        })
    }
}

fn build_messages(prompt: &str, system_instruction: Option<&str>) -> Vec<OpenAIMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_instruction.filter(|s| !s.trim().is_empty()) {
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: Some(system.to_string()),
        });
    }
    messages.push(OpenAIMessage {
        role: "user".to_string(),
        content: Some(prompt.to_string()),
    });
    messages
}

fn extract_text(resp: OpenAIResponse) -> Result<String, LlmError> {
    let choice = resp.choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("No choices in completion response".into()))?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(LlmError::ContentBlocked("content_filter".into()));
    }

    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        prompt: &str,
        system_instruction: Option<&str>
    ) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let req = OpenAIChatRequest {
            model: self.model.clone(),
            messages: build_messages(prompt, system_instruction),
            temperature: 0.7,
        };
        debug!("OpenAIChatClient::complete() → model={} url={}", self.model, url);

        let resp = self.http
            .post(&url)
            .headers(self.headers.clone())
            .json(&req)
            .send().await?;

        if !resp.status().is_success() {
            let err = error_for_response(resp).await;
            warn!("Chat completion request failed: {}", err);
            return Err(err);
        }

        let body: OpenAIResponse = read_json(resp).await?;
        Ok(CompletionResponse { response: extract_text(body)? })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
