pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::gemini::GeminiChatClient;
use self::openai::OpenAIChatClient;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

/// A single-shot text generation backend.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        system_instruction: Option<&str>
    ) -> Result<CompletionResponse, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI | LlmType::Ollama | LlmType::DeepSeek | LlmType::XAI | LlmType::Groq => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

pub(crate) fn build_http_client(config: &LlmConfig) -> Result<HttpClient, LlmError> {
    HttpClient::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| LlmError::NotConfigured(format!("Failed to build HTTP client: {}", e)))
}

/// Turns a non-success HTTP response into the matching [`LlmError`].
pub(crate) async fn error_for_response(resp: reqwest::Response) -> LlmError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    LlmError::from_status(status, &body)
}

/// Reads a success body; transport failures keep their retry class, only bad JSON is `InvalidResponse`.
pub(crate) async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, LlmError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::io::{ AsyncReadExt, AsyncWriteExt };
    use tokio::net::TcpListener;

    /// Serves one canned response head and body, then holds the socket open.
    async fn serve_once(head_and_body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(head_and_body.as_bytes()).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        format!("http://{}", addr)
    }

    fn client(timeout_ms: u64) -> HttpClient {
        HttpClient::builder().timeout(Duration::from_millis(timeout_ms)).build().unwrap()
    }

    #[tokio::test]
    async fn stalled_body_is_unavailable() {
        let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n{\"partial\"").await;
        let resp = client(300).get(&url).send().await.unwrap();

        let err = read_json::<Value>(resp).await.unwrap_err();

        assert!(matches!(err, LlmError::Unavailable(_)), "got {:?}", err);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 8\r\nConnection: close\r\n\r\nnot json"
        ).await;
        let resp = client(2000).get(&url).send().await.unwrap();

        let err = read_json::<Value>(resp).await.unwrap_err();

        assert!(matches!(err, LlmError::InvalidResponse(_)), "got {:?}", err);
        assert!(!err.is_transient());
    }
}
