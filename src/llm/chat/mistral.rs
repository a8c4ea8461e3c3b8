use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, error, info, warn };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ create_streaming_response, ChatClient, CompletionResponse, DeltaStream };
use crate::llm::sse::{ parse_line, SseEvent, SseLineBuffer };
use crate::llm::{ ApiMessage, LlmConfig, LlmError, DEFAULT_BASE_URL, DEFAULT_MODEL };

/// Client for the Mistral chat-completions endpoint. Any OpenAI-compatible
/// `/chat/completions` URL works as `base_url`.
pub struct MistralChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ApiMessage,
}

impl MistralChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        temperature: f32,
        max_tokens: u32
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("an API key is required (set CHAT_API_KEY)".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
            LlmError::Config(format!("Invalid API key format: {}", e))
        )?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            http,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            temperature,
            max_tokens,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| LlmError::Config("an API key is required (set CHAT_API_KEY)".to_string()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.temperature,
            config.max_tokens
        )
    }

    fn request<'a>(&'a self, messages: &'a [ApiMessage], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        }
    }

    async fn post(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let resp = self.http.post(&self.base_url).json(body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            error!("Chat API error: {} {}", status, detail);
            return Err(LlmError::Connection(format!("HTTP {}", status)));
        }
        Ok(resp)
    }
}

/// Feeds decoded lines into `tx`. Returns `false` once the stream should stop.
async fn forward_line(
    line: &str,
    tx: &tokio::sync::mpsc::Sender<Result<String, LlmError>>
) -> bool {
    match parse_line(line) {
        Ok(Some(SseEvent::Delta(text))) => tx.send(Ok(text)).await.is_ok(),
        Ok(Some(SseEvent::Done)) => false,
        Ok(Some(SseEvent::Empty)) | Ok(None) => true,
        Err(e) => {
            warn!("Dropping stream after undecodable frame: {}", e);
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

#[async_trait]
impl ChatClient for MistralChatClient {
    async fn complete(&self, messages: &[ApiMessage]) -> Result<CompletionResponse, LlmError> {
        let resp = self.post(&self.request(messages, false)).await?;
        let body = resp.text().await?;

        let parsed: ChatResponse = serde_json
            ::from_str(&body)
            .map_err(|e| LlmError::MalformedPayload(e.to_string()))?;

        let content = parsed.choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedPayload("response has no choices".to_string()))?
            .message.content;

        Ok(CompletionResponse { response: content })
    }

    async fn stream_deltas(&self, messages: &[ApiMessage]) -> Result<DeltaStream, LlmError> {
        info!("Streaming {} messages to {} ({})", messages.len(), self.base_url, self.model);
        let resp = self.post(&self.request(messages, true)).await?;

        Ok(
            create_streaming_response(move |tx| async move {
                let mut body = resp.bytes_stream();
                let mut buffer = SseLineBuffer::new();

                while let Some(chunk) = body.next().await {
                    match chunk {
                        Ok(bytes) => {
                            debug!("Chat API raw chunk: {} bytes", bytes.len());
                            for line in buffer.push(&bytes) {
                                if !forward_line(&line, &tx).await {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(LlmError::from(e))).await;
                            return;
                        }
                    }
                }

                if let Some(line) = buffer.finish() {
                    forward_line(&line, &tx).await;
                }
            })
        )
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}
