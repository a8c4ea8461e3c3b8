pub mod mistral;

use async_trait::async_trait;
use futures::{ Future, Stream, StreamExt };
use log::debug;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ ApiMessage, LlmConfig, LlmError };
use self::mistral::MistralChatClient;

pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[ApiMessage]) -> Result<CompletionResponse, LlmError>;

    /// Opens a streaming request and yields text deltas in delivery order.
    async fn stream_deltas(&self, messages: &[ApiMessage]) -> Result<DeltaStream, LlmError>;

    /// Drives [`ChatClient::stream_deltas`], handing every delta to `on_chunk`
    /// as it arrives. Returns the concatenated reply.
    async fn complete_stream(
        &self,
        messages: &[ApiMessage],
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send)
    ) -> Result<String, LlmError> {
        let mut stream = self.stream_deltas(messages).await?;
        let mut full = String::new();

        while let Some(delta) = stream.next().await {
            let delta = delta?;
            on_chunk(&delta);
            full.push_str(&delta);
        }

        debug!("Stream finished with {} chars", full.chars().count());
        Ok(full)
    }

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

/// Runs `response_fn` on a spawned task and exposes what it sends as a stream.
pub fn create_streaming_response<F, Fut>(response_fn: F) -> DeltaStream
    where
        F: FnOnce(mpsc::Sender<Result<String, LlmError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client = MistralChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
