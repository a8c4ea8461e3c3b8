use clap::Parser;

use crate::llm::{ LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "LedChat - Marketing Digital IA", long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// API key for the chat-completions provider.
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Full URL of the chat-completions endpoint.
    #[arg(long, env = "CHAT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub chat_base_url: String,

    /// Model name for chat completion (e.g., mistral-large-latest)
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub chat_model: String,

    /// Sampling temperature sent with every request.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub chat_temperature: f32,

    /// Fixed cap on generated tokens per reply.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "1000")]
    pub chat_max_tokens: u32,

    // --- Storage Args ---
    /// Where conversations and the user profile are kept (file, memory)
    #[arg(long, env = "STORAGE_TYPE", default_value = "file")]
    pub storage_type: String,

    /// Directory for file storage.
    #[arg(long, env = "STORAGE_DIR", default_value = ".ledchat")]
    pub storage_dir: String,

    // --- General App Args ---
    /// Optional JSON file overriding the built-in prompts.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            api_key: Some(self.chat_api_key.clone()).filter(|k| !k.is_empty()),
            completion_model: Some(self.chat_model.clone()),
            base_url: Some(self.chat_base_url.clone()),
            temperature: self.chat_temperature,
            max_tokens: self.chat_max_tokens,
        }
    }
}
