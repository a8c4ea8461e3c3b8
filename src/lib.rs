pub mod cli;
pub mod config;
pub mod console;
pub mod llm;
pub mod models;
pub mod render;
pub mod storage;
pub mod store;

use cli::Args;
use config::prompt::load_prompts;
use console::Console;
use log::info;
use std::error::Error;
use store::{ ConversationStore, UserStore };

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Chat Endpoint: {}", args.chat_base_url);
    info!("Chat Model: {}", args.chat_model);
    info!("Temperature: {}", args.chat_temperature);
    info!("Max Tokens: {}", args.chat_max_tokens);
    info!("Storage Type: {}", args.storage_type);
    info!("Storage Dir: {}", args.storage_dir);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("-------------------------");

    let prompts = load_prompts(args.prompts_path.as_deref())?;
    let storage = storage::create_storage(&args)?;
    let client = llm::chat::new_client(&args.llm_config())?;

    let conversations = ConversationStore::load(storage.clone(), prompts);
    let users = UserStore::load(storage);

    let mut console = Console::new(conversations, users, client);
    console.run().await
}
