mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use log::info;
use std::sync::Arc;
use thiserror::Error;

use crate::cli::Args;

pub const CONVERSATIONS_KEY: &str = "ledchat_conversations";
pub const USER_KEY: &str = "ledchat_user";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported storage type: {0}")]
    UnsupportedType(String),
}

/// String key/value persistence, the equivalent of a browser's local storage.
pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

pub fn create_storage(args: &Args) -> Result<Arc<dyn LocalStorage>, StorageError> {
    match args.storage_type.to_lowercase().as_str() {
        "file" => {
            info!("State will be stored in: {}", args.storage_dir);
            Ok(Arc::new(FileStorage::new(&args.storage_dir)))
        }
        "memory" => {
            info!("State will be kept in memory only");
            Ok(Arc::new(MemoryStorage::new()))
        }
        other => Err(StorageError::UnsupportedType(other.to_string())),
    }
}
