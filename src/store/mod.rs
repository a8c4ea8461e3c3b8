pub mod avatar;
pub mod conversation;
pub mod user;

pub use conversation::ConversationStore;
pub use user::UserStore;

use thiserror::Error;

use crate::llm::LlmError;
use crate::storage::StorageError;
use self::avatar::AvatarError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation '{0}' not found")]
    ConversationNotFound(String),
    #[error("message content is empty")]
    EmptyMessage,
    #[error("a reply is still streaming")]
    Busy,
    #[error("no user profile")]
    NoUser,
    #[error("Nome é obrigatório")]
    EmptyName,
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Avatar(#[from] AvatarError),
}
