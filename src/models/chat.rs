use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "Nova conversa";
const PREVIEW_LEN: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            role: Role::User,
            timestamp: Utc::now(),
            is_streaming: false,
        }
    }

    /// Empty assistant message that is filled in while the reply streams.
    pub fn placeholder() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: String::new(),
            role: Role::Assistant,
            timestamp: Utc::now(),
            is_streaming: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.messages.iter().any(|m| m.is_streaming)
    }

    /// Whether an assistant reply has ever been completed here.
    pub fn has_reply(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::Assistant && !m.is_streaming)
    }

    /// Sidebar line shown under the title.
    pub fn preview(&self) -> String {
        match self.messages.last() {
            Some(last) => {
                let head: String = last.content.chars().take(PREVIEW_LEN).collect();
                format!("{}...", head)
            }
            None => "Conversa vazia".to_string(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
