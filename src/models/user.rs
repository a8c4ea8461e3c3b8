use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use uuid::Uuid;

pub const DEFAULT_USER_NAME: &str = "Usuário";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Image data URL (`data:image/...;base64,...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update; `None` fields are left untouched.
/// `email: Some(None)` removes a saved address.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub avatar: Option<String>,
}

impl User {
    pub fn from_update(update: UserUpdate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: update.name.unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
            email: update.email.flatten(),
            avatar: update.avatar,
            created_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, update: UserUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(avatar) = update.avatar {
            self.avatar = Some(avatar);
        }
    }

    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect()
    }
}
