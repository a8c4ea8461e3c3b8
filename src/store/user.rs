use log::{ error, info };
use std::sync::Arc;

use super::avatar::validate_avatar;
use super::StoreError;
use crate::models::user::{ User, UserUpdate };
use crate::storage::{ LocalStorage, USER_KEY };

pub struct UserStore {
    storage: Arc<dyn LocalStorage>,
    user: Option<User>,
}

impl UserStore {
    /// Restores the saved profile. Unreadable state is logged and ignored.
    pub fn load(storage: Arc<dyn LocalStorage>) -> Self {
        let user = match storage.get_item(USER_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    error!("Error loading user: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!("Error reading user from storage: {}", e);
                None
            }
        };
        Self { storage, user }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Creates the profile on first use, otherwise merges the given fields.
    pub fn update_user(&mut self, mut update: UserUpdate) -> Result<&User, StoreError> {
        if let Some(name) = update.name.take() {
            let name = name.trim();
            if name.is_empty() {
                return Err(StoreError::EmptyName);
            }
            update.name = Some(name.to_string());
        }
        if let Some(email) = update.email.take() {
            update.email = Some(
                email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty())
            );
        }
        if let Some(avatar) = &update.avatar {
            validate_avatar(avatar)?;
        }

        match self.user.as_mut() {
            Some(user) => user.apply(update),
            None => {
                let user = User::from_update(update);
                info!("Created user profile {}", user.id);
                self.user = Some(user);
            }
        }
        self.persist();
        self.user.as_ref().ok_or(StoreError::NoUser)
    }

    pub fn update_avatar(&mut self, data_url: &str) -> Result<(), StoreError> {
        let user = self.user.as_mut().ok_or(StoreError::NoUser)?;
        validate_avatar(data_url)?;
        user.avatar = Some(data_url.to_string());
        self.persist();
        Ok(())
    }

    pub fn logout(&mut self) {
        self.user = None;
        self.persist();
    }

    fn persist(&self) {
        let result = match &self.user {
            Some(user) => serde_json
                ::to_string(user)
                .map_err(Into::into)
                .and_then(|json| self.storage.set_item(USER_KEY, &json)),
            None => self.storage.remove_item(USER_KEY),
        };
        if let Err(e) = result {
            error!("Error saving user: {}", e);
        }
    }
}
