use log::{ debug, error, info, warn };
use std::sync::Arc;

use super::StoreError;
use crate::config::prompt::PromptConfig;
use crate::llm::chat::ChatClient;
use crate::llm::ApiMessage;
use crate::models::chat::{ Conversation, Message, Role };
use crate::storage::{ LocalStorage, CONVERSATIONS_KEY };

pub const MAX_TITLE_CHARS: usize = 50;
const FALLBACK_TITLE_CHARS: usize = 30;

/// Conversation list plus the active conversation, mirrored to storage.
pub struct ConversationStore {
    storage: Arc<dyn LocalStorage>,
    prompts: Arc<PromptConfig>,
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl ConversationStore {
    pub fn new(storage: Arc<dyn LocalStorage>, prompts: Arc<PromptConfig>) -> Self {
        Self {
            storage,
            prompts,
            conversations: Vec::new(),
            active_id: None,
        }
    }

    /// Restores the saved list. Unreadable state is logged and the store starts empty.
    pub fn load(storage: Arc<dyn LocalStorage>, prompts: Arc<PromptConfig>) -> Self {
        let mut store = Self::new(storage, prompts);
        match store.storage.get_item(CONVERSATIONS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Conversation>>(&raw) {
                Ok(mut conversations) => {
                    for conversation in &mut conversations {
                        drop_interrupted_reply(conversation);
                    }
                    info!("Loaded {} conversations", conversations.len());
                    store.conversations = conversations;
                }
                Err(e) => error!("Error loading conversations: {}", e),
            },
            Ok(None) => {}
            Err(e) => error!("Error reading conversations from storage: {}", e),
        }
        store
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active(&self) -> Option<&Conversation> {
        let id = self.active_id.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Prepends an empty conversation and makes it active. Returns its id.
    pub fn create(&mut self) -> String {
        let conversation = Conversation::new();
        let id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        self.active_id = Some(id.clone());
        self.persist();
        id
    }

    pub fn select(&mut self, id: &str) -> Result<&Conversation, StoreError> {
        let index = self.position(id)?;
        self.active_id = Some(id.to_string());
        Ok(&self.conversations[index])
    }

    /// Returns whether a conversation was removed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return false;
        }
        if self.active_id.as_deref() == Some(id) {
            self.active_id = None;
        }
        self.persist();
        true
    }

    pub fn rename(&mut self, id: &str, title: &str) -> Result<(), StoreError> {
        let index = self.position(id)?;
        let conversation = &mut self.conversations[index];
        conversation.title = title.to_string();
        conversation.touch();
        self.persist();
        Ok(())
    }

    /// Sends `content` in the active conversation (creating one if none is
    /// active) and streams the reply into a placeholder message. `on_update`
    /// sees the conversation after every change. On failure the placeholder is
    /// removed and the user message is kept.
    ///
    /// `&mut self` is held until the reply and title are settled, so two sends
    /// never overlap.
    pub async fn send<F>(
        &mut self,
        client: &dyn ChatClient,
        content: &str,
        mut on_update: F
    ) -> Result<(), StoreError>
        where F: FnMut(&Conversation) + Send
    {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyMessage);
        }
        let id = match self.active_id.clone() {
            Some(id) => id,
            None => self.create(),
        };
        let index = self.position(&id)?;
        if self.conversations[index].is_streaming() {
            return Err(StoreError::Busy);
        }

        let mut api_messages = vec![ApiMessage::system(self.prompts.system_prompt.clone())];
        api_messages.extend(self.conversations[index].messages.iter().map(to_api_message));
        api_messages.push(ApiMessage::user(content));
        let conversation = &self.conversations[index];
        let title_source = if conversation.has_reply() {
            None
        } else {
            Some(first_user_message(conversation).unwrap_or(content).to_string())
        };

        {
            let conversation = &mut self.conversations[index];
            conversation.messages.push(Message::user(content));
            conversation.messages.push(Message::placeholder());
            conversation.touch();
            on_update(conversation);
        }
        self.persist();

        let result = {
            let conversation = &mut self.conversations[index];
            let mut on_chunk = |chunk: &str| {
                if let Some(placeholder) = conversation.messages.last_mut() {
                    placeholder.content.push_str(chunk);
                }
                conversation.touch();
                on_update(&*conversation);
            };
            client.complete_stream(&api_messages, &mut on_chunk).await
        };

        let conversation = &mut self.conversations[index];
        match result {
            Ok(full) => {
                if let Some(reply) = conversation.messages.last_mut() {
                    reply.content = full;
                    reply.is_streaming = false;
                }
                conversation.touch();
                on_update(conversation);
                debug!("Reply finalized in conversation {}", id);
            }
            Err(e) => {
                error!("Error sending message: {}", e);
                conversation.messages.pop();
                conversation.touch();
                on_update(conversation);
                self.persist();
                return Err(e.into());
            }
        }
        self.persist();

        if let Some(first_message) = title_source {
            let title = self.generate_title(client, &first_message).await;
            self.rename(&id, &title)?;
            if let Some(conversation) = self.get(&id) {
                on_update(conversation);
            }
        }
        Ok(())
    }

    /// Asks the model for a short title. Falls back to the head of the message.
    pub async fn generate_title(&self, client: &dyn ChatClient, first_message: &str) -> String {
        let messages = [
            ApiMessage::system(self.prompts.title_prompt.clone()),
            ApiMessage::user(first_message),
        ];
        match client.complete(&messages).await {
            Ok(resp) if !resp.response.trim().is_empty() => {
                resp.response.trim().chars().take(MAX_TITLE_CHARS).collect()
            }
            Ok(_) => {
                warn!("Model returned an empty title");
                fallback_title(first_message)
            }
            Err(e) => {
                error!("Error generating title: {}", e);
                fallback_title(first_message)
            }
        }
    }

    fn position(&self, id: &str) -> Result<usize, StoreError> {
        self.conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))
    }

    fn persist(&self) {
        let result = serde_json
            ::to_string(&self.conversations)
            .map_err(Into::into)
            .and_then(|json| self.storage.set_item(CONVERSATIONS_KEY, &json));
        if let Err(e) = result {
            error!("Error saving conversations: {}", e);
        }
    }
}

fn to_api_message(message: &Message) -> ApiMessage {
    match message.role {
        Role::User => ApiMessage::user(message.content.clone()),
        Role::Assistant => ApiMessage::assistant(message.content.clone()),
    }
}

fn first_user_message(conversation: &Conversation) -> Option<&str> {
    conversation.messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

fn fallback_title(message: &str) -> String {
    let head: String = message.chars().take(FALLBACK_TITLE_CHARS).collect();
    if message.chars().count() > FALLBACK_TITLE_CHARS {
        format!("{}...", head)
    } else {
        head
    }
}

/// A reply still marked as streaming in storage was cut off by an exit.
fn drop_interrupted_reply(conversation: &mut Conversation) {
    let before = conversation.messages.len();
    conversation.messages.retain(|m| !(m.is_streaming && m.role == Role::Assistant));
    for message in &mut conversation.messages {
        message.is_streaming = false;
    }
    if conversation.messages.len() != before {
        warn!("Dropped interrupted reply in conversation {}", conversation.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::{ CompletionResponse, DeltaStream };
    use crate::llm::LlmError;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use futures::{ stream, StreamExt };
    use std::sync::Mutex;

    /// Replays fixed deltas and records every request it receives.
    struct ScriptedClient {
        deltas: Vec<&'static str>,
        fail_stream: bool,
        drop_mid_stream: bool,
        title: Result<&'static str, ()>,
        requests: Mutex<Vec<Vec<ApiMessage>>>,
    }

    impl ScriptedClient {
        fn replying(deltas: Vec<&'static str>) -> Self {
            Self {
                deltas,
                fail_stream: false,
                drop_mid_stream: false,
                title: Ok("Estratégia Digital"),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self { fail_stream: true, title: Err(()), ..Self::replying(Vec::new()) }
        }

        /// Delivers `deltas`, then the connection drops.
        fn dropping_after(deltas: Vec<&'static str>) -> Self {
            Self { drop_mid_stream: true, ..Self::replying(deltas) }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn complete(&self, messages: &[ApiMessage]) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(messages.to_vec());
            self.title
                .map(|t| CompletionResponse { response: t.to_string() })
                .map_err(|_| LlmError::Connection("HTTP 503".into()))
        }

        async fn stream_deltas(&self, messages: &[ApiMessage]) -> Result<DeltaStream, LlmError> {
            self.requests.lock().unwrap().push(messages.to_vec());
            if self.fail_stream {
                return Err(LlmError::Connection("HTTP 500".into()));
            }
            let mut items: Vec<Result<String, LlmError>> = self.deltas
                .iter()
                .map(|d| Ok(d.to_string()))
                .collect();
            if self.drop_mid_stream {
                items.push(Err(LlmError::Connection("connection reset".into())));
            }
            Ok(stream::iter(items).boxed())
        }

        fn get_model(&self) -> String {
            "scripted".into()
        }

        fn get_base_url(&self) -> String {
            "http://scripted".into()
        }
    }

    fn store_with(storage: Arc<dyn LocalStorage>) -> ConversationStore {
        ConversationStore::load(storage, Arc::new(PromptConfig::default()))
    }

    fn empty_store() -> ConversationStore {
        store_with(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn create_prepends_and_activates() {
        let mut store = empty_store();
        let first = store.create();
        let second = store.create();

        assert_eq!(store.conversations()[0].id, second);
        assert_eq!(store.conversations()[1].id, first);
        assert_eq!(store.active_id(), Some(second.as_str()));
        assert_eq!(store.active().unwrap().title, "Nova conversa");
    }

    #[test]
    fn select_unknown_id_keeps_active() {
        let mut store = empty_store();
        let first = store.create();
        let second = store.create();

        store.select(&first).unwrap();
        assert_eq!(store.active_id(), Some(first.as_str()));
        assert!(matches!(store.select("missing"), Err(StoreError::ConversationNotFound(_))));
        assert_eq!(store.active_id(), Some(first.as_str()));
        assert!(store.get(&second).is_some());
    }

    #[test]
    fn deleting_active_clears_pointer() {
        let mut store = empty_store();
        let first = store.create();
        let second = store.create();

        assert!(store.delete(&first));
        assert_eq!(store.active_id(), Some(second.as_str()));

        assert!(store.delete(&second));
        assert_eq!(store.active_id(), None);
        assert!(!store.delete(&second));
    }

    #[test]
    fn rename_updates_title() {
        let mut store = empty_store();
        let id = store.create();
        store.rename(&id, "SEO local").unwrap();
        assert_eq!(store.get(&id).unwrap().title, "SEO local");
        assert!(store.rename("missing", "x").is_err());
    }

    #[tokio::test]
    async fn successful_send_adds_two_messages_and_titles_conversation() {
        let mut store = empty_store();
        let client = ScriptedClient::replying(vec!["Comece ", "pelo ", "público."]);
        let mut snapshots = Vec::new();

        store
            .send(&client, "Como criar uma estratégia de marketing digital?", |c| {
                snapshots.push(c.messages.last().map(|m| m.content.clone()).unwrap_or_default())
            })
            .await
            .unwrap();

        let conversation = store.active().unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].role, Role::User);
        let reply = &conversation.messages[1];
        assert_eq!(reply.content, "Comece pelo público.");
        assert!(!reply.is_streaming);
        assert_eq!(conversation.title, "Estratégia Digital");
        assert!(conversation.title.chars().count() <= MAX_TITLE_CHARS);

        assert!(snapshots.contains(&"Comece ".to_string()));
        assert!(snapshots.contains(&"Comece pelo ".to_string()));

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0][0].role, crate::llm::ChatRole::System);
        assert_eq!(requests[0].last().unwrap().content, "Como criar uma estratégia de marketing digital?");
        assert_eq!(requests[1][1].content, "Como criar uma estratégia de marketing digital?");
    }

    #[tokio::test]
    async fn failed_send_keeps_only_user_message() {
        let mut store = empty_store();
        store.create();
        let client = ScriptedClient::failing();

        let result = store.send(&client, "Olá", |_| {}).await;

        assert!(matches!(result, Err(StoreError::Llm(LlmError::Connection(_)))));
        let conversation = store.active().unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].content, "Olá");
        assert_eq!(conversation.title, "Nova conversa");
    }

    #[tokio::test]
    async fn stream_dropped_midway_removes_partial_reply() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let mut store = store_with(storage.clone());
        let client = ScriptedClient::dropping_after(vec!["a"]);
        let mut partial_seen = false;

        let result = store
            .send(&client, "Olá", |c| {
                if c.messages.last().map(|m| m.content.as_str()) == Some("a") {
                    partial_seen = true;
                }
            }).await;

        assert!(matches!(result, Err(StoreError::Llm(LlmError::Connection(_)))));
        assert!(partial_seen);
        let conversation = store.active().unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].role, Role::User);
        assert!(!conversation.is_streaming());

        let reloaded = store_with(storage);
        assert_eq!(reloaded.conversations()[0].messages.len(), 1);
        assert_eq!(reloaded.conversations()[0].messages[0].content, "Olá");
    }

    #[tokio::test]
    async fn title_follows_first_successful_exchange() {
        let mut store = empty_store();
        store.send(&ScriptedClient::failing(), "primeira", |_| {}).await.unwrap_err();
        assert_eq!(store.active().unwrap().title, "Nova conversa");

        let client = ScriptedClient::replying(vec!["ok"]);
        store.send(&client, "segunda", |_| {}).await.unwrap();

        let conversation = store.active().unwrap();
        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.title, "Estratégia Digital");

        let requests = client.requests.lock().unwrap();
        let title_request = requests.last().unwrap();
        assert_eq!(title_request.len(), 2);
        assert_eq!(title_request[1].content, "primeira");
    }

    #[tokio::test]
    async fn later_sends_carry_history_and_keep_title() {
        let mut store = empty_store();
        let client = ScriptedClient::replying(vec!["ok"]);
        store.send(&client, "primeira", |_| {}).await.unwrap();
        let id = store.active_id().unwrap().to_string();
        store.rename(&id, "Meu título").unwrap();

        store.send(&client, "segunda", |_| {}).await.unwrap();

        let conversation = store.active().unwrap();
        assert_eq!(conversation.messages.len(), 4);
        assert_eq!(conversation.title, "Meu título");

        let requests = client.requests.lock().unwrap();
        let last = requests.last().unwrap();
        let contents: Vec<&str> = last.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(&contents[1..], &["primeira", "ok", "segunda"]);
    }

    #[tokio::test]
    async fn title_falls_back_to_message_head() {
        let store = empty_store();
        let client = ScriptedClient::failing();

        let long = "Quais métricas acompanhar em campanhas de Google Ads?";
        let title = store.generate_title(&client, long).await;
        assert_eq!(title, format!("{}...", long.chars().take(30).collect::<String>()));
        assert_eq!(store.generate_title(&client, "SEO").await, "SEO");
    }

    #[tokio::test]
    async fn long_model_titles_are_truncated() {
        let store = empty_store();
        let mut client = ScriptedClient::replying(vec![]);
        client.title = Ok("Um título gerado pelo modelo que é bem mais longo do que deveria ser");

        let title = store.generate_title(&client, "oi").await;
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
    }

    #[tokio::test]
    async fn empty_content_is_rejected_before_mutation() {
        let mut store = empty_store();
        let client = ScriptedClient::replying(vec!["x"]);
        assert!(matches!(store.send(&client, "   ", |_| {}).await, Err(StoreError::EmptyMessage)));
        assert!(store.conversations().is_empty());
    }

    #[tokio::test]
    async fn state_survives_reload() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let mut store = store_with(storage.clone());
        let client = ScriptedClient::replying(vec!["resposta"]);
        store.send(&client, "pergunta", |_| {}).await.unwrap();
        let older = store.active_id().unwrap().to_string();
        store.create();

        let reloaded = store_with(storage);
        assert_eq!(reloaded.conversations(), store.conversations());
        assert_eq!(reloaded.conversations()[1].id, older);
        assert!(reloaded.active().is_none());
    }

    #[test]
    fn corrupt_storage_starts_empty() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        storage.set_item(CONVERSATIONS_KEY, "[{\"id\": 1").unwrap();
        assert!(store_with(storage).conversations().is_empty());
    }

    #[test]
    fn interrupted_reply_is_dropped_on_load() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let mut conversation = Conversation::new();
        conversation.messages.push(Message::user("oi"));
        conversation.messages.push(Message::placeholder());
        storage
            .set_item(CONVERSATIONS_KEY, &serde_json::to_string(&vec![conversation]).unwrap())
            .unwrap();

        let store = store_with(storage);
        let messages = &store.conversations()[0].messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }
}
