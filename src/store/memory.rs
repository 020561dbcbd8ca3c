use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Page, PageRequest, Store, StoreError, StoreResult};
use crate::clients::repo_types::{Client, ClientChanges, NewClient};
use crate::conversations::repo_types::{
    Conversation, ConversationFilter, ConversationStatus, NewConversation,
};
use crate::messages::repo_types::{Message, NewMessage, Sender};
use crate::users::repo_types::{NewUser, Role, User, UserChanges};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    clients: Vec<Client>,
    conversations: Vec<Conversation>,
    /// Kept in insertion order, which is creation order.
    messages: Vec<Message>,
}

impl Tables {
    fn insert_user(&mut self, new: NewUser, now: OffsetDateTime) -> StoreResult<User> {
        if self.users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::conflict("email", "The email has already been taken."));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            phone: new.phone,
            avatar: new.avatar,
            google_calendar_token: None,
            created_at: now,
            updated_at: now,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    fn insert_client(&mut self, new: NewClient, now: OffsetDateTime) -> StoreResult<Client> {
        if let Some(user_id) = new.user_id {
            if !self.users.iter().any(|u| u.id == user_id) {
                return Err(StoreError::conflict("user_id", "The selected user id is invalid."));
            }
            if self.clients.iter().any(|c| c.user_id == Some(user_id)) {
                return Err(StoreError::conflict(
                    "user_id",
                    "The user already has a client record.",
                ));
            }
        }
        let client = Client {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        self.clients.push(client.clone());
        Ok(client)
    }

    fn insert_conversation(
        &mut self,
        new: NewConversation,
        now: OffsetDateTime,
    ) -> StoreResult<Conversation> {
        if !self.clients.iter().any(|c| c.id == new.client_id) {
            return Err(StoreError::conflict("client_id", "The selected client id is invalid."));
        }
        if let Some(artist_id) = new.artist_id {
            if !self.users.iter().any(|u| u.id == artist_id) {
                return Err(StoreError::conflict("user_id", "The selected user id is invalid."));
            }
        }
        let conversation = Conversation {
            id: Uuid::new_v4(),
            client_id: new.client_id,
            artist_id: new.artist_id,
            title: new.title,
            status: new.status,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        };
        self.conversations.push(conversation.clone());
        Ok(conversation)
    }

    /// Appends the message and moves the parent's activity stamp.
    fn insert_message(&mut self, new: NewMessage, now: OffsetDateTime) -> StoreResult<Message> {
        let sender_exists = match new.sender {
            Sender::User(id) => self.users.iter().any(|u| u.id == id),
            Sender::Client(id) => self.clients.iter().any(|c| c.id == id),
        };
        if !sender_exists {
            return Err(StoreError::conflict("sender", "The sender does not exist."));
        }

        let conversation = self.conversation_mut(new.conversation_id)?;
        conversation.last_message_at = Some(now);
        conversation.updated_at = now;

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id,
            sender: new.sender,
            content: new.content,
            read_at: None,
            created_at: now,
            updated_at: now,
        };
        self.messages.push(message.clone());
        Ok(message)
    }

    fn conversation_mut(&mut self, id: Uuid) -> StoreResult<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound)
    }
}

/// Process-local store. Every call takes the single lock once, so each call
/// is atomic the way a Postgres transaction is.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        t.insert_user(new, OffsetDateTime::now_utc())
    }

    async fn create_user_with_client(
        &self,
        user: NewUser,
        client: NewClient,
    ) -> StoreResult<(User, Client)> {
        let now = OffsetDateTime::now_utc();
        let mut t = self.tables.write().await;
        let user = t.insert_user(user, now)?;
        let client = match t.insert_client(NewClient { user_id: Some(user.id), ..client }, now) {
            Ok(c) => c,
            Err(e) => {
                t.users.retain(|u| u.id != user.id);
                return Err(e);
            }
        };
        Ok((user, client))
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let t = self.tables.read().await;
        Ok(t.users
            .iter()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if let Some(email) = &changes.email {
            if t.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::conflict("email", "The email has already been taken."));
            }
        }
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(phone) = changes.phone {
            user.phone = phone;
        }
        if let Some(avatar) = changes.avatar {
            user.avatar = avatar;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn set_calendar_token(
        &self,
        id: Uuid,
        token: Option<serde_json::Value>,
    ) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        user.google_calendar_token = token;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn create_client(&self, new: NewClient) -> StoreResult<Client> {
        let mut t = self.tables.write().await;
        t.insert_client(new, OffsetDateTime::now_utc())
    }

    async fn find_client(&self, id: Uuid) -> StoreResult<Option<Client>> {
        let t = self.tables.read().await;
        Ok(t.clients.iter().find(|c| c.id == id).cloned())
    }

    async fn find_client_by_user(&self, user_id: Uuid) -> StoreResult<Option<Client>> {
        let t = self.tables.read().await;
        Ok(t.clients.iter().find(|c| c.user_id == Some(user_id)).cloned())
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let t = self.tables.read().await;
        let mut clients = t.clients.clone();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }

    async fn update_client(&self, id: Uuid, changes: ClientChanges) -> StoreResult<Client> {
        let mut t = self.tables.write().await;
        let client = t
            .clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(name) = changes.name {
            client.name = name;
        }
        if let Some(email) = changes.email {
            client.email = email;
        }
        if let Some(phone) = changes.phone {
            client.phone = phone;
        }
        if let Some(notes) = changes.notes {
            client.notes = notes;
        }
        client.updated_at = OffsetDateTime::now_utc();
        Ok(client.clone())
    }

    async fn delete_client(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let before = t.clients.len();
        t.clients.retain(|c| c.id != id);
        if t.clients.len() == before {
            return Err(StoreError::NotFound);
        }
        let doomed: Vec<Uuid> = t
            .conversations
            .iter()
            .filter(|c| c.client_id == id)
            .map(|c| c.id)
            .collect();
        t.conversations.retain(|c| c.client_id != id);
        // Mirrors the Postgres cascades on both conversation_id and client_id.
        t.messages
            .retain(|m| !doomed.contains(&m.conversation_id) && m.sender != Sender::Client(id));
        Ok(())
    }

    async fn create_conversation(&self, new: NewConversation) -> StoreResult<Conversation> {
        let mut t = self.tables.write().await;
        t.insert_conversation(new, OffsetDateTime::now_utc())
    }

    async fn create_conversation_with_message(
        &self,
        new: NewConversation,
        sender: Sender,
        content: String,
    ) -> StoreResult<(Conversation, Message)> {
        let now = OffsetDateTime::now_utc();
        let mut t = self.tables.write().await;
        let conversation = t.insert_conversation(new, now)?;
        let message = match t.insert_message(
            NewMessage {
                conversation_id: conversation.id,
                sender,
                content,
            },
            now,
        ) {
            Ok(m) => m,
            Err(e) => {
                t.conversations.retain(|c| c.id != conversation.id);
                return Err(e);
            }
        };
        let conversation = t.conversation_mut(conversation.id)?.clone();
        Ok((conversation, message))
    }

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let t = self.tables.read().await;
        Ok(t.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> StoreResult<Vec<Conversation>> {
        let t = self.tables.read().await;
        let mut rows: Vec<Conversation> = t
            .conversations
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let activity = |c: &Conversation| c.last_message_at.unwrap_or(c.created_at);
            activity(b)
                .cmp(&activity(a))
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn assign_artist(
        &self,
        id: Uuid,
        artist_id: Uuid,
        status: ConversationStatus,
    ) -> StoreResult<Conversation> {
        let mut t = self.tables.write().await;
        if !t.users.iter().any(|u| u.id == artist_id) {
            return Err(StoreError::conflict("user_id", "The selected user id is invalid."));
        }
        let conversation = t.conversation_mut(id)?;
        conversation.artist_id = Some(artist_id);
        conversation.status = status;
        conversation.updated_at = OffsetDateTime::now_utc();
        Ok(conversation.clone())
    }

    async fn set_conversation_status(
        &self,
        id: Uuid,
        status: ConversationStatus,
    ) -> StoreResult<Conversation> {
        let mut t = self.tables.write().await;
        let conversation = t.conversation_mut(id)?;
        conversation.status = status;
        conversation.updated_at = OffsetDateTime::now_utc();
        Ok(conversation.clone())
    }

    async fn append_message(&self, new: NewMessage) -> StoreResult<Message> {
        let mut t = self.tables.write().await;
        t.insert_message(new, OffsetDateTime::now_utc())
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<Message>> {
        let t = self.tables.read().await;
        let all: Vec<&Message> = t
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        let items = all
            .iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .map(|m| (*m).clone())
            .collect();
        Ok(Page {
            items,
            total: all.len() as u64,
            request: page,
        })
    }

    async fn latest_message(&self, conversation_id: Uuid) -> StoreResult<Option<Message>> {
        let t = self.tables.read().await;
        Ok(t.messages
            .iter()
            .rev()
            .find(|m| m.conversation_id == conversation_id)
            .cloned())
    }

    async fn find_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        let t = self.tables.read().await;
        Ok(t.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn mark_message_read(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<Message> {
        let mut t = self.tables.write().await;
        let message = t
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound)?;
        message.mark_read(now);
        Ok(message.clone())
    }
}
