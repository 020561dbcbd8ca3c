//! Persistence seam. Handlers only talk to `dyn Store`; `PgStore` backs
//! production and `MemoryStore` backs local runs and tests.
//!
//! Every relation is an explicit call here (`find_client`, `latest_message`,
//! ...). Nothing is fetched implicitly behind a field access.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::clients::repo_types::{Client, ClientChanges, NewClient};
use crate::conversations::repo_types::{
    Conversation, ConversationFilter, ConversationStatus, NewConversation,
};
use crate::messages::repo_types::{Message, NewMessage, Sender};
use crate::users::repo_types::{NewUser, Role, User, UserChanges};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// A uniqueness or reference constraint rejected the write.
    #[error("{field}: {message}")]
    Conflict {
        field: &'static str,
        message: String,
    },
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn conflict(field: &'static str, message: impl Into<String>) -> Self {
        StoreError::Conflict {
            field,
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub const DEFAULT_PER_PAGE: u32 = 50;
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub request: PageRequest,
}

impl<T> Page<T> {
    pub fn last_page(&self) -> u64 {
        let per_page = u64::from(self.request.per_page.max(1));
        self.total.div_ceil(per_page).max(1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            request: self.request,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // ---- users ----

    async fn create_user(&self, new: NewUser) -> StoreResult<User>;

    /// Inserts a client-role user and its linked client record atomically.
    /// `client.user_id` is ignored and replaced by the new user's id.
    async fn create_user_with_client(
        &self,
        user: NewUser,
        client: NewClient,
    ) -> StoreResult<(User, Client)>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>>;

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User>;

    async fn set_calendar_token(
        &self,
        id: Uuid,
        token: Option<serde_json::Value>,
    ) -> StoreResult<()>;

    // ---- clients ----

    async fn create_client(&self, new: NewClient) -> StoreResult<Client>;

    async fn find_client(&self, id: Uuid) -> StoreResult<Option<Client>>;

    async fn find_client_by_user(&self, user_id: Uuid) -> StoreResult<Option<Client>>;

    async fn list_clients(&self) -> StoreResult<Vec<Client>>;

    async fn update_client(&self, id: Uuid, changes: ClientChanges) -> StoreResult<Client>;

    /// Removes the client together with its conversations and their messages.
    async fn delete_client(&self, id: Uuid) -> StoreResult<()>;

    // ---- conversations ----

    async fn create_conversation(&self, new: NewConversation) -> StoreResult<Conversation>;

    /// Opens a conversation with its first message in one unit; neither row
    /// is kept if either insert fails.
    async fn create_conversation_with_message(
        &self,
        new: NewConversation,
        sender: Sender,
        content: String,
    ) -> StoreResult<(Conversation, Message)>;

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>>;

    /// Newest activity first (`last_message_at`, then `created_at`).
    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> StoreResult<Vec<Conversation>>;

    async fn assign_artist(
        &self,
        id: Uuid,
        artist_id: Uuid,
        status: ConversationStatus,
    ) -> StoreResult<Conversation>;

    async fn set_conversation_status(
        &self,
        id: Uuid,
        status: ConversationStatus,
    ) -> StoreResult<Conversation>;

    // ---- messages ----

    /// Inserts the message and moves the parent's `last_message_at` to the
    /// message's `created_at` in one unit.
    async fn append_message(&self, new: NewMessage) -> StoreResult<Message>;

    /// Creation order, oldest first.
    async fn list_messages(
        &self,
        conversation_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<Message>>;

    async fn latest_message(&self, conversation_id: Uuid) -> StoreResult<Option<Message>>;

    async fn find_message(&self, id: Uuid) -> StoreResult<Option<Message>>;

    /// Sets `read_at = now` unless already set, returning the stored message.
    async fn mark_message_read(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<Message>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_math() {
        let req = PageRequest { page: 3, per_page: 20 };
        assert_eq!(req.offset(), 40);

        let page = Page::<()> { items: vec![], total: 41, request: req };
        assert_eq!(page.last_page(), 3);

        let empty = Page::<()> { items: vec![], total: 0, request: PageRequest::default() };
        assert_eq!(empty.last_page(), 1);
    }
}
