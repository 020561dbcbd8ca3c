use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Message;

/// Wire shape of a message; the sender is split back into its two columns.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResource {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub content: String,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

impl From<Message> for MessageResource {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            user_id: m.sender.user_id(),
            client_id: m.sender.client_id(),
            is_read: m.is_read(),
            content: m.content,
            read_at: m.read_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
            sender_name: None,
        }
    }
}

impl MessageResource {
    pub fn with_sender_name(mut self, name: String) -> Self {
        self.sender_name = Some(name);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PostMessageRequest {
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
