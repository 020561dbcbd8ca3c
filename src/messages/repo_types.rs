use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Who posted a message. Exactly one party, never both or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User(Uuid),
    Client(Uuid),
}

impl Sender {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Sender::User(id) => Some(*id),
            Sender::Client(_) => None,
        }
    }

    pub fn client_id(&self) -> Option<Uuid> {
        match self {
            Sender::Client(id) => Some(*id),
            Sender::User(_) => None,
        }
    }

    /// Rebuilds a sender from the two nullable storage columns.
    pub fn from_columns(user_id: Option<Uuid>, client_id: Option<Uuid>) -> Option<Sender> {
        match (user_id, client_id) {
            (Some(id), None) => Some(Sender::User(id)),
            (None, Some(id)) => Some(Sender::Client(id)),
            _ => None,
        }
    }
}

/// Raw `messages` row.
#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub content: String,
    pub read_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Sender,
    pub content: String,
    pub read_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Message {
    pub fn is_sent_by_user(&self) -> bool {
        matches!(self.sender, Sender::User(_))
    }

    pub fn is_sent_by_client(&self) -> bool {
        matches!(self.sender, Sender::Client(_))
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    /// Stamps `read_at` unless it is already set. Returns whether anything changed.
    pub fn mark_read(&mut self, now: OffsetDateTime) -> bool {
        if self.is_read() {
            return false;
        }
        self.read_at = Some(now);
        self.updated_at = now;
        true
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = String;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let sender = Sender::from_columns(row.user_id, row.client_id)
            .ok_or_else(|| format!("message {} does not have exactly one sender", row.id))?;
        Ok(Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender,
            content: row.content,
            read_at: row.read_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender: Sender,
    pub content: String,
}
