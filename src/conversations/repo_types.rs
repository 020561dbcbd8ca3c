use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "conversation_status", rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    New,
    Active,
    Completed,
    Archived,
}

impl ConversationStatus {
    pub const ALL: [ConversationStatus; 4] = [
        ConversationStatus::New,
        ConversationStatus::Active,
        ConversationStatus::Completed,
        ConversationStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::New => "new",
            ConversationStatus::Active => "active",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Archived => "archived",
        }
    }

    /// Statuses reachable in one step. The lifecycle is caller-driven, so
    /// every status may move to any other; staying put is a no-op.
    pub fn allowed_transitions(&self) -> Vec<ConversationStatus> {
        Self::ALL.into_iter().filter(|s| s != self).collect()
    }

    pub fn can_transition_to(&self, next: ConversationStatus) -> bool {
        *self == next || self.allowed_transitions().contains(&next)
    }

    /// Status after an artist is assigned.
    pub fn after_assignment(&self) -> ConversationStatus {
        match self {
            ConversationStatus::New => ConversationStatus::Active,
            other => *other,
        }
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = ();

    /// Exact match only: `"Active"` is not a status.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub client_id: Uuid,
    pub artist_id: Option<Uuid>,
    pub title: Option<String>,
    pub status: ConversationStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Conversation {
    pub fn is_assigned_to(&self, user_id: Uuid) -> bool {
        self.artist_id == Some(user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub client_id: Uuid,
    pub artist_id: Option<Uuid>,
    pub title: Option<String>,
    pub status: ConversationStatus,
}

/// Exact-match filters for listing; `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub client_id: Option<Uuid>,
    pub artist_id: Option<Uuid>,
    /// Restricts to conversations that are unassigned or assigned to this user.
    pub visible_to_artist: Option<Uuid>,
}

impl ConversationFilter {
    pub fn matches(&self, c: &Conversation) -> bool {
        self.status.map_or(true, |s| c.status == s)
            && self.client_id.map_or(true, |id| c.client_id == id)
            && self.artist_id.map_or(true, |id| c.artist_id == Some(id))
            && self
                .visible_to_artist
                .map_or(true, |id| c.artist_id.is_none() || c.artist_id == Some(id))
    }
}
