use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::Conversation;
use crate::{clients::repo_types::Client, messages::dto::MessageResource, users::repo_types::User};

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    pub client_id: Option<Uuid>,
    pub title: Option<String>,
    /// Optional opening message, posted as the creating actor.
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConversationListQuery {
    pub status: Option<String>,
    pub client_id: Option<Uuid>,
    pub artist_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// List entry: the conversation plus its newest message.
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub latest_message: Option<MessageResource>,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub client: Option<Client>,
    pub artist: Option<User>,
    pub messages: Vec<MessageResource>,
    pub latest_message: Option<MessageResource>,
}
