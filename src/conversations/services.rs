//! Who may see or change a conversation, and how its status may move.

use tracing::warn;
use uuid::Uuid;

use super::repo_types::{Conversation, ConversationFilter, ConversationStatus};
use crate::{auth::Actor, error::ApiError, state::AppState};

pub fn can_view(actor: &Actor, conversation: &Conversation) -> bool {
    match actor {
        Actor::Admin(_) => true,
        Actor::Artist(user) => {
            conversation.artist_id.is_none() || conversation.is_assigned_to(user.id)
        }
        Actor::Client { client, .. } => client
            .as_ref()
            .is_some_and(|c| c.id == conversation.client_id),
    }
}

/// Loads a conversation the actor is allowed to see.
pub async fn load_visible(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
) -> Result<Conversation, ApiError> {
    if let Actor::Client { .. } = actor {
        actor.own_client()?;
    }
    let conversation = state
        .store
        .find_conversation(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !can_view(actor, &conversation) {
        warn!(conversation_id = %id, actor = %actor.id(), "conversation not visible to actor");
        return Err(ApiError::Unauthorized);
    }
    Ok(conversation)
}

/// Narrows a requested listing filter to what the actor may see.
pub fn scope_filter(
    actor: &Actor,
    mut filter: ConversationFilter,
) -> Result<ConversationFilter, ApiError> {
    match actor {
        Actor::Admin(_) => {}
        Actor::Artist(user) => filter.visible_to_artist = Some(user.id),
        Actor::Client { .. } => {
            let own = actor.own_client()?.id;
            if filter.client_id.is_some_and(|id| id != own) {
                return Err(ApiError::Unauthorized);
            }
            filter.client_id = Some(own);
        }
    }
    Ok(filter)
}

/// The client a new conversation belongs to.
pub fn creation_client(actor: &Actor, requested: Option<Uuid>) -> Result<Option<Uuid>, ApiError> {
    match actor {
        Actor::Client { .. } => {
            let own = actor.own_client()?.id;
            match requested {
                Some(id) if id != own => Err(ApiError::Unauthorized),
                _ => Ok(Some(own)),
            }
        }
        _ => Ok(requested),
    }
}

/// Admins assign anyone; artists only themselves, and only where they can see.
pub fn ensure_can_assign(
    actor: &Actor,
    conversation: &Conversation,
    artist_id: Uuid,
) -> Result<(), ApiError> {
    match actor {
        Actor::Admin(_) => Ok(()),
        Actor::Artist(user) if user.id == artist_id && can_view(actor, conversation) => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

pub fn ensure_can_change_status(actor: &Actor, conversation: &Conversation) -> Result<(), ApiError> {
    match actor {
        Actor::Admin(_) => Ok(()),
        Actor::Artist(user) if conversation.is_assigned_to(user.id) => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

pub fn parse_status(raw: &str) -> Result<ConversationStatus, ApiError> {
    raw.parse()
        .map_err(|()| ApiError::invalid("status", "The selected status is invalid."))
}

/// Validates a status move; every enumerated status is reachable.
pub fn transition(
    current: ConversationStatus,
    requested: ConversationStatus,
) -> Result<ConversationStatus, ApiError> {
    if current.can_transition_to(requested) {
        Ok(requested)
    } else {
        Err(ApiError::invalid(
            "status",
            format!("The status cannot change from {current} to {requested}."),
        ))
    }
}
