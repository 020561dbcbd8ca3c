use axum::{
    extract::State,
    routing::{get, put},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        AssignRequest, ConversationDetail, ConversationListQuery, ConversationSummary,
        CreateConversationRequest, StatusRequest,
    },
    repo_types::{Conversation, ConversationFilter, ConversationStatus, NewConversation},
    services,
};
use crate::{
    auth::Actor,
    error::ApiError,
    messages::{self, dto::MessageResource},
    response::ApiResponse,
    state::AppState,
    validation::{ValidJson, ValidPath, ValidQuery, Validator},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations).post(create_conversation))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id/assign", put(assign_artist))
        .route("/conversations/:id/status", put(update_status))
}

#[instrument(skip(state, actor), fields(actor = %actor.id()))]
pub async fn list_conversations(
    State(state): State<AppState>,
    actor: Actor,
    ValidQuery(query): ValidQuery<ConversationListQuery>,
) -> Result<ApiResponse<Vec<ConversationSummary>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(services::parse_status)
        .transpose()?;
    let filter = services::scope_filter(
        &actor,
        ConversationFilter {
            status,
            client_id: query.client_id,
            artist_id: query.artist_id,
            visible_to_artist: None,
        },
    )?;

    let conversations = state.store.list_conversations(&filter).await?;
    let mut summaries = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let latest_message = state
            .store
            .latest_message(conversation.id)
            .await?
            .map(MessageResource::from);
        summaries.push(ConversationSummary {
            conversation,
            latest_message,
        });
    }
    Ok(ApiResponse::ok(summaries))
}

#[instrument(skip(state, actor, payload), fields(actor = %actor.id()))]
pub async fn create_conversation(
    State(state): State<AppState>,
    actor: Actor,
    ValidJson(payload): ValidJson<CreateConversationRequest>,
) -> Result<ApiResponse<ConversationSummary>, ApiError> {
    let client_id = services::creation_client(&actor, payload.client_id)?;

    let mut v = Validator::new();
    if client_id.is_none() {
        v.add("client_id", "The client id field is required.");
    }
    let title = v.optional(payload.title.as_deref());
    v.max_len("title", title.as_deref(), 255);
    let first_message = match payload.message.as_deref() {
        Some(raw) if !raw.trim().is_empty() => messages::services::check_content(&mut v, Some(raw)),
        _ => None,
    };
    v.finish()?;
    let Some(client_id) = client_id else {
        return Err(ApiError::invalid("client_id", "The client id field is required."));
    };
    let new = NewConversation {
        client_id,
        artist_id: None,
        title,
        status: ConversationStatus::New,
    };

    let (conversation, latest_message) = match first_message {
        Some(content) => {
            let sender = actor.sender()?;
            let (conversation, message) = state
                .store
                .create_conversation_with_message(new, sender, content)
                .await?;
            info!(message_id = %message.id, conversation_id = %conversation.id, "first message posted");
            (conversation, Some(MessageResource::from(message)))
        }
        None => (state.store.create_conversation(new).await?, None),
    };
    info!(conversation_id = %conversation.id, client_id = %client_id, "conversation created");

    Ok(ApiResponse::created(ConversationSummary {
        conversation,
        latest_message,
    })
    .with_message("Conversation created"))
}

#[instrument(skip(state, actor), fields(actor = %actor.id()))]
pub async fn get_conversation(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<ApiResponse<ConversationDetail>, ApiError> {
    let conversation = services::load_visible(&state, &actor, id).await?;

    let client = state.store.find_client(conversation.client_id).await?;
    let artist = match conversation.artist_id {
        Some(artist_id) => state.store.find_user(artist_id).await?,
        None => None,
    };
    let all = messages::services::all_messages(&state, conversation.id).await?;
    let messages = messages::services::with_sender_names(&state, all).await?;
    let latest_message = messages.last().cloned();

    Ok(ApiResponse::ok(ConversationDetail {
        conversation,
        client,
        artist,
        messages,
        latest_message,
    }))
}

#[instrument(skip(state, actor, payload), fields(actor = %actor.id()))]
pub async fn assign_artist(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(payload): ValidJson<AssignRequest>,
) -> Result<ApiResponse<Conversation>, ApiError> {
    let Some(artist_id) = payload.user_id else {
        return Err(ApiError::invalid("user_id", "The user id field is required."));
    };
    let conversation = services::load_visible(&state, &actor, id).await?;
    services::ensure_can_assign(&actor, &conversation, artist_id)?;

    match state.store.find_user(artist_id).await? {
        Some(user) if user.is_artist() => {}
        Some(_) => {
            return Err(ApiError::invalid("user_id", "The selected user is not an artist."));
        }
        None => return Err(ApiError::invalid("user_id", "The selected user id is invalid.")),
    }

    let status = conversation.status.after_assignment();
    let updated = state.store.assign_artist(id, artist_id, status).await?;
    info!(
        conversation_id = %id,
        artist_id = %artist_id,
        from = %conversation.status,
        to = %updated.status,
        "artist assigned"
    );
    Ok(ApiResponse::ok(updated).with_message("Artist assigned"))
}

#[instrument(skip(state, actor, payload), fields(actor = %actor.id()))]
pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(payload): ValidJson<StatusRequest>,
) -> Result<ApiResponse<Conversation>, ApiError> {
    let mut v = Validator::new();
    let raw = v.required("status", payload.status.as_deref());
    v.finish()?;
    let Some(raw) = raw else {
        return Err(ApiError::invalid("status", "The status field is required."));
    };
    let requested = services::parse_status(&raw)?;

    let conversation = services::load_visible(&state, &actor, id).await?;
    services::ensure_can_change_status(&actor, &conversation)?;
    let next = services::transition(conversation.status, requested)?;
    if next == conversation.status {
        return Ok(ApiResponse::ok(conversation).with_message("Status unchanged"));
    }

    let updated = state.store.set_conversation_status(id, next).await?;
    info!(conversation_id = %id, from = %conversation.status, to = %next, "status changed");
    Ok(ApiResponse::ok(updated).with_message("Status updated"))
}
