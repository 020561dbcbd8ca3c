use axum::{
    extract::State,
    routing::{get, put},
    Router,
};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    dto::{MessageResource, PageQuery, PostMessageRequest},
    services,
};
use crate::{
    auth::Actor,
    conversations::services::load_visible,
    error::ApiError,
    response::ApiResponse,
    state::AppState,
    validation::{ValidJson, ValidPath, ValidQuery, Validator},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations/:id/messages",
            get(list_messages).post(post_message),
        )
        .route(
            "/conversations/:id/messages/:message_id/read",
            put(mark_read),
        )
}

#[instrument(skip(state, actor), fields(actor = %actor.id()))]
pub async fn list_messages(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath(id): ValidPath<Uuid>,
    ValidQuery(query): ValidQuery<PageQuery>,
) -> Result<ApiResponse<Vec<MessageResource>>, ApiError> {
    let request = services::page_request(&query)?;
    let conversation = load_visible(&state, &actor, id).await?;
    let page = state.store.list_messages(conversation.id, request).await?;
    Ok(ApiResponse::page(page.map(MessageResource::from)))
}

#[instrument(skip(state, actor, payload), fields(actor = %actor.id()))]
pub async fn post_message(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(payload): ValidJson<PostMessageRequest>,
) -> Result<ApiResponse<MessageResource>, ApiError> {
    let mut v = Validator::new();
    let content = services::check_content(&mut v, payload.content.as_deref());
    v.finish()?;
    let Some(content) = content else {
        return Err(ApiError::invalid("content", "The content field is required."));
    };

    let conversation = load_visible(&state, &actor, id).await?;
    let message = services::post(&state, &actor, conversation.id, content).await?;
    Ok(ApiResponse::created(MessageResource::from(message)).with_message("Message sent"))
}

#[instrument(skip(state, actor), fields(actor = %actor.id()))]
pub async fn mark_read(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath((id, message_id)): ValidPath<(Uuid, Uuid)>,
) -> Result<ApiResponse<MessageResource>, ApiError> {
    let conversation = load_visible(&state, &actor, id).await?;
    let message = services::find_in_conversation(&state, conversation.id, message_id).await?;
    let already_read = message.is_read();
    let message = state
        .store
        .mark_message_read(message.id, OffsetDateTime::now_utc())
        .await?;
    debug!(message_id = %message.id, already_read, "message marked read");
    Ok(ApiResponse::ok(MessageResource::from(message)))
}
