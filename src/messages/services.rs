use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use super::{
    dto::{MessageResource, PageQuery},
    repo_types::{Message, NewMessage, Sender},
};
use crate::{
    auth::Actor,
    error::ApiError,
    state::AppState,
    store::PageRequest,
    validation::Validator,
};

pub const MAX_CONTENT_LEN: usize = 10_000;

/// Shown when the sender row can no longer be found.
pub const SYSTEM_SENDER: &str = "System";

pub fn check_content(v: &mut Validator, raw: Option<&str>) -> Option<String> {
    let content = v.required("content", raw);
    v.max_len("content", content.as_deref(), MAX_CONTENT_LEN);
    content.filter(|c| c.chars().count() <= MAX_CONTENT_LEN)
}

pub fn page_request(query: &PageQuery) -> Result<PageRequest, ApiError> {
    let mut v = Validator::new();
    let page = query.page.unwrap_or(1);
    if page < 1 {
        v.add("page", "The page must be at least 1.");
    }
    let per_page = query.per_page.unwrap_or(PageRequest::DEFAULT_PER_PAGE);
    if !(1..=PageRequest::MAX_PER_PAGE).contains(&per_page) {
        v.add(
            "per_page",
            format!(
                "The per page must be between 1 and {}.",
                PageRequest::MAX_PER_PAGE
            ),
        );
    }
    v.finish()?;
    Ok(PageRequest { page, per_page })
}

/// Appends a message from `actor` and bumps the conversation's activity.
pub async fn post(
    state: &AppState,
    actor: &Actor,
    conversation_id: Uuid,
    content: String,
) -> Result<Message, ApiError> {
    let sender = actor.sender()?;
    let message = state
        .store
        .append_message(NewMessage {
            conversation_id,
            sender,
            content,
        })
        .await?;
    info!(
        message_id = %message.id,
        conversation_id = %conversation_id,
        from_client = message.is_sent_by_client(),
        "message posted"
    );
    Ok(message)
}

pub async fn sender_name(state: &AppState, sender: &Sender) -> Result<String, ApiError> {
    let name = match sender {
        Sender::User(id) => state.store.find_user(*id).await?.map(|u| u.name),
        Sender::Client(id) => state.store.find_client(*id).await?.map(|c| c.name),
    };
    Ok(name.unwrap_or_else(|| {
        debug!(?sender, "sender row missing");
        SYSTEM_SENDER.to_string()
    }))
}

/// Every message of a conversation in creation order.
pub async fn all_messages(state: &AppState, conversation_id: Uuid) -> Result<Vec<Message>, ApiError> {
    let mut request = PageRequest {
        page: 1,
        per_page: PageRequest::MAX_PER_PAGE,
    };
    let mut messages = Vec::new();
    loop {
        let page = state.store.list_messages(conversation_id, request).await?;
        let last = u64::from(request.page) >= page.last_page();
        messages.extend(page.items);
        if last {
            return Ok(messages);
        }
        request.page += 1;
    }
}

/// Resources carrying `sender_name`, looking each distinct sender up once.
pub async fn with_sender_names(
    state: &AppState,
    messages: Vec<Message>,
) -> Result<Vec<MessageResource>, ApiError> {
    let mut names: HashMap<Sender, String> = HashMap::new();
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        let name = match names.get(&message.sender) {
            Some(name) => name.clone(),
            None => {
                let name = sender_name(state, &message.sender).await?;
                names.insert(message.sender, name.clone());
                name
            }
        };
        out.push(MessageResource::from(message).with_sender_name(name));
    }
    Ok(out)
}

/// The message if it belongs to `conversation_id`.
pub async fn find_in_conversation(
    state: &AppState,
    conversation_id: Uuid,
    message_id: Uuid,
) -> Result<Message, ApiError> {
    match state.store.find_message(message_id).await? {
        Some(m) if m.conversation_id == conversation_id => Ok(m),
        _ => Err(ApiError::NotFound),
    }
}
