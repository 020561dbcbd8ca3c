use axum::{extract::State, routing::get, Router};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateClientRequest, UpdateClientRequest},
    repo_types::{Client, ClientChanges, NewClient},
};
use crate::{
    auth::Actor,
    error::ApiError,
    response::ApiResponse,
    state::AppState,
    validation::{normalize_email, ValidJson, ValidPath, Validator},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/:id",
            get(get_client).put(update_client).delete(delete_client),
        )
}

#[instrument(skip(state, actor), fields(actor = %actor.id()))]
pub async fn list_clients(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<ApiResponse<Vec<Client>>, ApiError> {
    actor.require_staff()?;
    Ok(ApiResponse::ok(state.store.list_clients().await?))
}

#[instrument(skip(state, actor, payload), fields(actor = %actor.id()))]
pub async fn create_client(
    State(state): State<AppState>,
    actor: Actor,
    ValidJson(payload): ValidJson<CreateClientRequest>,
) -> Result<ApiResponse<Client>, ApiError> {
    actor.require_staff()?;

    let mut v = Validator::new();
    let name = v.required("name", payload.name.as_deref());
    v.max_len("name", name.as_deref(), 255);
    let email = v.optional(payload.email.as_deref()).map(|e| normalize_email(&e));
    v.email("email", email.as_deref());
    let phone = v.optional(payload.phone.as_deref());
    let notes = v.optional(payload.notes.as_deref());
    v.finish()?;
    let Some(name) = name else {
        return Err(ApiError::invalid("name", "The name field is required."));
    };

    let client = state
        .store
        .create_client(NewClient {
            user_id: payload.user_id,
            name,
            email,
            phone,
            notes,
        })
        .await?;

    info!(client_id = %client.id, linked = client.has_account(), "client created");
    Ok(ApiResponse::created(client).with_message("Client created"))
}

#[instrument(skip(state, actor), fields(actor = %actor.id()))]
pub async fn get_client(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<ApiResponse<Client>, ApiError> {
    actor.require_staff()?;
    let client = state.store.find_client(id).await?.ok_or(ApiError::NotFound)?;
    Ok(ApiResponse::ok(client))
}

#[instrument(skip(state, actor, payload), fields(actor = %actor.id()))]
pub async fn update_client(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(payload): ValidJson<UpdateClientRequest>,
) -> Result<ApiResponse<Client>, ApiError> {
    actor.require_staff()?;

    let mut v = Validator::new();
    let name = match payload.name.as_deref() {
        Some(raw) => v.required("name", Some(raw)),
        None => None,
    };
    v.max_len("name", name.as_deref(), 255);
    let email = v
        .clearable(payload.email)
        .map(|e| e.map(|e| normalize_email(&e)));
    v.email("email", email.clone().flatten().as_deref());
    let changes = ClientChanges {
        name,
        email,
        phone: v.clearable(payload.phone),
        notes: v.clearable(payload.notes),
    };
    v.finish()?;

    let client = state.store.update_client(id, changes).await?;
    info!(client_id = %client.id, "client updated");
    Ok(ApiResponse::ok(client).with_message("Client updated"))
}

#[instrument(skip(state, actor), fields(actor = %actor.id()))]
pub async fn delete_client(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    actor.require_staff()?;
    state.store.delete_client(id).await?;
    info!(client_id = %id, "client deleted");
    Ok(ApiResponse::ok(()).with_message("Client deleted"))
}
