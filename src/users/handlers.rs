use axum::{extract::State, routing::get, Router};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, UserListQuery},
    repo_types::{NewUser, Role, User},
};
use crate::{
    auth::{
        password::{check_password, hash_password},
        Actor,
    },
    error::ApiError,
    response::ApiResponse,
    state::AppState,
    validation::{normalize_email, ValidJson, ValidPath, ValidQuery, Validator},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user))
}

fn parse_role(v: &mut Validator, raw: Option<&str>) -> Option<Role> {
    let raw = v.required("role", raw)?;
    match raw.parse::<Role>() {
        Ok(role) => Some(role),
        Err(()) => {
            v.add("role", "The selected role is invalid.");
            None
        }
    }
}

#[instrument(skip(state, actor), fields(actor = %actor.id()))]
pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
    ValidQuery(query): ValidQuery<UserListQuery>,
) -> Result<ApiResponse<Vec<User>>, ApiError> {
    actor.require_admin()?;
    let role = match query.role.as_deref() {
        None => None,
        Some(raw) => {
            let mut v = Validator::new();
            let role = parse_role(&mut v, Some(raw));
            v.finish()?;
            role
        }
    };
    let users = state.store.list_users(role).await?;
    Ok(ApiResponse::ok(users))
}

#[instrument(skip(state, actor, payload), fields(actor = %actor.id()))]
pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> Result<ApiResponse<User>, ApiError> {
    actor.require_admin()?;

    let mut v = Validator::new();
    let name = v.required("name", payload.name.as_deref());
    v.max_len("name", name.as_deref(), 255);
    let email = v.required("email", payload.email.as_deref()).map(|e| normalize_email(&e));
    v.email("email", email.as_deref());
    let password = check_password(&mut v, payload.password.as_deref());
    let role = parse_role(&mut v, payload.role.as_deref());
    let phone = v.optional(payload.phone.as_deref());
    let avatar = v.optional(payload.avatar.as_deref());
    v.finish()?;
    let (Some(name), Some(email), Some(password), Some(role)) = (name, email, password, role)
    else {
        return Err(ApiError::invalid("body", "Incomplete user."));
    };

    let user = state
        .store
        .create_user(NewUser {
            name,
            email,
            password_hash: hash_password(&password)?,
            role,
            phone,
            avatar,
        })
        .await?;

    info!(user_id = %user.id, role = %user.role, "user created");
    Ok(ApiResponse::created(user).with_message("User created"))
}

#[instrument(skip(state, actor), fields(actor = %actor.id()))]
pub async fn get_user(
    State(state): State<AppState>,
    actor: Actor,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<ApiResponse<User>, ApiError> {
    actor.require_admin()?;
    let user = state.store.find_user(id).await?.ok_or(ApiError::NotFound)?;
    Ok(ApiResponse::ok(user))
}
