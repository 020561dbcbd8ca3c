use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{
        AuthResponse, CalendarTokenRequest, LoginRequest, MeResponse, RefreshRequest,
        RegisterRequest, UpdateMeRequest,
    },
    extractors::Actor,
    jwt::JwtKeys,
    password::{check_password, hash_password, verify_decoy, verify_password},
};
use crate::{
    clients::repo_types::NewClient,
    error::ApiError,
    response::ApiResponse,
    state::AppState,
    users::repo_types::{NewUser, Role, User, UserChanges},
    validation::{normalize_email, ValidJson, Validator},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/me/calendar-token", put(set_calendar_token))
}

fn issue(state: &AppState, user: User) -> Result<AuthResponse, ApiError> {
    let tokens = JwtKeys::from_ref(state).issue_pair(user.id)?;
    Ok(AuthResponse { tokens, user })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let mut v = Validator::new();
    let name = v.required("name", payload.name.as_deref());
    v.max_len("name", name.as_deref(), 255);
    let email = v.required("email", payload.email.as_deref()).map(|e| normalize_email(&e));
    v.email("email", email.as_deref());
    let password = check_password(&mut v, payload.password.as_deref());
    let phone = v.optional(payload.phone.as_deref());
    v.finish()?;
    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(ApiError::invalid("body", "Incomplete registration."));
    };

    if state.store.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::invalid("email", "The email has already been taken."));
    }

    let password_hash = hash_password(&password)?;
    let (user, client) = state
        .store
        .create_user_with_client(
            NewUser {
                name: name.clone(),
                email: email.clone(),
                password_hash,
                role: Role::Client,
                phone: phone.clone(),
                avatar: None,
            },
            NewClient {
                user_id: None,
                name,
                email: Some(email),
                phone,
                notes: None,
            },
        )
        .await?;

    info!(user_id = %user.id, client_id = %client.id, "user registered");
    Ok(ApiResponse::created(issue(&state, user)?).with_message("Registered"))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let mut v = Validator::new();
    let email = v.required("email", payload.email.as_deref()).map(|e| normalize_email(&e));
    let password = v.required("password", payload.password.as_deref());
    v.finish()?;
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::Unauthenticated);
    };

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        verify_decoy(&password);
        warn!(email = %email, "login unknown email");
        return Err(invalid_credentials());
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(ApiResponse::ok(issue(&state, user)?))
}

fn invalid_credentials() -> ApiError {
    ApiError::Http(StatusCode::UNAUTHORIZED, "Invalid credentials".into())
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RefreshRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let mut v = Validator::new();
    let token = v.required("refresh_token", payload.refresh_token.as_deref());
    v.finish()?;
    let Some(token) = token else {
        return Err(ApiError::Unauthenticated);
    };

    let claims = JwtKeys::from_ref(&state).verify_refresh(&token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::Unauthenticated
    })?;
    let Some(user) = state.store.find_user(claims.sub).await? else {
        warn!(user_id = %claims.sub, "refresh for a user that no longer exists");
        return Err(ApiError::Unauthenticated);
    };

    Ok(ApiResponse::ok(issue(&state, user)?))
}

#[instrument(skip(actor), fields(user_id = %actor.id()))]
pub async fn get_me(actor: Actor) -> ApiResponse<MeResponse> {
    let response = match actor {
        Actor::Client { user, client } => MeResponse { user, client },
        staff => MeResponse {
            user: staff.into_user(),
            client: None,
        },
    };
    ApiResponse::ok(response)
}

#[instrument(skip(state, actor, payload), fields(user_id = %actor.id()))]
pub async fn update_me(
    State(state): State<AppState>,
    actor: Actor,
    ValidJson(payload): ValidJson<UpdateMeRequest>,
) -> Result<ApiResponse<User>, ApiError> {
    let mut v = Validator::new();
    let name = match payload.name.as_deref() {
        Some(raw) => v.required("name", Some(raw)),
        None => None,
    };
    v.max_len("name", name.as_deref(), 255);
    let email = match payload.email.as_deref() {
        Some(raw) => v.required("email", Some(raw)).map(|e| normalize_email(&e)),
        None => None,
    };
    v.email("email", email.as_deref());
    let changes = UserChanges {
        name,
        email,
        phone: v.clearable(payload.phone),
        avatar: v.clearable(payload.avatar),
    };
    v.finish()?;

    let user = state.store.update_user(actor.id(), changes).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(ApiResponse::ok(user).with_message("Profile updated"))
}

#[instrument(skip(state, actor, payload), fields(user_id = %actor.id()))]
pub async fn set_calendar_token(
    State(state): State<AppState>,
    actor: Actor,
    ValidJson(payload): ValidJson<CalendarTokenRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    actor.require_staff()?;
    let cleared = payload.token.is_none();
    state.store.set_calendar_token(actor.id(), payload.token).await?;
    info!(cleared, "calendar credential stored");
    Ok(ApiResponse::ok(()).with_message("Calendar token saved"))
}
