use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::{
    clients::repo_types::Client, error::ApiError, messages::repo_types::Sender,
    state::AppState, users::repo_types::{Role, User},
};

/// Extracts and validates the bearer access token, returning the user ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(ApiError::Unauthenticated)?;

        let claims = JwtKeys::from_ref(state).verify_access(token).map_err(|e| {
            debug!(error = %e, "rejected bearer token");
            ApiError::Unauthenticated
        })?;

        Ok(AuthUser(claims.sub))
    }
}

/// The authenticated caller with the records its role implies.
#[derive(Debug, Clone)]
pub enum Actor {
    Admin(User),
    Artist(User),
    /// `client` is `None` when the user has no client record yet.
    Client { user: User, client: Option<Client> },
}

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let Some(user) = state.store.find_user(user_id).await? else {
            warn!(user_id = %user_id, "token for a user that no longer exists");
            return Err(ApiError::Unauthenticated);
        };
        Actor::resolve(state, user).await
    }
}

impl Actor {
    pub async fn resolve(state: &AppState, user: User) -> Result<Self, ApiError> {
        Ok(match user.role {
            Role::Admin => Actor::Admin(user),
            Role::Artist => Actor::Artist(user),
            Role::Client => {
                let client = state.store.find_client_by_user(user.id).await?;
                Actor::Client { user, client }
            }
        })
    }

    pub fn user(&self) -> &User {
        match self {
            Actor::Admin(user) | Actor::Artist(user) | Actor::Client { user, .. } => user,
        }
    }

    pub fn id(&self) -> Uuid {
        self.user().id
    }

    pub fn into_user(self) -> User {
        match self {
            Actor::Admin(user) | Actor::Artist(user) | Actor::Client { user, .. } => user,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::Admin(_) | Actor::Artist(_))
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        match self {
            Actor::Admin(_) => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    /// The caller's own client record; staff and record-less clients get 403.
    pub fn own_client(&self) -> Result<&Client, ApiError> {
        match self {
            Actor::Client {
                client: Some(client),
                ..
            } => Ok(client),
            _ => Err(ApiError::Unauthorized),
        }
    }

    /// Who a message posted by this actor is attributed to.
    pub fn sender(&self) -> Result<Sender, ApiError> {
        match self {
            Actor::Admin(user) | Actor::Artist(user) => Ok(Sender::User(user.id)),
            Actor::Client { .. } => Ok(Sender::Client(self.own_client()?.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::repo_types::NewClient;
    use crate::users::repo_types::NewUser;
    use axum::http::Request;

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            name: "Tess".into(),
            email: email.into(),
            password_hash: "x".into(),
            role,
            phone: None,
            avatar: None,
        }
    }

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/me");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthenticated() {
        let state = AppState::fake();
        for header in [None, Some("Token abc"), Some("Bearer not-a-jwt")] {
            let mut parts = parts_with(header);
            let res = AuthUser::from_request_parts(&mut parts, &state).await;
            assert!(matches!(res, Err(ApiError::Unauthenticated)));
        }
    }

    #[tokio::test]
    async fn refresh_token_cannot_authenticate() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4()).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let res = AuthUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(res, Err(ApiError::Unauthenticated)));
    }

    #[tokio::test]
    async fn deleted_user_token_is_unauthenticated() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4()).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let res = Actor::from_request_parts(&mut parts, &state).await;
        assert!(matches!(res, Err(ApiError::Unauthenticated)));
    }

    #[tokio::test]
    async fn client_actor_resolves_its_record() {
        let state = AppState::fake();
        let (user, client) = state
            .store
            .create_user_with_client(
                new_user("client@example.com", Role::Client),
                NewClient {
                    user_id: None,
                    name: "Tess".into(),
                    email: Some("client@example.com".into()),
                    phone: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        let token = JwtKeys::from_ref(&state).sign_access(user.id).unwrap();
        let mut parts = parts_with(Some(&format!("bearer {token}")));

        let actor = Actor::from_request_parts(&mut parts, &state).await.unwrap();
        assert!(!actor.is_staff());
        assert_eq!(actor.own_client().unwrap().id, client.id);
        assert_eq!(actor.sender().unwrap(), Sender::Client(client.id));
        assert!(matches!(actor.require_staff(), Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn client_without_record_cannot_post() {
        let state = AppState::fake();
        let user = state
            .store
            .create_user(new_user("orphan@example.com", Role::Client))
            .await
            .unwrap();
        let actor = Actor::resolve(&state, user).await.unwrap();
        assert!(matches!(actor.sender(), Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn staff_post_as_users() {
        let state = AppState::fake();
        let user = state
            .store
            .create_user(new_user("artist@example.com", Role::Artist))
            .await
            .unwrap();
        let actor = Actor::resolve(&state, user.clone()).await.unwrap();
        assert!(actor.is_staff());
        assert_eq!(actor.sender().unwrap(), Sender::User(user.id));
        assert!(matches!(actor.require_admin(), Err(ApiError::Unauthorized)));
    }
}
