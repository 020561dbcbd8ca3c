#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::FromRef,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use studio_api::{
    auth::jwt::JwtKeys,
    build_app,
    clients::repo_types::{Client, NewClient},
    users::repo_types::{NewUser, Role, User},
    AppState,
};
use tower::ServiceExt;

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_state(AppState::fake())
    }

    pub fn with_state(state: AppState) -> Self {
        let router = build_app(state.clone());
        Self { state, router }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub fn token_for(&self, user: &User) -> String {
        JwtKeys::from_ref(&self.state).sign_access(user.id).unwrap()
    }

    pub async fn user(&self, name: &str, role: Role) -> User {
        self.state
            .store
            .create_user(NewUser {
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
                password_hash: "not-used".into(),
                role,
                phone: None,
                avatar: None,
            })
            .await
            .unwrap()
    }

    /// A client-role user with its linked client record.
    pub async fn client_user(&self, name: &str) -> (User, Client) {
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        self.state
            .store
            .create_user_with_client(
                NewUser {
                    name: name.into(),
                    email: email.clone(),
                    password_hash: "not-used".into(),
                    role: Role::Client,
                    phone: None,
                    avatar: None,
                },
                NewClient {
                    user_id: None,
                    name: name.into(),
                    email: Some(email),
                    phone: None,
                    notes: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn contact(&self, name: &str) -> Client {
        self.state
            .store
            .create_client(NewClient {
                user_id: None,
                name: name.into(),
                email: None,
                phone: None,
                notes: None,
            })
            .await
            .unwrap()
    }
}
