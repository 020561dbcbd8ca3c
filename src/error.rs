//! The one place HTTP error shapes are produced.
//!
//! Handlers return `Result<_, ApiError>` and never build error bodies
//! themselves. Internal detail for 500s travels in a response extension and
//! is only rendered by [`expose_error_detail`] when `APP_DEBUG` is on.

use std::collections::BTreeMap;
use std::panic::Location;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::state::AppState;
use crate::store::StoreError;

/// Per-field validation messages, e.g. `{"email": ["The email field is required."]}`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

const GENERIC_FAILURE: &str = "Unexpected error. Try again later.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("The given data was invalid")]
    Validation(FieldErrors),
    #[error("Resource not found")]
    NotFound,
    #[error("The specified URL cannot be found")]
    RouteNotFound,
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{1}")]
    Http(StatusCode, String),
    #[error("{error}")]
    Unexpected {
        error: anyhow::Error,
        kind: &'static str,
        location: &'static Location<'static>,
    },
}

impl ApiError {
    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    #[track_caller]
    pub fn unexpected(source: impl Into<anyhow::Error>, kind: &'static str) -> Self {
        ApiError::Unexpected {
            error: source.into(),
            kind,
            location: Location::caller(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::Http(status, _) => *status,
            ApiError::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    #[track_caller]
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Conflict { field, message } => ApiError::invalid(field, message),
            StoreError::Corrupt(_) => ApiError::unexpected(e, "store::StoreError::Corrupt"),
            StoreError::Database(db) => ApiError::unexpected(db, std::any::type_name::<sqlx::Error>()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    #[track_caller]
    fn from(e: anyhow::Error) -> Self {
        ApiError::unexpected(e, "anyhow::Error")
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, errors: Option<serde_json::Value>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors,
        }
    }
}

/// Internals of an unexpected failure, attached to the 500 response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub exception: &'static str,
    pub message: String,
    pub file: &'static str,
    pub line: u32,
    pub trace: Vec<String>,
}

impl ErrorDetail {
    fn capture(
        source: &anyhow::Error,
        kind: &'static str,
        location: &'static Location<'static>,
    ) -> Self {
        let mut trace: Vec<String> = source.chain().skip(1).map(|c| c.to_string()).collect();
        let backtrace = source.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            trace.extend(backtrace.to_string().lines().map(|l| l.trim().to_string()));
        }
        Self {
            exception: kind,
            message: source.to_string(),
            file: location.file(),
            line: location.line(),
            trace,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => {
                warn!(?errors, "validation failed");
                let errors = serde_json::to_value(errors).ok();
                (status, Json(ErrorBody::new("The given data was invalid", errors))).into_response()
            }
            ApiError::Unexpected {
                error,
                kind,
                location,
            } => {
                error!(error = ?error, exception = kind, at = %location, "unhandled failure");
                let mut res =
                    (status, Json(ErrorBody::new(GENERIC_FAILURE, None))).into_response();
                res.extensions_mut()
                    .insert(ErrorDetail::capture(&error, kind, location));
                res
            }
            other => {
                let message = match &other {
                    ApiError::Http(_, m) if m.is_empty() => "HTTP Exception".to_string(),
                    _ => other.to_string(),
                };
                (status, Json(ErrorBody::new(message, None))).into_response()
            }
        }
    }
}

/// Replaces the generic 500 body with the captured detail when debug is on.
pub async fn expose_error_detail(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let Some(detail) = res.extensions_mut().remove::<ErrorDetail>() else {
        return res;
    };
    if !state.config.debug {
        return res;
    }
    let status = res.status();
    let errors = serde_json::json!({
        "exception": detail.exception,
        "file": detail.file,
        "line": detail.line,
        "trace": detail.trace,
    });
    (status, Json(ErrorBody::new(detail.message, Some(errors)))).into_response()
}

/// Wraps router-generated error responses (e.g. 405) that carry no body in
/// the error envelope.
pub async fn envelope_bare_errors(req: Request, next: Next) -> Response {
    let res = next.run(req).await;
    let status = res.status();
    if !(status.is_client_error() || status.is_server_error())
        || res.headers().contains_key(header::CONTENT_TYPE)
    {
        return res;
    }
    let message = status.canonical_reason().unwrap_or_default().to_string();
    let mut wrapped = ApiError::Http(status, message).into_response();
    for (name, value) in res.headers() {
        if name != header::CONTENT_LENGTH && !wrapped.headers().contains_key(name) {
            wrapped.headers_mut().insert(name.clone(), value.clone());
        }
    }
    wrapped
}

/// Router fallback for unknown paths.
pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_maps_to_422_with_field_errors() {
        let res = ApiError::invalid("email", "The email field is required.").into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(res).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "The given data was invalid");
        assert_eq!(json["errors"]["email"][0], "The email field is required.");
    }

    #[tokio::test]
    async fn auth_and_lookup_failures_have_fixed_messages() {
        for (err, status, message) in [
            (ApiError::NotFound, StatusCode::NOT_FOUND, "Resource not found"),
            (ApiError::RouteNotFound, StatusCode::NOT_FOUND, "The specified URL cannot be found"),
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED, "Unauthenticated"),
            (ApiError::Unauthorized, StatusCode::FORBIDDEN, "Unauthorized"),
        ] {
            let res = err.into_response();
            assert_eq!(res.status(), status);
            let json = body_json(res).await;
            assert_eq!(json["message"], message);
            assert!(json.get("errors").is_none());
        }
    }

    #[tokio::test]
    async fn unexpected_hides_detail_but_attaches_it() {
        let err = ApiError::from(anyhow::anyhow!("db exploded"));
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = res.extensions().get::<ErrorDetail>().cloned().unwrap();
        assert_eq!(detail.message, "db exploded");
        assert!(detail.file.ends_with("error.rs"));

        let json = body_json(res).await;
        assert_eq!(json["message"], GENERIC_FAILURE);
        assert!(json.get("errors").is_none());
    }

    #[tokio::test]
    async fn empty_http_message_falls_back() {
        let json = body_json(ApiError::Http(StatusCode::CONFLICT, String::new()).into_response()).await;
        assert_eq!(json["message"], "HTTP Exception");
    }

    #[test]
    fn store_errors_map_to_categories() {
        assert!(matches!(ApiError::from(StoreError::NotFound), ApiError::NotFound));
        match ApiError::from(StoreError::conflict("email", "taken")) {
            ApiError::Validation(errors) => assert_eq!(errors["email"], vec!["taken".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            ApiError::from(StoreError::Corrupt("bad row".into())),
            ApiError::Unexpected { .. }
        ));
    }
}
