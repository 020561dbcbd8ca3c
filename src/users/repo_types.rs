use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Flat role classification; there is no permission hierarchy beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Artist,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Artist => "artist",
            Role::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "artist" => Ok(Role::Artist),
            "client" => Ok(Role::Client),
            _ => Err(()),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub google_calendar_token: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_artist(&self) -> bool {
        self.role == Role::Artist
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }
}

/// Input for inserting a user. `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

/// Partial profile update; `None` leaves the column untouched and
/// `Some(None)` sets a nullable column to NULL.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: Role) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            name: "Sam".into(),
            email: "sam@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role,
            phone: None,
            avatar: None,
            google_calendar_token: Some(serde_json::json!({"refresh_token": "abc"})),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn role_predicates_are_exclusive() {
        let admin = user_with_role(Role::Admin);
        assert!(admin.is_admin() && !admin.is_artist() && !admin.is_client());
        let artist = user_with_role(Role::Artist);
        assert!(artist.is_artist() && !artist.is_admin() && !artist.is_client());
        let client = user_with_role(Role::Client);
        assert!(client.is_client() && !client.is_admin() && !client.is_artist());
    }

    #[test]
    fn serialization_hides_secrets() {
        let json = serde_json::to_value(user_with_role(Role::Artist)).unwrap();
        assert_eq!(json["role"], "artist");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("google_calendar_token").is_none());
        assert!(json["created_at"].as_str().is_some());
    }

    #[test]
    fn role_parses_only_exact_lowercase() {
        assert_eq!("artist".parse::<Role>(), Ok(Role::Artist));
        assert!("Artist".parse::<Role>().is_err());
        assert!("owner".parse::<Role>().is_err());
    }
}
