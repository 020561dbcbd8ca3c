use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{Page, PageRequest, Store, StoreError, StoreResult};
use crate::clients::repo_types::{Client, ClientChanges, NewClient};
use crate::conversations::repo_types::{
    Conversation, ConversationFilter, ConversationStatus, NewConversation,
};
use crate::messages::repo_types::{Message, MessageRow, NewMessage, Sender};
use crate::users::repo_types::{NewUser, Role, User, UserChanges};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

/// Maps constraint violations onto the field they concern.
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        match db.constraint() {
            Some("users_email_key") => {
                return StoreError::conflict("email", "The email has already been taken.")
            }
            Some("clients_user_id_key") => {
                return StoreError::conflict("user_id", "The user already has a client record.")
            }
            Some("clients_user_id_fkey") => {
                return StoreError::conflict("user_id", "The selected user id is invalid.")
            }
            Some("conversations_client_id_fkey") => {
                return StoreError::conflict("client_id", "The selected client id is invalid.")
            }
            Some("conversations_artist_id_fkey") => {
                return StoreError::conflict("user_id", "The selected user id is invalid.")
            }
            Some("messages_conversation_id_fkey") => return StoreError::NotFound,
            Some("messages_user_id_fkey") | Some("messages_client_id_fkey") => {
                return StoreError::conflict("sender", "The sender does not exist.")
            }
            _ => {}
        }
    }
    StoreError::Database(e)
}

fn into_message(row: MessageRow) -> StoreResult<Message> {
    Message::try_from(row).map_err(StoreError::Corrupt)
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let now = OffsetDateTime::now_utc();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, phone, avatar, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role)
        .bind(&new.phone)
        .bind(&new.avatar)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_error)?;
        Ok(user)
    }

    async fn create_user_with_client(
        &self,
        user: NewUser,
        client: NewClient,
    ) -> StoreResult<(User, Client)> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, phone, avatar, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(&user.phone)
        .bind(&user.avatar)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, user_id, name, email, phone, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;
        Ok((user, client))
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(role)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   phone = CASE WHEN $4 THEN $5 ELSE phone END,
                   avatar = CASE WHEN $6 THEN $7 ELSE avatar END,
                   updated_at = $8
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.phone.is_some())
        .bind(changes.phone.flatten())
        .bind(changes.avatar.is_some())
        .bind(changes.avatar.flatten())
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_error)?
        .ok_or(StoreError::NotFound)
    }

    async fn set_calendar_token(
        &self,
        id: Uuid,
        token: Option<serde_json::Value>,
    ) -> StoreResult<()> {
        let done = sqlx::query(
            "UPDATE users SET google_calendar_token = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db)
        .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn create_client(&self, new: NewClient) -> StoreResult<Client> {
        let now = OffsetDateTime::now_utc();
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, user_id, name, email, phone, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.notes)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_error)?;
        Ok(client)
    }

    async fn find_client(&self, id: Uuid) -> StoreResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(client)
    }

    async fn find_client_by_user(&self, user_id: Uuid) -> StoreResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(client)
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY name ASC")
            .fetch_all(&self.db)
            .await?;
        Ok(clients)
    }

    async fn update_client(&self, id: Uuid, changes: ClientChanges) -> StoreResult<Client> {
        sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
               SET name = COALESCE($2, name),
                   email = CASE WHEN $3 THEN $4 ELSE email END,
                   phone = CASE WHEN $5 THEN $6 ELSE phone END,
                   notes = CASE WHEN $7 THEN $8 ELSE notes END,
                   updated_at = $9
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.email.is_some())
        .bind(changes.email.flatten())
        .bind(changes.phone.is_some())
        .bind(changes.phone.flatten())
        .bind(changes.notes.is_some())
        .bind(changes.notes.flatten())
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_client(&self, id: Uuid) -> StoreResult<()> {
        let done = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        debug!(client_id = %id, "client deleted with its conversations");
        Ok(())
    }

    async fn create_conversation(&self, new: NewConversation) -> StoreResult<Conversation> {
        let now = OffsetDateTime::now_utc();
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (id, client_id, artist_id, title, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.client_id)
        .bind(new.artist_id)
        .bind(&new.title)
        .bind(new.status)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_error)?;
        Ok(conversation)
    }

    async fn create_conversation_with_message(
        &self,
        new: NewConversation,
        sender: Sender,
        content: String,
    ) -> StoreResult<(Conversation, Message)> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.begin().await?;

        let conversation_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO conversations (id, client_id, artist_id, title, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(conversation_id)
        .bind(new.client_id)
        .bind(new.artist_id)
        .bind(&new.title)
        .bind(new.status)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, conversation_id, user_id, client_id, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(sender.user_id())
        .bind(sender.client_id())
        .bind(&content)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations
               SET last_message_at = $2, updated_at = $2
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(conversation_id)
        .bind(row.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((conversation, into_message(row)?))
    }

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(conversation)
    }

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> StoreResult<Vec<Conversation>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM conversations WHERE TRUE");
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(client_id) = filter.client_id {
            qb.push(" AND client_id = ").push_bind(client_id);
        }
        if let Some(artist_id) = filter.artist_id {
            qb.push(" AND artist_id = ").push_bind(artist_id);
        }
        if let Some(artist_id) = filter.visible_to_artist {
            qb.push(" AND (artist_id IS NULL OR artist_id = ")
                .push_bind(artist_id)
                .push(")");
        }
        qb.push(" ORDER BY COALESCE(last_message_at, created_at) DESC, created_at DESC");

        let rows = qb
            .build_query_as::<Conversation>()
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn assign_artist(
        &self,
        id: Uuid,
        artist_id: Uuid,
        status: ConversationStatus,
    ) -> StoreResult<Conversation> {
        sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations
               SET artist_id = $2, status = $3, updated_at = $4
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(artist_id)
        .bind(status)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_error)?
        .ok_or(StoreError::NotFound)
    }

    async fn set_conversation_status(
        &self,
        id: Uuid,
        status: ConversationStatus,
    ) -> StoreResult<Conversation> {
        sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations
               SET status = $2, updated_at = $3
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn append_message(&self, new: NewMessage) -> StoreResult<Message> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, conversation_id, user_id, client_id, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.conversation_id)
        .bind(new.sender.user_id())
        .bind(new.sender.client_id())
        .bind(&new.content)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        // Use the stored value so both columns carry the same precision.
        let touched = sqlx::query(
            "UPDATE conversations SET last_message_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(new.conversation_id)
        .bind(row.created_at)
        .execute(&mut *tx)
        .await?;
        if touched.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        into_message(row)
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<Message>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(&self.db)
                .await?;

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT * FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at ASC, id ASC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(i64::from(page.per_page))
        .bind(page.offset() as i64)
        .fetch_all(&self.db)
        .await?;

        Ok(Page {
            items: rows.into_iter().map(into_message).collect::<StoreResult<_>>()?,
            total: total.max(0) as u64,
            request: page,
        })
    }

    async fn latest_message(&self, conversation_id: Uuid) -> StoreResult<Option<Message>> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT * FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.db)
        .await?
        .map(into_message)
        .transpose()
    }

    async fn find_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(into_message)
            .transpose()
    }

    async fn mark_message_read(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<Message> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages
               SET read_at = COALESCE(read_at, $2),
                   updated_at = CASE WHEN read_at IS NULL THEN $2 ELSE updated_at END
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)?;
        into_message(row)
    }
}
