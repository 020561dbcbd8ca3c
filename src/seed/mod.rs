//! Development data: fixture logins plus a randomised studio.

pub mod factories;

use rand::Rng;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    auth::password::hash_password,
    clients::repo_types::{Client, NewClient},
    messages::repo_types::Sender,
    store::Store,
    users::repo_types::{NewUser, Role, User},
};

/// Password shared by every seeded login.
pub const SEED_PASSWORD: &str = "password";

const CONTACT_ONLY_CLIENTS: usize = 10;
const EXTRA_CLIENT_USERS: usize = 5;
const EXTRA_ARTISTS: usize = 3;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub clients: usize,
    pub conversations: usize,
    pub messages: usize,
}

pub async fn run<R: Rng + Send>(store: &dyn Store, rng: &mut R) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();
    let hash = hash_password(SEED_PASSWORD)?;

    ensure_user(
        store,
        factories::fixture_user("Admin User", "admin@example.com", Role::Admin, &hash),
        &mut report,
    )
    .await?;
    let mut artists = vec![
        ensure_user(
            store,
            factories::fixture_user("Artist User", "artist@example.com", Role::Artist, &hash),
            &mut report,
        )
        .await?,
    ];

    let mut clients: Vec<Client> = vec![
        ensure_client_user(
            store,
            factories::fixture_user("Client User", "client@example.com", Role::Client, &hash),
            &mut report,
        )
        .await?,
    ];

    for _ in 0..EXTRA_CLIENT_USERS {
        let new = factories::user(rng, Role::Client, &hash);
        let link = factories::client_for(uuid::Uuid::nil(), &new.name, &new.email, new.phone.clone());
        let (_, client) = store.create_user_with_client(new, link).await?;
        clients.push(client);
        report.users += 1;
        report.clients += 1;
    }
    for _ in 0..EXTRA_ARTISTS {
        artists.push(store.create_user(factories::user(rng, Role::Artist, &hash)).await?);
        report.users += 1;
    }
    for _ in 0..CONTACT_ONLY_CLIENTS {
        clients.push(store.create_client(factories::contact_client(rng)).await?);
        report.clients += 1;
    }

    for client in &clients {
        for _ in 0..rng.gen_range(1..=3) {
            let artist = rng
                .gen_bool(0.7)
                .then(|| &artists[rng.gen_range(0..artists.len())]);
            seed_conversation(store, rng, client, artist, &mut report).await?;
        }
    }

    info!(?report, "seeding finished");
    Ok(report)
}

/// Fixture logins are looked up by email first so seeding can be re-run.
async fn ensure_user(
    store: &dyn Store,
    new: NewUser,
    report: &mut SeedReport,
) -> anyhow::Result<User> {
    if let Some(existing) = store.find_user_by_email(&new.email).await? {
        debug!(email = %existing.email, "fixture user already present");
        return Ok(existing);
    }
    let user = store.create_user(new).await?;
    report.users += 1;
    Ok(user)
}

async fn ensure_client_user(
    store: &dyn Store,
    new: NewUser,
    report: &mut SeedReport,
) -> anyhow::Result<Client> {
    let link = factories::client_for(uuid::Uuid::nil(), &new.name, &new.email, None);
    let Some(existing) = store.find_user_by_email(&new.email).await? else {
        let (_, client) = store.create_user_with_client(new, link).await?;
        report.users += 1;
        report.clients += 1;
        return Ok(client);
    };
    if let Some(client) = store.find_client_by_user(existing.id).await? {
        debug!(email = %existing.email, "fixture client already present");
        return Ok(client);
    }
    let client = store
        .create_client(NewClient { user_id: Some(existing.id), ..link })
        .await?;
    report.clients += 1;
    Ok(client)
}

async fn seed_conversation<R: Rng + Send>(
    store: &dyn Store,
    rng: &mut R,
    client: &Client,
    artist: Option<&User>,
    report: &mut SeedReport,
) -> anyhow::Result<()> {
    // The client always opens the thread.
    let new = factories::conversation(rng, client.id, artist.map(|a| a.id));
    let opening = factories::message(rng, uuid::Uuid::nil(), Sender::Client(client.id));
    let (conversation, _) = store
        .create_conversation_with_message(new, opening.sender, opening.content)
        .await?;
    report.conversations += 1;
    report.messages += 1;

    let Some(artist) = artist else {
        return Ok(());
    };
    for _ in 1..rng.gen_range(1..=15) {
        let sender = if rng.gen_bool(0.5) {
            Sender::User(artist.id)
        } else {
            Sender::Client(client.id)
        };
        let message = store
            .append_message(factories::message(rng, conversation.id, sender))
            .await?;
        if rng.gen_bool(0.7) {
            store.mark_message_read(message.id, OffsetDateTime::now_utc()).await?;
        }
        report.messages += 1;
    }
    Ok(())
}
