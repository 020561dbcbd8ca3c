//! Fake-data builders for the seed command and tests.

use fake::{
    faker::{
        internet::en::SafeEmail,
        lorem::en::{Paragraph, Sentence},
        name::en::Name,
        phone_number::en::PhoneNumber,
    },
    Fake,
};
use rand::Rng;
use uuid::Uuid;

use crate::{
    clients::repo_types::NewClient,
    conversations::repo_types::{ConversationStatus, NewConversation},
    messages::repo_types::{NewMessage, Sender},
    users::repo_types::{NewUser, Role},
};

/// Statuses a seeded conversation with an artist may have.
const ASSIGNED_STATUSES: [ConversationStatus; 3] = [
    ConversationStatus::Active,
    ConversationStatus::Completed,
    ConversationStatus::Archived,
];

/// A random user. The email carries a short unique suffix so repeated seeding
/// does not collide.
pub fn user<R: Rng + ?Sized>(rng: &mut R, role: Role, password_hash: &str) -> NewUser {
    let email: String = SafeEmail().fake_with_rng(rng);
    NewUser {
        name: Name().fake_with_rng(rng),
        email: unique_email(&email),
        password_hash: password_hash.to_string(),
        role,
        phone: Some(PhoneNumber().fake_with_rng(rng)),
        avatar: None,
    }
}

/// A fixed-credential user such as `admin@example.com`.
pub fn fixture_user(name: &str, email: &str, role: Role, password_hash: &str) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role,
        phone: None,
        avatar: None,
    }
}

/// A client record mirroring the user it belongs to.
pub fn client_for(user_id: Uuid, name: &str, email: &str, phone: Option<String>) -> NewClient {
    NewClient {
        user_id: Some(user_id),
        name: name.to_string(),
        email: Some(email.to_string()),
        phone,
        notes: None,
    }
}

/// A contact-only client without a login.
pub fn contact_client<R: Rng + ?Sized>(rng: &mut R) -> NewClient {
    let email: String = SafeEmail().fake_with_rng(rng);
    let notes = rng
        .gen_bool(0.5)
        .then(|| Sentence(4..10).fake_with_rng::<String, _>(rng));
    NewClient {
        user_id: None,
        name: Name().fake_with_rng(rng),
        email: Some(unique_email(&email)),
        phone: Some(PhoneNumber().fake_with_rng(rng)),
        notes,
    }
}

/// Unassigned conversations start as `new`; assigned ones are somewhere
/// further along.
pub fn conversation<R: Rng + ?Sized>(
    rng: &mut R,
    client_id: Uuid,
    artist_id: Option<Uuid>,
) -> NewConversation {
    let status = match artist_id {
        Some(_) => ASSIGNED_STATUSES[rng.gen_range(0..ASSIGNED_STATUSES.len())],
        None => ConversationStatus::New,
    };
    NewConversation {
        client_id,
        artist_id,
        title: Some(Sentence(2..4).fake_with_rng(rng)),
        status,
    }
}

pub fn message<R: Rng + ?Sized>(rng: &mut R, conversation_id: Uuid, sender: Sender) -> NewMessage {
    NewMessage {
        conversation_id,
        sender,
        content: Paragraph(1..3).fake_with_rng(rng),
    }
}

fn unique_email(email: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    match email.split_once('@') {
        Some((local, domain)) => format!("{local}+{suffix}@{domain}").to_lowercase(),
        None => format!("{email}+{suffix}@example.com").to_lowercase(),
    }
}
