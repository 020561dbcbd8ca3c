use rand::SeedableRng;
use studio_api::{init_tracing, seed, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = AppState::init().await?;
    let mut rng = rand::rngs::StdRng::from_entropy();
    let report = seed::run(state.store.as_ref(), &mut rng).await?;
    println!(
        "seeded {} users, {} clients, {} conversations, {} messages (password: {})",
        report.users,
        report.clients,
        report.conversations,
        report.messages,
        seed::SEED_PASSWORD
    );
    Ok(())
}
