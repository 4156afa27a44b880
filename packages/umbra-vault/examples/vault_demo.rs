//! # Vault Demo
//!
//! This example walks through a small user collection:
//! 1. Start a store over an in-memory channel
//! 2. Create two users
//! 3. Find the rich ones with a predicate
//! 4. Update by pattern with `$inc` and `$set`
//! 5. List everything
//!
//! ## Run
//!
//! ```bash
//! RUST_LOG=umbra_vault=debug cargo run --example vault_demo
//! ```
//!
//! Set `VAULT_PASSPHRASE` and `VAULT_COLLECTIONS=users=<channel>` to load the
//! configuration from the environment instead of generating a key.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use umbra_vault::{
    Algorithm, ChannelTransport, EncryptionKey, Filter, MemoryChannel, Store, StoreConfig,
    UpdateOperators,
};

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
    coins: u64,
    #[serde(default)]
    premium: bool,
}

#[tokio::main]
async fn main() -> umbra_vault::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=================================================");
    println!("             UMBRA VAULT DEMO");
    println!("=================================================\n");

    // =========================================================================
    // STEP 1: Configure and start the store
    // =========================================================================
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(_) => StoreConfig::new(EncryptionKey::generate(Algorithm::Aes256Gcm))
            .with_collection("users", "demo-users"),
    };
    println!("1. Key fingerprint: {}", config.key.fingerprint());

    let channel = Arc::new(MemoryChannel::new());
    let store = Store::new(config, channel.clone())?;
    store.start().await?;

    let users = store.collection("users")?;
    println!("   Collection '{}' -> channel {}\n", users.name(), users.channel_id());

    // =========================================================================
    // STEP 2: Create users
    // =========================================================================
    println!("2. Creating users...");
    let someone = users
        .create(&json!({"username": "someone", "coins": 1000}))
        .await?;
    let another = users
        .create(&json!({"username": "another", "coins": 10}))
        .await?;
    println!("   {}", someone.fields().get("username").unwrap_or(&Value::Null));
    println!("   {}", another.fields().get("username").unwrap_or(&Value::Null));

    let raw = channel
        .get_message(users.channel_id(), someone.id())
        .await?
        .map(|m| m.content)
        .unwrap_or_default();
    println!("   Stored as: {}\n", raw);

    // =========================================================================
    // STEP 3: Find rich users
    // =========================================================================
    println!("3. Users with more than 500 coins:");
    let rich = users
        .find_by(&Filter::predicate(|doc| {
            doc.get("coins").and_then(Value::as_u64).unwrap_or(0) > 500
        }))
        .await?;
    for doc in &rich {
        let user: User = doc.parse()?;
        println!("   {} ({} coins)", user.username, user.coins);
    }
    println!();

    // =========================================================================
    // STEP 4: Update by pattern
    // =========================================================================
    println!("4. Giving 'someone' 50 coins and premium...");
    let updated = users
        .update_by(
            &Filter::field("username", "someone"),
            &UpdateOperators::new().inc("coins", 50).set("premium", true),
        )
        .await?;
    println!("   Updated {} document(s)\n", updated.len());

    // =========================================================================
    // STEP 5: List everything
    // =========================================================================
    println!("5. All users:");
    for doc in users.find_all().await? {
        let user: User = doc.parse()?;
        println!(
            "   [{}] {} coins={} premium={}",
            user.id, user.username, user.coins, user.premium
        );
    }

    println!("\n=================================================");
    println!("                 DEMO COMPLETE");
    println!("=================================================");

    Ok(())
}
