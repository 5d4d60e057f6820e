//! Load the demo listings: five found items, already approved, owned by a
//! fixed demo user. Safe to re-run; listings that already exist by name are
//! skipped.

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use lostfound::models::item::{Category, ItemDraft, ItemFilter, ItemKind, ItemStatus, NewItem};
use lostfound::store::postgres::PgStore;
use lostfound::store::ItemStore;

const DEMO_OWNER: &str = "00000000-0000-4000-8000-0000000000de";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seed_demo=info,lostfound=info".into()),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/lostfound".to_string());

    tracing::info!("Connecting to {}", database_url);
    let db = PgStore::connect(&database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let owner = Uuid::parse_str(DEMO_OWNER)?;
    let existing = db
        .list_items(&ItemFilter {
            owner: Some(owner),
            ..Default::default()
        })
        .await?;

    let mut inserted = 0;
    for (name, category, description, day) in demo_listings() {
        if existing.iter().any(|i| i.name == name) {
            tracing::debug!(name, "demo listing already present");
            continue;
        }
        let created_at = Utc
            .with_ymd_and_hms(2024, 1, day, 0, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid demo date"))?;
        let item = NewItem {
            user_id: owner,
            draft: ItemDraft {
                name: name.to_string(),
                category,
                description: description.to_string(),
                image_url: None,
                kind: ItemKind::Found,
            },
            status: ItemStatus::Approved,
        };
        db.insert_item_at(&item, created_at).await?;
        inserted += 1;
    }

    tracing::info!(inserted, skipped = 5 - inserted, "demo listings loaded");
    Ok(())
}

fn demo_listings() -> [(&'static str, Category, &'static str, u32); 5] {
    [
        (
            "Blue iPhone 14",
            Category::Electronics,
            "Found near the library entrance. Has a clear case with stickers.",
            15,
        ),
        (
            "Student ID Card",
            Category::IdAndCards,
            "Found in Science Building, Room 204. Name partially visible.",
            16,
        ),
        (
            "Calculus Textbook",
            Category::BooksAndNotes,
            "Stewart Calculus 8th Edition. Found in cafeteria.",
            17,
        ),
        (
            "Car Keys with Red Keychain",
            Category::Keys,
            "Toyota keys with red heart keychain. Found in parking lot B.",
            18,
        ),
        (
            "Black North Face Backpack",
            Category::BagsAndWallets,
            "Contains notebooks. Found in gym locker room.",
            19,
        ),
    ]
}
