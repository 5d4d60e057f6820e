//! Persistence seams: item records and role grants.
//!
//! Implementations: `PgStore` (PostgreSQL via sqlx) and `MemoryStore`
//! (process memory, lost on restart).

pub mod image_store;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::identity::Role;
use crate::models::item::{Item, ItemFilter, ItemStatus, NewItem};

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a record and return it as stored.
    async fn insert_item(&self, item: &NewItem) -> anyhow::Result<Item>;

    async fn get_item(&self, id: Uuid) -> anyhow::Result<Option<Item>>;

    /// All records matching every set filter, newest created first.
    async fn list_items(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>>;

    /// Set status and note, touching `updated_at`. Returns `None` if no
    /// record has this id.
    async fn update_item_status(
        &self,
        id: Uuid,
        status: ItemStatus,
        admin_notes: Option<&str>,
    ) -> anyhow::Result<Option<Item>>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn has_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool>;

    /// Returns false if the grant already existed.
    async fn grant_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool>;

    /// Returns false if there was nothing to revoke.
    async fn revoke_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool>;
}
