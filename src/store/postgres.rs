use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{ItemStore, RoleStore};
use crate::models::identity::Role;
use crate::models::item::{Item, ItemFilter, ItemStatus, NewItem};

const ITEM_COLUMNS: &str = "id, user_id, name, category, description, image_url, type, status, admin_notes, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Insert a record with an explicit creation time. Used by the demo
    /// seeder to reproduce dated listings.
    pub async fn insert_item_at(
        &self,
        item: &NewItem,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<Item> {
        let sql = format!(
            r#"INSERT INTO items (user_id, name, category, description, image_url, type, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
               RETURNING {}"#,
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, Item>(&sql)
            .bind(item.user_id)
            .bind(&item.draft.name)
            .bind(item.draft.category)
            .bind(&item.draft.description)
            .bind(&item.draft.image_url)
            .bind(item.draft.kind)
            .bind(item.status)
            .bind(created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }
}

// -- Item Operations --

#[async_trait]
impl ItemStore for PgStore {
    async fn insert_item(&self, item: &NewItem) -> anyhow::Result<Item> {
        let sql = format!(
            r#"INSERT INTO items (user_id, name, category, description, image_url, type, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {}"#,
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, Item>(&sql)
            .bind(item.user_id)
            .bind(&item.draft.name)
            .bind(item.draft.category)
            .bind(&item.draft.description)
            .bind(&item.draft.image_url)
            .bind(item.draft.kind)
            .bind(item.status)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_item(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        let row = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_items(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM items WHERE TRUE", ITEM_COLUMNS));
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(owner) = filter.owner {
            qb.push(" AND user_id = ").push_bind(owner);
        }
        if let Some(kind) = filter.kind {
            qb.push(" AND type = ").push_bind(kind);
        }
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category);
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb.build_query_as::<Item>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn update_item_status(
        &self,
        id: Uuid,
        status: ItemStatus,
        admin_notes: Option<&str>,
    ) -> anyhow::Result<Option<Item>> {
        let sql = format!(
            "UPDATE items SET status = $1, admin_notes = $2, updated_at = NOW() WHERE id = $3 RETURNING {}",
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, Item>(&sql)
            .bind(status)
            .bind(admin_notes)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

// -- Role Operations --

#[async_trait]
impl RoleStore for PgStore {
    async fn has_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2)",
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn grant_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT (user_id, role) DO NOTHING",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role = $2")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
