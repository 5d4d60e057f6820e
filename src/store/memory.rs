use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use super::{ItemStore, RoleStore};
use crate::models::identity::Role;
use crate::models::item::{Item, ItemFilter, ItemStatus, NewItem};

#[derive(Clone)]
struct Entry {
    /// Insertion order, breaks ties between equal `created_at` values.
    seq: u64,
    item: Item,
}

/// Item and role storage held in process memory. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    items: Arc<DashMap<Uuid, Entry>>,
    roles: Arc<DashSet<(Uuid, Role)>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert_item(&self, new: &NewItem) -> anyhow::Result<Item> {
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            name: new.draft.name.clone(),
            category: new.draft.category,
            description: new.draft.description.clone(),
            image_url: new.draft.image_url.clone(),
            kind: new.draft.kind,
            status: new.status,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        };
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.items.insert(
            item.id,
            Entry {
                seq,
                item: item.clone(),
            },
        );
        Ok(item)
    }

    async fn get_item(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        Ok(self.items.get(&id).map(|e| e.item.clone()))
    }

    async fn list_items(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>> {
        let mut entries: Vec<Entry> = self
            .items
            .iter()
            .filter(|e| filter.matches(&e.item))
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| {
            b.item
                .created_at
                .cmp(&a.item.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(entries.into_iter().map(|e| e.item).collect())
    }

    async fn update_item_status(
        &self,
        id: Uuid,
        status: ItemStatus,
        admin_notes: Option<&str>,
    ) -> anyhow::Result<Option<Item>> {
        let Some(mut entry) = self.items.get_mut(&id) else {
            return Ok(None);
        };
        entry.item.status = status;
        entry.item.admin_notes = admin_notes.map(String::from);
        entry.item.updated_at = Utc::now();
        Ok(Some(entry.item.clone()))
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn has_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool> {
        Ok(self.roles.contains(&(user_id, role)))
    }

    async fn grant_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool> {
        Ok(self.roles.insert((user_id, role)))
    }

    async fn revoke_role(&self, user_id: Uuid, role: Role) -> anyhow::Result<bool> {
        Ok(self.roles.remove(&(user_id, role)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{Category, ItemDraft, ItemKind};

    fn new_item(owner: Uuid, name: &str, status: ItemStatus) -> NewItem {
        NewItem {
            user_id: owner,
            draft: ItemDraft {
                name: name.into(),
                category: Category::Keys,
                description: "desc".into(),
                image_url: None,
                kind: ItemKind::Lost,
            },
            status,
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filtered() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.insert_item(&new_item(alice, "first", ItemStatus::Pending)).await.unwrap();
        store.insert_item(&new_item(bob, "second", ItemStatus::Approved)).await.unwrap();
        store.insert_item(&new_item(alice, "third", ItemStatus::Approved)).await.unwrap();

        let all = store.list_items(&ItemFilter::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["third", "second", "first"]);

        let approved_alice = store
            .list_items(&ItemFilter {
                status: Some(ItemStatus::Approved),
                owner: Some(alice),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(approved_alice.len(), 1);
        assert_eq!(approved_alice[0].name, "third");
    }

    #[tokio::test]
    async fn test_update_missing_item_returns_none() {
        let store = MemoryStore::new();
        let res = store
            .update_item_status(Uuid::new_v4(), ItemStatus::Approved, None)
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn test_role_grant_and_revoke() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        assert!(!store.has_role(user, Role::Admin).await.unwrap());
        assert!(store.grant_role(user, Role::Admin).await.unwrap());
        assert!(!store.grant_role(user, Role::Admin).await.unwrap());
        assert!(store.has_role(user, Role::Admin).await.unwrap());
        assert!(store.revoke_role(user, Role::Admin).await.unwrap());
        assert!(!store.revoke_role(user, Role::Admin).await.unwrap());
    }
}
