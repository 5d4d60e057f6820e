use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// A single lost/found report together with its moderation state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: Category,
    pub description: String,
    pub image_url: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: ItemKind,
    pub status: ItemStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum ItemKind {
    Lost,
    Found,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Lost => "lost",
            ItemKind::Found => "found",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "approved" => Ok(ItemStatus::Approved),
            "rejected" => Ok(ItemStatus::Rejected),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// The two outcomes an administrator can pick. `pending` is never a target.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    #[serde(alias = "approve")]
    Approved,
    #[serde(alias = "reject")]
    Rejected,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }

    pub fn status(&self) -> ItemStatus {
        match self {
            ReviewDecision::Approved => ItemStatus::Approved,
            ReviewDecision::Rejected => ItemStatus::Rejected,
        }
    }
}

/// Fixed set of item categories. The display name is also the stored value.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy, Hash)]
#[sqlx(type_name = "varchar")]
pub enum Category {
    #[serde(rename = "Electronics")]
    #[sqlx(rename = "Electronics")]
    Electronics,
    #[serde(rename = "Books & Notes")]
    #[sqlx(rename = "Books & Notes")]
    BooksAndNotes,
    #[serde(rename = "Clothing")]
    #[sqlx(rename = "Clothing")]
    Clothing,
    #[serde(rename = "ID & Cards")]
    #[sqlx(rename = "ID & Cards")]
    IdAndCards,
    #[serde(rename = "Keys")]
    #[sqlx(rename = "Keys")]
    Keys,
    #[serde(rename = "Bags & Wallets")]
    #[sqlx(rename = "Bags & Wallets")]
    BagsAndWallets,
    #[serde(rename = "Sports Equipment")]
    #[sqlx(rename = "Sports Equipment")]
    SportsEquipment,
    #[serde(rename = "Other")]
    #[sqlx(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Electronics,
        Category::BooksAndNotes,
        Category::Clothing,
        Category::IdAndCards,
        Category::Keys,
        Category::BagsAndWallets,
        Category::SportsEquipment,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "Electronics",
            Category::BooksAndNotes => "Books & Notes",
            Category::Clothing => "Clothing",
            Category::IdAndCards => "ID & Cards",
            Category::Keys => "Keys",
            Category::BagsAndWallets => "Bags & Wallets",
            Category::SportsEquipment => "Sports Equipment",
            Category::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Category::ALL.iter().copied().find(|c| c.as_str() == s.trim())
    }
}

/// Unvalidated submission as it arrives from a client.
///
/// `category` stays a raw string here so an unknown value can be reported
/// as a field-level validation error instead of a generic body rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemDraftRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<ItemKind>,
}

impl ItemDraftRequest {
    /// Check required fields and resolve the category.
    pub fn validate(self) -> Result<ItemDraft, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name", "name is required"));
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(AppError::validation("description", "description is required"));
        }
        let kind = self
            .kind
            .ok_or_else(|| AppError::validation("type", "type must be 'lost' or 'found'"))?;
        let category = match self.category.as_deref() {
            None => return Err(AppError::validation("category", "category is required")),
            Some(raw) if raw.trim().is_empty() => {
                return Err(AppError::validation("category", "category is required"))
            }
            Some(raw) => Category::parse(raw).ok_or_else(|| {
                AppError::validation("category", format!("unknown category '{}'", raw))
            })?,
        };

        Ok(ItemDraft {
            name: name.to_string(),
            category,
            description: description.to_string(),
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
            kind,
        })
    }
}

/// A submission that passed validation.
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub name: String,
    pub category: Category,
    pub description: String,
    pub image_url: Option<String>,
    pub kind: ItemKind,
}

/// Row to insert. Status is always `pending` for user submissions; the demo
/// seeder is the only writer that starts elsewhere.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub user_id: Uuid,
    pub draft: ItemDraft,
    pub status: ItemStatus,
}

/// Equality filters understood by every item store. `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub owner: Option<Uuid>,
    pub kind: Option<ItemKind>,
    pub category: Option<Category>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        self.status.map_or(true, |s| item.status == s)
            && self.owner.map_or(true, |o| item.user_id == o)
            && self.kind.map_or(true, |k| item.kind == k)
            && self.category.map_or(true, |c| item.category == c)
    }
}

/// Case-insensitive substring match over name and description.
pub fn matches_query(item: &Item, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    item.name.to_lowercase().contains(&q) || item.description.to_lowercase().contains(&q)
}

/// Blank notes are stored as absent.
pub fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
