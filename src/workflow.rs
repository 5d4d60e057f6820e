//! Moderation workflow: who may submit, who sees what, who may decide.
//!
//! Items enter as `pending`. Only `approved` items are visible in the public
//! listing; owners see their own items in any state; administrators see and
//! decide on everything. Decisions can be flipped later and no history of
//! earlier decisions is kept.

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::errors::AppError;
use crate::metrics;
use crate::models::identity::Caller;
use crate::models::item::{
    matches_query, normalize_note, Category, Item, ItemDraft, ItemFilter, ItemKind, ItemStatus,
    NewItem, ReviewDecision,
};
use crate::store::image_store::ImageStore;
use crate::store::ItemStore;

/// Optional narrowing of the public listing.
#[derive(Debug, Clone, Default)]
pub struct PublicQuery {
    pub kind: Option<ItemKind>,
    pub category: Option<Category>,
    /// Case-insensitive text match over name and description.
    pub text: Option<String>,
}

/// Result of a review call. `changed` is false when the item already had
/// the requested status and note, in which case nothing was written.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub item: Item,
    pub changed: bool,
}

#[derive(Clone)]
pub struct ModerationService {
    items: Arc<dyn ItemStore>,
    images: ImageStore,
}

impl ModerationService {
    pub fn new(items: Arc<dyn ItemStore>, images: ImageStore) -> Self {
        Self { items, images }
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Create a `pending` record owned by the caller.
    pub async fn submit(&self, draft: ItemDraft, caller: &Caller) -> Result<Item, AppError> {
        let owner = caller.user_id.ok_or(AppError::Unauthenticated)?;
        let new = NewItem {
            user_id: owner,
            draft,
            status: ItemStatus::Pending,
        };
        let item = self.items.insert_item(&new).await?;

        metrics::record_submission(item.kind.as_str());
        tracing::info!(item_id = %item.id, owner = %owner, kind = ?item.kind, "item submitted");
        Ok(item)
    }

    /// Store an image for the caller and return its public URL.
    pub async fn upload_image(
        &self,
        file_name: &str,
        data: Bytes,
        caller: &Caller,
    ) -> Result<String, AppError> {
        let owner = caller.user_id.ok_or(AppError::Unauthenticated)?;
        match self.images.upload(owner, file_name, data).await {
            Ok(key) => {
                metrics::record_upload(true);
                Ok(self.images.public_url(&key))
            }
            Err(e) => {
                metrics::record_upload(false);
                Err(AppError::Storage(format!("{:#}", e)))
            }
        }
    }

    /// Upload, then submit with the resulting URL. The two steps are not
    /// atomic: if the insert fails the uploaded object stays behind.
    pub async fn submit_with_image(
        &self,
        mut draft: ItemDraft,
        file_name: &str,
        data: Bytes,
        caller: &Caller,
    ) -> Result<Item, AppError> {
        let url = self.upload_image(file_name, data, caller).await?;
        draft.image_url = Some(url.clone());
        self.submit(draft, caller).await.map_err(|e| {
            tracing::warn!(image_url = %url, "item insert failed after image upload, image orphaned");
            e
        })
    }

    /// Approved items only, newest first.
    pub async fn list_public(&self, query: &PublicQuery) -> Result<Vec<Item>, AppError> {
        let filter = ItemFilter {
            status: Some(ItemStatus::Approved),
            kind: query.kind,
            category: query.category,
            ..Default::default()
        };
        let mut items = self.items.list_items(&filter).await?;
        if let Some(text) = query.text.as_deref() {
            items.retain(|i| matches_query(i, text));
        }
        Ok(items)
    }

    /// Everything the caller submitted, any status, newest first.
    pub async fn list_own(&self, caller: &Caller) -> Result<Vec<Item>, AppError> {
        let owner = caller.user_id.ok_or(AppError::Unauthenticated)?;
        let filter = ItemFilter {
            owner: Some(owner),
            ..Default::default()
        };
        Ok(self.items.list_items(&filter).await?)
    }

    pub async fn list_pending(&self, caller: &Caller) -> Result<Vec<Item>, AppError> {
        require_admin(caller)?;
        let filter = ItemFilter {
            status: Some(ItemStatus::Pending),
            ..Default::default()
        };
        Ok(self.items.list_items(&filter).await?)
    }

    pub async fn list_all(&self, caller: &Caller) -> Result<Vec<Item>, AppError> {
        require_admin(caller)?;
        Ok(self.items.list_items(&ItemFilter::default()).await?)
    }

    /// Set an item's status and note. Repeating an identical decision is a
    /// no-op that returns the current record.
    pub async fn review(
        &self,
        item_id: Uuid,
        decision: ReviewDecision,
        note: Option<String>,
        caller: &Caller,
    ) -> Result<ReviewOutcome, AppError> {
        require_admin(caller)?;
        let note = normalize_note(note);
        let status = decision.status();

        let current = self.items.get_item(item_id).await?.ok_or(AppError::NotFound)?;
        if current.status == status && current.admin_notes == note {
            tracing::debug!(item_id = %item_id, status = status.as_str(), "review unchanged");
            return Ok(ReviewOutcome {
                item: current,
                changed: false,
            });
        }

        // Concurrent reviewers race here; the last write wins.
        let item = self
            .items
            .update_item_status(item_id, status, note.as_deref())
            .await?
            .ok_or(AppError::NotFound)?;

        metrics::record_review(decision.as_str());
        tracing::info!(
            item_id = %item_id,
            from = current.status.as_str(),
            to = status.as_str(),
            reviewer = ?caller.user_id,
            "item reviewed"
        );
        Ok(ReviewOutcome {
            item,
            changed: true,
        })
    }

    /// Single record regardless of status.
    pub async fn get_by_id(&self, item_id: Uuid) -> Result<Item, AppError> {
        self.items.get_item(item_id).await?.ok_or(AppError::NotFound)
    }
}

fn require_admin(caller: &Caller) -> Result<(), AppError> {
    if caller.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
