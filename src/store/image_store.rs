//! ImageStore — object storage for item photos.
//!
//! Objects are written under `{owner_id}/{upload_millis}.{extension}` and
//! exposed through a public base URL.
//!
//! ## Configuration
//!
//! Set the `IMAGE_STORE_URL` environment variable:
//!
//! ```text
//! # S3
//! IMAGE_STORE_URL=s3://item-images?region=us-east-1
//!
//! # MinIO (self-hosted S3-compatible)
//! IMAGE_STORE_URL=s3://item-images?endpoint=http://minio:9000&region=us-east-1
//!
//! # Local filesystem (default: file://./data/images)
//! IMAGE_STORE_URL=file:///var/lib/lostfound/images
//!
//! # Process memory, lost on restart
//! IMAGE_STORE_URL=memory://
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use object_store::{path::Path, ObjectStore, PutMode, PutPayload};
use uuid::Uuid;

const MAX_KEY_ATTEMPTS: usize = 16;

#[derive(Clone)]
pub struct ImageStore {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl ImageStore {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: &str) -> Self {
        Self {
            store,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build an `ImageStore` from a store URL (see module docs).
    pub fn from_url(url: &str, public_base_url: &str) -> Result<Self> {
        let store = build_object_store(url)?;
        tracing::info!(url = %url, public_base_url = %public_base_url, "ImageStore: initialised");
        Ok(Self::new(Arc::from(store), public_base_url))
    }

    /// In-memory backend.
    pub fn in_memory(public_base_url: &str) -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), public_base_url)
    }

    /// Write an image and return its object path.
    pub async fn upload(&self, owner: Uuid, file_name: &str, data: Bytes) -> Result<String> {
        self.upload_at(owner, file_name, data, Utc::now()).await
    }

    /// Existing objects are never replaced: a taken key moves on to the
    /// next millisecond.
    async fn upload_at(
        &self,
        owner: Uuid,
        file_name: &str,
        data: Bytes,
        at: DateTime<Utc>,
    ) -> Result<String> {
        let payload = PutPayload::from(data);
        let mut at = at;
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = object_key(owner, file_name, at);
            match self
                .store
                .put_opts(&Path::from(key.as_str()), payload.clone(), PutMode::Create.into())
                .await
            {
                Ok(_) => {
                    tracing::debug!(key = %key, "image stored");
                    return Ok(key);
                }
                Err(object_store::Error::AlreadyExists { .. }) => {
                    tracing::debug!(key = %key, "image key taken, trying next millisecond");
                    at += Duration::milliseconds(1);
                }
                Err(e) => return Err(e).context("failed to put image to object store"),
            }
        }
        anyhow::bail!(
            "no free image key for owner {} after {} attempts",
            owner,
            MAX_KEY_ATTEMPTS
        )
    }

    /// Durable URL for an object path returned by `upload`.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Read an image back. `None` if the object does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = Path::parse(key).context("invalid image path")?;
        match self.store.get(&path).await {
            Ok(res) => Ok(Some(res.bytes().await.context("failed to read image bytes")?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e).context("failed to get image from object store"),
        }
    }
}

/// `{owner}/{millis}.{ext}`. The extension is whatever follows the last dot
/// of the original file name; a name without a dot is used whole.
pub fn object_key(owner: Uuid, file_name: &str, at: DateTime<Utc>) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let ext = base.rsplit('.').next().unwrap_or(base);
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };
    format!("{}/{}.{}", owner, at.timestamp_millis(), ext)
}

/// Content type guessed from the object extension.
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next().unwrap_or_default() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Parse an `IMAGE_STORE_URL` into an `ObjectStore` implementation.
fn build_object_store(url: &str) -> Result<Box<dyn ObjectStore>> {
    if url.starts_with("memory://") {
        return Ok(Box::new(object_store::memory::InMemory::new()));
    }

    if url.starts_with("file://") {
        let path = url.trim_start_matches("file://");
        std::fs::create_dir_all(path)
            .with_context(|| format!("failed to create image directory {}", path))?;
        let store = object_store::local::LocalFileSystem::new_with_prefix(path)
            .context("failed to create local file system object store")?;
        return Ok(Box::new(store));
    }

    if url.starts_with("s3://") {
        let without_scheme = url.trim_start_matches("s3://");
        let bucket = without_scheme.split('?').next().unwrap_or(without_scheme);

        // Custom endpoint for MinIO
        let endpoint = parse_query_param(url, "endpoint");
        let region = parse_query_param(url, "region").unwrap_or_else(|| "us-east-1".to_string());

        // Conditional writes let uploads refuse to replace an existing key.
        let mut builder = object_store::aws::AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&region)
            .with_conditional_put(object_store::aws::S3ConditionalPut::ETagMatch);

        if let Some(ep) = endpoint {
            builder = builder.with_endpoint(&ep).with_allow_http(true);
        }

        if let Ok(key) = std::env::var("AWS_ACCESS_KEY_ID") {
            if let Ok(secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
                builder = builder.with_access_key_id(key).with_secret_access_key(secret);
            }
        }

        let store = builder.build().context("failed to build S3 object store")?;
        return Ok(Box::new(store));
    }

    anyhow::bail!("unsupported IMAGE_STORE_URL scheme: {}", url)
}

fn parse_query_param(url: &str, key: &str) -> Option<String> {
    let query = url.split('?').nth(1)?;
    for part in query.split('&') {
        let mut kv = part.splitn(2, '=');
        if kv.next() == Some(key) {
            return kv.next().map(|v| urlencoding::decode(v).unwrap_or_default().into_owned());
        }
    }
    None
}
