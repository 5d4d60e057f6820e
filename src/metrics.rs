//! Prometheus counters for the moderation workflow.
//!
//! Registered once in the default registry and exposed on `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{opts, register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

static ITEMS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("lostfound_items_submitted_total", "Items submitted for moderation"),
        &["kind"]
    )
    .expect("failed to register lostfound_items_submitted_total")
});

static ITEMS_REVIEWED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("lostfound_items_reviewed_total", "Review decisions that changed an item"),
        &["decision"]
    )
    .expect("failed to register lostfound_items_reviewed_total")
});

static IMAGE_UPLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("lostfound_image_uploads_total", "Image uploads by outcome"),
        &["outcome"]
    )
    .expect("failed to register lostfound_image_uploads_total")
});

pub fn record_submission(kind: &str) {
    ITEMS_SUBMITTED.with_label_values(&[kind]).inc();
}

pub fn record_review(decision: &str) {
    ITEMS_REVIEWED.with_label_values(&[decision]).inc();
}

pub fn record_upload(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    IMAGE_UPLOADS.with_label_values(&[outcome]).inc();
}

/// Render all registered metrics in the Prometheus text format.
pub fn render() -> String {
    // Make sure the families exist even before the first event.
    Lazy::force(&ITEMS_SUBMITTED);
    Lazy::force(&ITEMS_REVIEWED);
    Lazy::force(&IMAGE_UPLOADS);

    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buf) {
        tracing::error!("failed to encode metrics: {}", e);
    }
    String::from_utf8(buf).unwrap_or_default()
}
