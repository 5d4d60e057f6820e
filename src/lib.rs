//! Campus Lost & Found — moderated listing service.
//!
//! Library crate shared by the `lostfound` and `seed_demo` binaries and the
//! integration tests in `tests/`.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod errors;
pub mod identity;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod store;
pub mod workflow;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub workflow: workflow::ModerationService,
    pub identity: Arc<dyn identity::IdentityProvider>,
    pub config: config::Config,
}
