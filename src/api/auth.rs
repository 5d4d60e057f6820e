use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;
use crate::models::identity::{Caller, Role, Session};
use crate::AppState;

/// Session behind the current request, if any. Inserted next to `Caller`.
#[derive(Clone, Debug, Default)]
pub struct CurrentSession(pub Option<Session>);

/// Middleware: resolves `Authorization: Bearer <token>` into a `Caller`.
///
/// No header means an anonymous caller. A token that does not resolve to a
/// live session is rejected with 401 instead of silently downgrading.
pub async fn resolve_caller(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let (caller, session) = match token {
        None => (Caller::anonymous(), None),
        Some(token) => match lookup(&state, &token).await {
            Ok(resolved) => resolved,
            Err(e) => return e.into_response(),
        },
    };

    req.extensions_mut().insert(caller);
    req.extensions_mut().insert(CurrentSession(session));
    next.run(req).await
}

async fn lookup(state: &AppState, token: &str) -> Result<(Caller, Option<Session>), AppError> {
    let session = state
        .identity
        .get_session(token)
        .await?
        .ok_or(AppError::InvalidSession)?;

    let is_admin = state.identity.has_role(session.user_id, Role::Admin).await?;
    let caller = Caller {
        user_id: Some(session.user_id),
        is_admin,
    };
    Ok((caller, Some(session)))
}
