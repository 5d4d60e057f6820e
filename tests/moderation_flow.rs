//! End-to-end tests for the HTTP surface.
//!
//! Drives the full router (caller resolution, validation, workflow, error
//! mapping) against the in-memory item/role store and an in-memory image
//! store. No database or network required.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use lostfound::config::Config;
use lostfound::identity::jwt::JwtIdentity;
use lostfound::identity::IdentityProvider;
use lostfound::models::identity::{Role, SessionEvent};
use lostfound::store::image_store::ImageStore;
use lostfound::store::memory::MemoryStore;
use lostfound::store::RoleStore;
use lostfound::workflow::ModerationService;
use lostfound::{api, AppState};

struct Harness {
    app: Router,
    identity: Arc<JwtIdentity>,
    roles: MemoryStore,
}

impl Harness {
    fn new() -> Self {
        let store = MemoryStore::new();
        let identity = Arc::new(JwtIdentity::new("integration-secret", Arc::new(store.clone())));
        let config = Config {
            port: 0,
            database_url: String::new(),
            jwt_secret: "integration-secret".into(),
            session_ttl_hours: 1,
            image_store_url: "memory://".into(),
            image_public_base_url: "/images".into(),
            max_image_bytes: 1024,
            dashboard_origin: "http://localhost:3000".into(),
        };
        let state = Arc::new(AppState {
            workflow: ModerationService::new(
                Arc::new(store.clone()),
                ImageStore::in_memory(&config.image_public_base_url),
            ),
            identity: identity.clone(),
            config,
        });
        Self {
            app: api::build_app(state),
            identity,
            roles: store,
        }
    }

    fn login(&self, user: Uuid) -> String {
        self.identity.issue_token(user, Duration::hours(1)).unwrap().0
    }

    async fn login_admin(&self) -> String {
        let admin = Uuid::new_v4();
        self.roles.grant_role(admin, Role::Admin).await.unwrap();
        self.login(admin)
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {}", t));
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {}", t));
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }
}

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect()
}

fn phone_report() -> Value {
    json!({
        "name": "Blue iPhone 14",
        "category": "Electronics",
        "description": "Found near library",
        "type": "found"
    })
}

#[tokio::test]
async fn test_submit_approve_publish_scenario() {
    let h = Harness::new();
    let alice = Uuid::new_v4();
    let alice_token = h.login(alice);
    let admin_token = h.login_admin().await;

    let (status, item) = h.post("/api/v1/items", Some(&alice_token), phone_report()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["status"], "pending");
    assert_eq!(item["type"], "found");
    assert_eq!(item["user_id"], alice.to_string());
    let id = item["id"].as_str().unwrap().to_string();

    let (_, mine) = h.get("/api/v1/items/mine", Some(&alice_token)).await;
    assert_eq!(ids(&mine), vec![id.clone()]);
    assert_eq!(mine[0]["status"], "pending");

    let (_, public) = h.get("/api/v1/items", None).await;
    assert!(!ids(&public).contains(&id));

    let (_, pending) = h.get("/api/v1/admin/items/pending", Some(&admin_token)).await;
    assert_eq!(ids(&pending), vec![id.clone()]);

    let (status, review) = h
        .post(
            &format!("/api/v1/admin/items/{}/review", id),
            Some(&admin_token),
            json!({ "decision": "approved" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["updated"], true);
    assert_eq!(review["item"]["status"], "approved");

    let (_, public) = h.get("/api/v1/items", None).await;
    assert_eq!(ids(&public), vec![id.clone()]);

    let (_, mine) = h.get("/api/v1/items/mine", Some(&alice_token)).await;
    assert_eq!(mine[0]["status"], "approved");

    let (_, pending) = h.get("/api/v1/admin/items/pending", Some(&admin_token)).await;
    assert!(ids(&pending).is_empty());
}

#[tokio::test]
async fn test_rejected_items_leave_public_listing() {
    let h = Harness::new();
    let user_token = h.login(Uuid::new_v4());
    let admin_token = h.login_admin().await;

    let (_, item) = h.post("/api/v1/items", Some(&user_token), phone_report()).await;
    let id = item["id"].as_str().unwrap().to_string();
    let review_uri = format!("/api/v1/admin/items/{}/review", id);

    h.post(&review_uri, Some(&admin_token), json!({ "decision": "approve" })).await;
    let (_, public) = h.get("/api/v1/items", None).await;
    assert!(ids(&public).contains(&id));

    let (status, review) = h
        .post(
            &review_uri,
            Some(&admin_token),
            json!({ "decision": "rejected", "note": "Owner already collected it" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["item"]["admin_notes"], "Owner already collected it");

    let (_, public) = h.get("/api/v1/items", None).await;
    assert!(!ids(&public).contains(&id));

    // Still reachable by id regardless of status.
    let (status, fetched) = h.get(&format!("/api/v1/items/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "rejected");
}

#[tokio::test]
async fn test_repeated_approval_is_a_no_op() {
    let h = Harness::new();
    let user_token = h.login(Uuid::new_v4());
    let admin_token = h.login_admin().await;
    let (_, item) = h.post("/api/v1/items", Some(&user_token), phone_report()).await;
    let review_uri = format!("/api/v1/admin/items/{}/review", item["id"].as_str().unwrap());

    let (s1, first) = h.post(&review_uri, Some(&admin_token), json!({ "decision": "approved" })).await;
    let (s2, second) = h.post(&review_uri, Some(&admin_token), json!({ "decision": "approved" })).await;
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(first["updated"], true);
    assert_eq!(second["updated"], false);
    assert_eq!(second["item"]["status"], "approved");
    assert_eq!(second["item"]["updated_at"], first["item"]["updated_at"]);

    let (_, public) = h.get("/api/v1/items", None).await;
    assert_eq!(public.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_endpoints_refuse_non_admins() {
    let h = Harness::new();
    let user_token = h.login(Uuid::new_v4());
    let (_, item) = h.post("/api/v1/items", Some(&user_token), phone_report()).await;
    let review_uri = format!("/api/v1/admin/items/{}/review", item["id"].as_str().unwrap());

    for token in [Some(user_token.as_str()), None] {
        let (status, body) = h.get("/api/v1/admin/items", token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "admin_required");

        let (status, _) = h.get("/api/v1/admin/items/pending", token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = h.post(&review_uri, token, json!({ "decision": "approved" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (_, fetched) = h.get(&format!("/api/v1/items/{}", item["id"].as_str().unwrap()), None).await;
    assert_eq!(fetched["status"], "pending");
}

#[tokio::test]
async fn test_own_listing_is_scoped_to_caller() {
    let h = Harness::new();
    let alice_token = h.login(Uuid::new_v4());
    let bob_token = h.login(Uuid::new_v4());

    let (_, a) = h.post("/api/v1/items", Some(&alice_token), phone_report()).await;
    let (_, b) = h
        .post(
            "/api/v1/items",
            Some(&bob_token),
            json!({ "name": "Red scarf", "category": "Clothing", "description": "Lost in lecture hall", "type": "lost" }),
        )
        .await;

    let (_, alice_items) = h.get("/api/v1/items/mine", Some(&alice_token)).await;
    let (_, bob_items) = h.get("/api/v1/items/mine", Some(&bob_token)).await;
    assert_eq!(ids(&alice_items), vec![a["id"].as_str().unwrap().to_string()]);
    assert_eq!(ids(&bob_items), vec![b["id"].as_str().unwrap().to_string()]);

    let (status, _) = h.get("/api/v1/items/mine", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_submission_requires_login_and_valid_fields() {
    let h = Harness::new();
    let token = h.login(Uuid::new_v4());
    let admin_token = h.login_admin().await;

    let (status, _) = h.post("/api/v1/items", None, phone_report()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cases = [
        (json!({ "name": "  ", "category": "Keys", "description": "x", "type": "lost" }), "name"),
        (json!({ "name": "Keys", "category": "Keys", "description": "", "type": "lost" }), "description"),
        (json!({ "name": "Keys", "description": "x", "type": "lost" }), "category"),
        (json!({ "name": "Keys", "category": "Furniture", "description": "x", "type": "lost" }), "category"),
        (json!({ "name": "Keys", "category": "Keys", "description": "x" }), "type"),
        (json!({ "name": "Keys", "category": "Keys", "description": "x", "type": "misplaced" }), "body"),
    ];
    for (body, field) in cases {
        let (status, err) = h.post("/api/v1/items", Some(&token), body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "field {}", field);
        assert_eq!(err["error"]["field"], field);
    }

    let (_, all) = h.get("/api/v1/admin/items", Some(&admin_token)).await;
    assert!(all.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_and_signed_out_tokens_are_rejected() {
    let h = Harness::new();
    let user = Uuid::new_v4();
    let token = h.login(user);

    let (status, body) = h.get("/api/v1/session", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_session");

    let mut events = h.identity.subscribe();
    let (status, session) = h.get("/api/v1/session", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user_id"], user.to_string());
    assert_eq!(session["is_admin"], false);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::SignedIn { user_id: user });

    let (status, _) = h.post("/api/v1/session/sign-out", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = h.get("/api/v1/items/mine", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Anonymous callers get an empty session rather than an error.
    let (status, session) = h.get("/api/v1/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(session["user_id"].is_null());

    let (status, _) = h.post("/api/v1/session/sign-out", None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_review_of_unknown_or_malformed_id() {
    let h = Harness::new();
    let admin_token = h.login_admin().await;

    let (status, _) = h
        .post(
            &format!("/api/v1/admin/items/{}/review", Uuid::new_v4()),
            Some(&admin_token),
            json!({ "decision": "approved" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = h
        .post("/api/v1/admin/items/not-a-uuid/review", Some(&admin_token), json!({ "decision": "approved" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["field"], "id");

    let (status, _) = h.get(&format!("/api/v1/items/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_listing_filters() {
    let h = Harness::new();
    let token = h.login(Uuid::new_v4());
    let admin_token = h.login_admin().await;

    let reports = [
        phone_report(),
        json!({ "name": "Car Keys", "category": "Keys", "description": "Red keychain", "type": "lost" }),
        json!({ "name": "House Keys", "category": "Keys", "description": "Three keys on a ring", "type": "found" }),
    ];
    for report in reports {
        let (_, item) = h.post("/api/v1/items", Some(&token), report).await;
        h.post(
            &format!("/api/v1/admin/items/{}/review", item["id"].as_str().unwrap()),
            Some(&admin_token),
            json!({ "decision": "approved" }),
        )
        .await;
    }

    let (_, found_keys) = h.get("/api/v1/items?type=found&category=Keys", None).await;
    let names: Vec<_> = found_keys.as_array().unwrap().iter().map(|i| i["name"].clone()).collect();
    assert_eq!(names, vec![json!("House Keys")]);

    let (_, by_text) = h.get("/api/v1/items?q=keychain", None).await;
    assert_eq!(by_text.as_array().unwrap().len(), 1);
    assert_eq!(by_text[0]["name"], "Car Keys");

    let (_, all) = h.get("/api/v1/items?category=all", None).await;
    assert_eq!(all.as_array().unwrap().len(), 3);
    assert_eq!(all[0]["name"], "House Keys");

    let (status, _) = h.get("/api/v1/items?category=Furniture", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_image_upload_and_download() {
    let h = Harness::new();
    let user = Uuid::new_v4();
    let token = h.login(user);

    let upload = |token: Option<String>, uri: &str, body: &'static [u8]| {
        let mut req = Request::builder().method("POST").uri(uri);
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {}", t));
        }
        req.body(Body::from(body)).unwrap()
    };

    let (status, body) = h
        .send(upload(Some(token.clone()), "/api/v1/images?file_name=wallet.PNG", b"png-bytes"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!("/images/{}/", user)));
    assert!(url.ends_with(".png"));

    let resp = h
        .app
        .clone()
        .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "image/png");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"png-bytes");

    let (status, _) = h.send(upload(None, "/api/v1/images?file_name=a.png", b"x")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = h.send(upload(Some(token.clone()), "/api/v1/images", b"x")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["field"], "file_name");

    let too_big: &'static [u8] = &[0u8; 2048];
    let (status, body) = h.send(upload(Some(token), "/api/v1/images?file_name=big.jpg", too_big)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["field"], "file");

    let (status, _) = h.get(&format!("/images/{}/0.png", user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The uploaded URL can be attached to a report.
    let token = h.login(user);
    let mut report = phone_report();
    report["image_url"] = json!(url.clone());
    let (status, item) = h.post("/api/v1/items", Some(&token), report).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["image_url"], url);
}

#[tokio::test]
async fn test_service_endpoints() {
    let h = Harness::new();

    let (status, categories) = h.get("/api/v1/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories.as_array().unwrap().len(), 8);
    assert_eq!(categories[1], "Books & Notes");

    let resp = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-request-id"], "req-123");
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");

    let token = h.login(Uuid::new_v4());
    h.post("/api/v1/items", Some(&token), phone_report()).await;
    let resp = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("lostfound_items_submitted_total"));

    let (status, _) = h.get("/api/v1/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
