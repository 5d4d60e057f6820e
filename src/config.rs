use serde::Deserialize;

const PLACEHOLDER_SECRET: &str = "CHANGE_ME_SESSION_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// HMAC secret for session tokens.
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    /// Where uploaded item images go: `file://…`, `s3://bucket?…` or `memory://`.
    pub image_store_url: String,
    /// Prefix prepended to object paths to form public URLs.
    /// Set via IMAGE_PUBLIC_BASE_URL. Default: `/images` served by this process.
    pub image_public_base_url: String,
    pub max_image_bytes: usize,
    pub dashboard_origin: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let jwt_secret =
        std::env::var("LOSTFOUND_JWT_SECRET").unwrap_or_else(|_| PLACEHOLDER_SECRET.into());

    if jwt_secret == PLACEHOLDER_SECRET {
        let env_mode = std::env::var("LOSTFOUND_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "LOSTFOUND_JWT_SECRET is still the insecure placeholder. \
                 Set a proper secret before running in production."
            );
        }
        tracing::warn!("LOSTFOUND_JWT_SECRET is not set, using insecure placeholder");
    }

    Ok(Config {
        port: std::env::var("LOSTFOUND_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/lostfound".into()),
        jwt_secret,
        session_ttl_hours: std::env::var("LOSTFOUND_SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24),
        image_store_url: std::env::var("IMAGE_STORE_URL")
            .unwrap_or_else(|_| "file://./data/images".into()),
        image_public_base_url: std::env::var("IMAGE_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "/images".into()),
        max_image_bytes: std::env::var("LOSTFOUND_MAX_IMAGE_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5 * 1024 * 1024),
        dashboard_origin: std::env::var("DASHBOARD_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".into()),
    })
}
