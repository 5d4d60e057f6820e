use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use lostfound::config;
use lostfound::identity::jwt::{JwtIdentity, TokenSigner};
use lostfound::identity::IdentityProvider;
use lostfound::models::identity::{Caller, Role};
use lostfound::models::item::{ItemFilter, ItemStatus, ReviewDecision};
use lostfound::store::image_store::ImageStore;
use lostfound::store::postgres::PgStore;
use lostfound::store::RoleStore;
use lostfound::workflow::ModerationService;
use lostfound::{api, jobs, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OTLP export only when an endpoint is configured; plain fmt logging otherwise.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "lostfound"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lostfound=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Item { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let images = ImageStore::from_url(&cfg.image_store_url, &cfg.image_public_base_url)?;
            let workflow = ModerationService::new(Arc::new(db), images);
            handle_item_command(&workflow, command).await
        }
        Some(cli::Commands::Role { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_role_command(&db, command).await
        }
        Some(cli::Commands::Token { command }) => {
            let signer = TokenSigner::new(&cfg.jwt_secret);
            handle_token_command(&signer, &cfg, command)
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    tracing::info!("Initializing image store...");
    let images = ImageStore::from_url(&cfg.image_store_url, &cfg.image_public_base_url)?;

    let identity: Arc<dyn IdentityProvider> =
        Arc::new(JwtIdentity::new(&cfg.jwt_secret, Arc::new(db.clone())));
    jobs::session_events::spawn(identity.subscribe());

    let state = Arc::new(AppState {
        workflow: ModerationService::new(Arc::new(db), images),
        identity,
        config: cfg,
    });

    let app = api::build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Lost & Found listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_item_command(
    workflow: &ModerationService,
    cmd: cli::ItemCommands,
) -> anyhow::Result<()> {
    let operator = Caller::operator();
    match cmd {
        cli::ItemCommands::List { status } => {
            let status = status
                .map(|s| s.parse::<ItemStatus>().map_err(anyhow::Error::msg))
                .transpose()?;
            let filter = ItemFilter {
                status,
                ..Default::default()
            };
            let items: Vec<_> = workflow
                .list_all(&operator)
                .await?
                .into_iter()
                .filter(|i| filter.matches(i))
                .collect();
            if items.is_empty() {
                println!("No items found.");
                return Ok(());
            }
            println!(
                "{:<38} {:<28} {:<18} {:<6} {:<9} CREATED",
                "ID", "NAME", "CATEGORY", "TYPE", "STATUS"
            );
            for i in items {
                let name = if i.name.chars().count() > 28 {
                    format!("{}...", i.name.chars().take(25).collect::<String>())
                } else {
                    i.name.clone()
                };
                println!(
                    "{:<38} {:<28} {:<18} {:<6} {:<9} {}",
                    i.id,
                    name,
                    i.category.as_str(),
                    i.kind.as_str(),
                    i.status.as_str(),
                    i.created_at.format("%Y-%m-%d")
                );
            }
        }
        cli::ItemCommands::Approve { item_id, note } => {
            review(workflow, &item_id, ReviewDecision::Approved, note).await?;
        }
        cli::ItemCommands::Reject { item_id, note } => {
            review(workflow, &item_id, ReviewDecision::Rejected, note).await?;
        }
    }
    Ok(())
}

async fn review(
    workflow: &ModerationService,
    item_id: &str,
    decision: ReviewDecision,
    note: Option<String>,
) -> anyhow::Result<()> {
    let id = Uuid::parse_str(item_id).context("Invalid item ID")?;
    let outcome = workflow
        .review(id, decision, note, &Caller::operator())
        .await
        .map_err(|e| anyhow::anyhow!("review failed: {}", e))?;
    if outcome.changed {
        println!("Item {} {}.", id, decision.as_str());
    } else {
        println!("Item {} was already {}.", id, decision.as_str());
    }
    Ok(())
}

async fn handle_role_command(db: &PgStore, cmd: cli::RoleCommands) -> anyhow::Result<()> {
    match cmd {
        cli::RoleCommands::Grant { user_id } => {
            let id = Uuid::parse_str(&user_id).context("Invalid user ID")?;
            if db.grant_role(id, Role::Admin).await? {
                println!("Granted admin to {}.", id);
            } else {
                println!("{} is already an admin.", id);
            }
        }
        cli::RoleCommands::Revoke { user_id } => {
            let id = Uuid::parse_str(&user_id).context("Invalid user ID")?;
            if db.revoke_role(id, Role::Admin).await? {
                println!("Revoked admin from {}.", id);
            } else {
                println!("{} was not an admin.", id);
            }
        }
    }
    Ok(())
}

fn handle_token_command(
    signer: &TokenSigner,
    cfg: &config::Config,
    cmd: cli::TokenCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Issue { user_id, ttl_hours } => {
            let id = Uuid::parse_str(&user_id).context("Invalid user ID")?;
            let ttl = chrono::Duration::hours(ttl_hours.unwrap_or(cfg.session_ttl_hours));
            let (token, expires_at) = signer.issue(id, ttl)?;
            println!(
                "Session token issued:\n  User:    {}\n  Expires: {}\n  Use:     Authorization: Bearer {}",
                id, expires_at, token
            );
        }
    }
    Ok(())
}
