//! strings-daemon entry point.
//!
//! This file is intentionally thin: it loads config, sets up tracing, picks
//! a repository, wires middleware, and starts the HTTP server. All route
//! handlers live in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use strings_config::{
    load_layered_yaml, report_unused_keys, LoadedConfig, ServiceConfig, UnusedKeyPolicy,
};
use strings_daemon::{routes, state};
use strings_db::PgRepository;
use strings_engine::{MemoryRepository, Repository};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Comma-separated YAML layers, base first.
const ENV_CONFIG_PATHS: &str = "STRINGS_CONFIG_PATHS";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let loaded = load_config()?;
    let cfg = match &loaded {
        Some(l) => ServiceConfig::from_json(&l.config_json)?,
        None => ServiceConfig::default(),
    }
    .with_env_overrides();

    init_tracing(&cfg.log_filter);

    if let Some(l) = &loaded {
        info!(config_hash = %l.config_hash, "config loaded");
        let report = report_unused_keys(&l.config_json, UnusedKeyPolicy::Warn)?;
        for ptr in &report.unused_leaf_pointers {
            warn!(pointer = %ptr, "unused config key");
        }
    }

    let addr: SocketAddr = cfg
        .daemon_addr
        .parse()
        .with_context(|| format!("invalid daemon addr: {}", cfg.daemon_addr))?;
    let config_hash = loaded.map(|l| l.config_hash);

    if let Ok(url) = std::env::var(strings_db::ENV_DB_URL) {
        let pool = strings_db::connect(&url, cfg.db_max_connections).await?;
        if cfg.db_run_migrations {
            strings_db::migrate(&pool).await?;
            info!("migrations applied");
        }
        serve(PgRepository::new(pool), addr, config_hash).await
    } else {
        warn!(
            "{} not set; using in-memory repository (data is lost on exit)",
            strings_db::ENV_DB_URL
        );
        serve(MemoryRepository::new(), addr, config_hash).await
    }
}

async fn serve<R: Repository>(
    repo: R,
    addr: SocketAddr,
    config_hash: Option<String>,
) -> anyhow::Result<()> {
    let mut app_state = state::AppState::new(repo);
    if let Some(hash) = config_hash {
        app_state = app_state.with_config_hash(hash);
    }
    let shared = Arc::new(app_state);

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_change_forwarder(Arc::clone(&shared));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    info!("strings-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn load_config() -> anyhow::Result<Option<LoadedConfig>> {
    let Ok(raw) = std::env::var(ENV_CONFIG_PATHS) else {
        return Ok(None);
    };
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paths.is_empty() {
        return Ok(None);
    }
    Ok(Some(load_layered_yaml(&paths)?))
}

/// RUST_LOG wins over the configured filter.
fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
