//! Lantern game server.
//!
//! A custom server for legacy LittleBigPlanet-family clients. The
//! protocol-sensitive core is request/response integrity stamping: every
//! game request carries a digest computed with one of a small rotating set
//! of shared secrets, and every game response is signed with the secret the
//! client used (or a deterministic fallback) plus a verbatim echo of the
//! request digest. Clients across hardware platforms compute digests
//! slightly differently, so the server detects the platform profile per
//! request before matching.

mod config;
mod digest;
mod endpoints;
mod records;
mod state;

use std::time::Duration;

use clap::Parser;

use config::{GameConfig, DEFAULT_DIGEST_KEY};
use digest::AlgorithmFamily;
use state::AppState;

// ── CLI Arguments ─────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "lantern",
    version,
    about = "Game server for legacy LittleBigPlanet-compatible clients"
)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 10061, env = "GAME_PORT")]
    port: u16,

    /// Shared secrets for the plain (SHA-1) digest family, highest matching
    /// priority first; the first is the fallback key
    #[arg(
        long,
        default_value = DEFAULT_DIGEST_KEY,
        env = "SHA1_DIGEST_KEYS",
        value_delimiter = ','
    )]
    sha1_digest_keys: Vec<String>,

    /// Shared secrets for the keyed (HMAC-SHA1) digest family
    #[arg(
        long,
        default_value = DEFAULT_DIGEST_KEY,
        env = "HMAC_DIGEST_KEYS",
        value_delimiter = ','
    )]
    hmac_digest_keys: Vec<String>,

    /// Constant salt mixed into every digest
    #[arg(long, default_value = "", env = "DIGEST_SALT")]
    digest_salt: String,

    /// Maximum level uploads per user per rolling day
    #[arg(long, default_value_t = 20, env = "MAX_DAILY_LEVEL_UPLOADS")]
    max_daily_level_uploads: usize,

    /// Cleanup interval in seconds
    #[arg(long, default_value_t = 300, env = "CLEANUP_INTERVAL_SECS")]
    cleanup_interval_secs: u64,
}

// ── Entry Point ───────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lantern=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = GameConfig {
        port: args.port,
        sha1_digest_keys: args.sha1_digest_keys,
        hmac_digest_keys: args.hmac_digest_keys,
        digest_salt: args.digest_salt,
        max_daily_level_uploads: args.max_daily_level_uploads,
    };

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!(error = %error, "Refusing to start with an invalid digest key configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        sha1_keys = state.digest_keys.key_count(AlgorithmFamily::Plain),
        hmac_keys = state.digest_keys.key_count(AlgorithmFamily::Keyed),
        "Digest keys loaded"
    );

    // Spawn periodic cleanup of expired upload counters
    let cleanup_state = state.clone();
    let cleanup_interval = args.cleanup_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval));
        loop {
            interval.tick().await;
            cleanup_state.daily_uploads.cleanup_expired();
        }
    });

    let app = endpoints::build_router(state.clone());

    let addr = format!("0.0.0.0:{}", state.config.port);
    tracing::info!("Lantern game server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server error");
}
