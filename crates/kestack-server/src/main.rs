//! kestack server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, starts the relay consumer, and serves the JSON API over
//! HTTP.
//!
//! # Course import
//!
//! To seed the course table from a JSON array of courses:
//!
//! ```sh
//! cargo run -p kestack-server --bin kestack -- import-courses courses.json
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use kestack_core::{course::NewCourse, store::IdentityStore};
use kestack_resolve::{ChannelRelay, CourseService, MemoryCache, RelayConsumer, RetryingUpstream};
use kestack_server::{Service, ServerConfig, upstream::HttpUpstream};
use kestack_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "kestack course service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the API (the default).
  Serve,
  /// Upsert every course in a JSON file into the store and exit.
  ImportCourses {
    /// A JSON array of courses.
    file: PathBuf,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let db_path = home_relative(&cfg.store_path);
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("cannot open course store {}", db_path.display()))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::ImportCourses { file } => import_courses(&store, &file).await,
    Command::Serve => serve(store, cfg).await,
  }
}

async fn serve(store: SqliteStore, server_cfg: ServerConfig) -> anyhow::Result<()> {
  let store = Arc::new(store);

  // Relay: the read path publishes, the consumer persists.
  let (relay, events) = ChannelRelay::new(server_cfg.relay.capacity);
  RelayConsumer::new(events, Arc::clone(&store), server_cfg.relay.batch_size).spawn();

  let http = HttpUpstream::new(
    &server_cfg.upstream.base_url,
    Duration::from_secs(server_cfg.upstream.timeout_secs),
  )
  .context("failed to build upstream HTTP client")?;
  let upstream = RetryingUpstream::new(http, server_cfg.upstream.retries.saturating_add(1));

  let service: Arc<Service> = Arc::new(CourseService::new(
    Arc::new(upstream),
    store,
    Arc::new(relay),
    Arc::new(MemoryCache::new()),
    server_cfg.service_settings(),
  ));

  let policy = server_cfg.policy();
  tracing::info!(current = %policy.current, selecting = policy.selecting, "term policy loaded");

  let addr = (server_cfg.host.as_str(), server_cfg.port);
  let listener = TcpListener::bind(addr)
    .await
    .with_context(|| format!("cannot bind {}:{}", addr.0, addr.1))?;
  tracing::info!(addr = %listener.local_addr()?, "serving course API");

  axum::serve(listener, kestack_server::router(service))
    .await
    .context("HTTP server stopped")?;

  Ok(())
}

async fn import_courses(store: &SqliteStore, file: &Path) -> anyhow::Result<()> {
  let raw = tokio::fs::read(file)
    .await
    .with_context(|| format!("failed to read {file:?}"))?;
  let courses: Vec<NewCourse> =
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {file:?}"))?;

  store
    .batch_upsert(&courses)
    .await
    .context("failed to import courses")?;

  tracing::info!(count = courses.len(), "imported courses");
  Ok(())
}

/// `~/db.sqlite` resolves against `$HOME`; other paths pass through.
fn home_relative(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => Path::new(&home).join(rest),
    _ => path.to_path_buf(),
  }
}
