//! Server wiring for kestack: configuration, the HTTP upstream adapter, and
//! the top-level router.

pub mod upstream;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;

use axum::{Router, routing::get};
use kestack_core::term::{TermPolicy, TermRef, Ttl};
use kestack_resolve::{
  ChannelRelay, CourseOperations, CourseService, MemoryCache, RetryingUpstream, ServiceSettings,
};
use kestack_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use upstream::HttpUpstream;

/// The concrete service the binary runs.
pub type Service = CourseService<RetryingUpstream<HttpUpstream>, SqliteStore, ChannelRelay, MemoryCache>;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub current:    CurrentTermConfig,
  pub upstream:   UpstreamConfig,
  #[serde(default)]
  pub cache:      CacheConfig,
  #[serde(default)]
  pub relay:      RelayConfig,
}

/// The operational calendar.
#[derive(Deserialize, Clone)]
pub struct CurrentTermConfig {
  pub year:            String,
  pub term:            String,
  /// Whether students are still adding and dropping courses.
  #[serde(default)]
  pub selecting:       bool,
  /// How long a stored subscription is served without asking the upstream.
  /// Negative values never expire.
  #[serde(default = "default_course_ttl_days")]
  pub course_ttl_days: i64,
}

#[derive(Deserialize, Clone)]
pub struct UpstreamConfig {
  pub base_url:     String,
  #[serde(default = "default_upstream_timeout_secs")]
  pub timeout_secs: u64,
  /// Extra attempts after the first failure.
  #[serde(default = "default_upstream_retries")]
  pub retries:      u32,
}

#[derive(Deserialize, Clone)]
pub struct CacheConfig {
  #[serde(default = "default_first_page_ttl_secs")]
  pub first_page_ttl_secs: u64,
  #[serde(default = "default_detail_ttl_secs")]
  pub detail_ttl_secs:     u64,
}

#[derive(Deserialize, Clone)]
pub struct RelayConfig {
  #[serde(default = "default_relay_capacity")]
  pub capacity:        usize,
  #[serde(default = "default_relay_batch_size")]
  pub batch_size:      usize,
  #[serde(default = "default_emit_timeout_ms")]
  pub emit_timeout_ms: u64,
}

fn default_course_ttl_days() -> i64 { 7 }
fn default_upstream_timeout_secs() -> u64 { 5 }
fn default_upstream_retries() -> u32 { 2 }
fn default_first_page_ttl_secs() -> u64 { 60 }
fn default_detail_ttl_secs() -> u64 { 30 * 60 }
fn default_relay_capacity() -> usize { 1024 }
fn default_relay_batch_size() -> usize { 100 }
fn default_emit_timeout_ms() -> u64 { 1000 }

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      first_page_ttl_secs: default_first_page_ttl_secs(),
      detail_ttl_secs:     default_detail_ttl_secs(),
    }
  }
}

impl Default for RelayConfig {
  fn default() -> Self {
    Self {
      capacity:        default_relay_capacity(),
      batch_size:      default_relay_batch_size(),
      emit_timeout_ms: default_emit_timeout_ms(),
    }
  }
}

impl ServerConfig {
  /// Reads `path` if it exists, then applies `KESTACK__*` environment
  /// overrides (`KESTACK__UPSTREAM__BASE_URL=...`).
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("KESTACK").separator("__"))
      .build()
      .with_context(|| format!("cannot read configuration from {}", path.display()))?
      .try_deserialize()
      .context("invalid server configuration")
  }

  pub fn policy(&self) -> TermPolicy {
    TermPolicy::new(
      TermRef::new(self.current.year.clone(), self.current.term.clone()),
      self.current.selecting,
    )
  }

  pub fn course_ttl(&self) -> Ttl { Ttl::from_secs(self.current.course_ttl_days.saturating_mul(86_400)) }

  pub fn service_settings(&self) -> ServiceSettings {
    let mut settings = ServiceSettings::new(self.policy(), self.course_ttl());
    settings.emit_timeout = Duration::from_millis(self.relay.emit_timeout_ms);
    settings.first_page_ttl = Duration::from_secs(self.cache.first_page_ttl_secs);
    settings.detail_ttl = Duration::from_secs(self.cache.detail_ttl_secs);
    settings
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The JSON API under `/api`, plus a liveness probe.
pub fn router<T>(service: Arc<T>) -> Router
where
  T: CourseOperations + 'static,
{
  Router::new()
    .route("/healthz", get(|| async { "ok" }))
    .nest("/api", kestack_api::api_router(service))
    .layer(TraceLayer::new_for_http())
}
