use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use nusantara_shared::{Atlas, AtlasError, LabelPlacement, WikiLang, compute_label_placement};
use tracing::warn;

use crate::config::{
    upstream_connect_timeout, upstream_http_timeout, wiki_api_base, wiki_cache_ttl_secs,
};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to read atlas file {}: {source}", path.display())]
    ReadAtlas {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid atlas data: {0}")]
    Atlas(#[from] AtlasError),
}

/// The atlas plus everything derived from it once at startup.
#[derive(Debug)]
pub struct AtlasSnapshot {
    pub atlas: Atlas,
    pub json: Bytes,
    pub etag: String,
    /// Keyed by (empire id, snapshot year).
    pub placements: HashMap<(String, i32), LabelPlacement>,
}

impl AtlasSnapshot {
    pub fn build(atlas: Atlas) -> Result<Self, AtlasError> {
        let json = Bytes::from(atlas.to_json()?);
        let etag = format!("\"atlas-{:08x}\"", crc32fast::hash(&json));
        let placements = atlas
            .empires()
            .flat_map(|empire| {
                empire.boundaries.iter().map(|(year, boundary)| {
                    ((empire.id.clone(), *year), compute_label_placement(boundary))
                })
            })
            .collect();
        Ok(Self {
            atlas,
            json,
            etag,
            placements,
        })
    }

    pub fn placement_for(&self, id: &str, snapshot_year: i32) -> Option<LabelPlacement> {
        self.placements.get(&(id.to_owned(), snapshot_year)).copied()
    }
}

pub fn load_atlas(path: &Path) -> Result<Atlas, StartupError> {
    let raw = std::fs::read_to_string(path).map_err(|source| StartupError::ReadAtlas {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Atlas::from_json(&raw)?)
}

pub type WikiCacheKey = (WikiLang, String);

#[derive(Debug, Clone)]
pub struct CachedWiki {
    pub json: Bytes,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub atlas: Arc<AtlasSnapshot>,
    pub wiki_cache: Arc<DashMap<WikiCacheKey, CachedWiki>>,
    pub http_client: reqwest::Client,
    /// Summary endpoint base; `{lang}` is substituted per request.
    pub wiki_api_base: Arc<str>,
    pub wiki_cache_ttl_secs: i64,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    atlas_requests_total: AtomicU64,
    atlas_not_modified_total: AtomicU64,
    active_requests_total: AtomicU64,
    wiki_requests_total: AtomicU64,
    wiki_cache_hits_total: AtomicU64,
    wiki_cache_misses_total: AtomicU64,
    wiki_upstream_errors_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObservabilitySnapshot {
    pub atlas_requests_total: u64,
    pub atlas_not_modified_total: u64,
    pub active_requests_total: u64,
    pub wiki_requests_total: u64,
    pub wiki_cache_hits_total: u64,
    pub wiki_cache_misses_total: u64,
    pub wiki_upstream_errors_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            atlas_requests_total: self.atlas_requests_total.load(Ordering::Relaxed),
            atlas_not_modified_total: self.atlas_not_modified_total.load(Ordering::Relaxed),
            active_requests_total: self.active_requests_total.load(Ordering::Relaxed),
            wiki_requests_total: self.wiki_requests_total.load(Ordering::Relaxed),
            wiki_cache_hits_total: self.wiki_cache_hits_total.load(Ordering::Relaxed),
            wiki_cache_misses_total: self.wiki_cache_misses_total.load(Ordering::Relaxed),
            wiki_upstream_errors_total: self.wiki_upstream_errors_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_atlas_request(&self) {
        self.atlas_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_atlas_not_modified(&self) {
        self.atlas_not_modified_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_active_request(&self) {
        self.active_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wiki_request(&self) {
        self.wiki_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wiki_cache_hit(&self) {
        self.wiki_cache_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wiki_cache_miss(&self) {
        self.wiki_cache_misses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wiki_upstream_error(&self) {
        self.wiki_upstream_errors_total
            .fetch_add(1, Ordering::Relaxed);
    }
}

fn build_http_client() -> reqwest::Client {
    let request_timeout = upstream_http_timeout();
    let connect_timeout = upstream_connect_timeout();
    reqwest::Client::builder()
        .user_agent("nusantara-map/0.1")
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .build()
        .or_else(|e| {
            warn!(
                error = %e,
                "failed to build configured HTTP client, retrying without custom user-agent"
            );
            reqwest::Client::builder()
                .timeout(request_timeout)
                .connect_timeout(connect_timeout)
                .build()
        })
        .unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default HTTP client without timeouts");
            reqwest::Client::new()
        })
}

impl AppState {
    pub fn new(atlas: Atlas) -> Result<Self, AtlasError> {
        Ok(Self {
            atlas: Arc::new(AtlasSnapshot::build(atlas)?),
            wiki_cache: Arc::new(DashMap::new()),
            http_client: build_http_client(),
            wiki_api_base: Arc::from(wiki_api_base()),
            wiki_cache_ttl_secs: wiki_cache_ttl_secs(),
            observability: Arc::new(ObservabilityCounters::default()),
        })
    }
}
