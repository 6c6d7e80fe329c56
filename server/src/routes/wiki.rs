use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use chrono::Utc;
use nusantara_shared::{WikiLang, WikiSummary};
use serde::Deserialize;

use crate::config::MAX_WIKI_CACHE_ENTRIES;
use crate::routes::api::json_bytes_response;
use crate::state::{AppState, CachedWiki, WikiCacheKey};

const MAX_SLUG_LEN: usize = 200;
const WIKI_CACHE_CONTROL: &str = "public, max-age=600";

#[derive(Deserialize)]
pub struct WikiQuery {
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamSummary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<UpstreamContentUrls>,
}

#[derive(Deserialize)]
struct UpstreamContentUrls {
    #[serde(default)]
    desktop: Option<UpstreamPage>,
}

#[derive(Deserialize)]
struct UpstreamPage {
    page: String,
}

pub async fn get_wiki_summary(
    State(state): State<AppState>,
    Path(raw_slug): Path<String>,
    Query(query): Query<WikiQuery>,
) -> Result<Response, StatusCode> {
    state.observability.record_wiki_request();

    let slug = normalize_slug(&raw_slug)?;
    let lang = match query.lang.as_deref() {
        None => WikiLang::default(),
        Some(raw) => WikiLang::parse(raw).ok_or(StatusCode::BAD_REQUEST)?,
    };
    let key: WikiCacheKey = (lang, slug);

    if let Some(cached) = state.wiki_cache.get(&key) {
        let age = Utc::now()
            .signed_duration_since(cached.fetched_at)
            .num_seconds();
        if age < state.wiki_cache_ttl_secs {
            state.observability.record_wiki_cache_hit();
            return Ok(json_bytes_response(
                cached.json.clone(),
                WIKI_CACHE_CONTROL,
                None,
            ));
        }
    }
    state.observability.record_wiki_cache_miss();

    let (lang, slug) = &key;
    let url = summary_url(&state.wiki_api_base, *lang, slug)?;
    let resp = state.http_client.get(url).send().await.map_err(|e| {
        tracing::warn!(error = %e, %slug, lang = lang.code(), "wikipedia request failed");
        state.observability.record_wiki_upstream_error();
        StatusCode::BAD_GATEWAY
    })?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(StatusCode::NOT_FOUND);
    }
    if !resp.status().is_success() {
        tracing::warn!(status = %resp.status(), %slug, "wikipedia returned an error status");
        state.observability.record_wiki_upstream_error();
        return Err(StatusCode::BAD_GATEWAY);
    }

    let upstream = resp.json::<UpstreamSummary>().await.map_err(|e| {
        tracing::warn!(error = %e, %slug, "unreadable wikipedia summary");
        state.observability.record_wiki_upstream_error();
        StatusCode::BAD_GATEWAY
    })?;

    let summary = build_summary(upstream, *lang, slug);
    let json = serde_json::to_vec(&summary)
        .map(Bytes::from)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    cache_wiki_payload(&state, key.clone(), json.clone());

    Ok(json_bytes_response(json, WIKI_CACHE_CONTROL, None))
}

/// Accepts article titles as Wikipedia spells them in URLs; spaces become underscores.
fn normalize_slug(raw: &str) -> Result<String, StatusCode> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_SLUG_LEN || trimmed == "." || trimmed == ".." {
        return Err(StatusCode::BAD_REQUEST);
    }
    if trimmed
        .chars()
        .any(|ch| ch.is_control() || matches!(ch, '/' | '\\' | '?' | '#' | '%' | '<' | '>'))
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(trimmed.replace(' ', "_"))
}

fn summary_url(base: &str, lang: WikiLang, slug: &str) -> Result<reqwest::Url, StatusCode> {
    let base = base.replace("{lang}", lang.code());
    let mut url = reqwest::Url::parse(&base).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let Ok(mut path_segments) = url.path_segments_mut() else {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };
    path_segments.pop_if_empty().push(slug);
    drop(path_segments);
    Ok(url)
}

fn build_summary(upstream: UpstreamSummary, lang: WikiLang, slug: &str) -> WikiSummary {
    let url = upstream
        .content_urls
        .and_then(|urls| urls.desktop)
        .map(|desktop| desktop.page)
        .filter(|page| page.starts_with("https://"))
        .unwrap_or_else(|| format!("https://{}.wikipedia.org/wiki/{slug}", lang.code()));
    let title = if upstream.title.trim().is_empty() {
        slug.replace('_', " ")
    } else {
        upstream.title
    };
    WikiSummary {
        title,
        html: extract_to_html(&upstream.extract),
        url,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Plain-text extract to escaped `<p>` paragraphs. No upstream markup survives.
fn extract_to_html(extract: &str) -> String {
    extract
        .split('\n')
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(|paragraph| format!("<p>{}</p>", escape_html(paragraph)))
        .collect()
}

fn cache_wiki_payload(state: &AppState, key: WikiCacheKey, json: Bytes) {
    if !state.wiki_cache.contains_key(&key) {
        while state.wiki_cache.len() >= MAX_WIKI_CACHE_ENTRIES {
            if !evict_oldest_wiki_entry(state) {
                break;
            }
        }
    }

    state.wiki_cache.insert(
        key,
        CachedWiki {
            json,
            fetched_at: Utc::now(),
        },
    );
}

fn evict_oldest_wiki_entry(state: &AppState) -> bool {
    let Some(oldest) = state
        .wiki_cache
        .iter()
        .min_by_key(|entry| entry.value().fetched_at)
        .map(|entry| entry.key().clone())
    else {
        return false;
    };
    state.wiki_cache.remove(&oldest).is_some()
}
