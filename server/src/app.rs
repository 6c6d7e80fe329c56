use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use crate::config::STATIC_ASSETS_DIR;
use crate::routes::{api, wiki};
use crate::state::AppState;

/// Trunk appends a 16 digit hex content hash to every bundle file it emits.
const BUNDLE_HASH_LEN: usize = 16;

pub(crate) fn build_app(state: AppState) -> Router {
    let client_bundle = ServeDir::new(STATIC_ASSETS_DIR)
        .precompressed_br()
        .precompressed_gzip();

    Router::new()
        .route("/api/atlas", get(api::get_atlas))
        .route("/api/active", get(api::get_active))
        .route("/api/wiki/{slug}", get(wiki::get_wiki_summary))
        .route("/api/health", get(api::health))
        .route("/api/metrics", get(api::metrics))
        .layer(CompressionLayer::new())
        .fallback_service(
            Router::new()
                .fallback_service(client_bundle)
                .layer(middleware::from_fn(bundle_cache_headers)),
        )
        .with_state(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BundleCaching {
    /// Content-hashed wasm/js/css: the name changes whenever the bytes do.
    Immutable,
    /// The html shell names the current hashed files, so it is always revalidated.
    Revalidate,
}

impl BundleCaching {
    fn for_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit('/').next().unwrap_or_default();
        if file_name.is_empty() || file_name == "index.html" {
            return Some(Self::Revalidate);
        }
        trunk_content_hash(file_name).map(|_| Self::Immutable)
    }

    fn header_value(self) -> HeaderValue {
        match self {
            Self::Immutable => HeaderValue::from_static("public, max-age=31536000, immutable"),
            Self::Revalidate => HeaderValue::from_static("no-cache"),
        }
    }
}

/// Hash segment of a trunk output name such as `nusantara-client-<hash>_bg.wasm`.
fn trunk_content_hash(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if !matches!(ext, "wasm" | "js" | "css") {
        return None;
    }
    let stem = stem.strip_suffix("_bg").unwrap_or(stem);
    let (_, hash) = stem.rsplit_once('-')?;
    (hash.len() == BUNDLE_HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())).then_some(hash)
}

async fn bundle_cache_headers(request: Request, next: Next) -> Response {
    let caching = BundleCaching::for_path(request.uri().path());
    let mut response = next.run(request).await;

    if let Some(caching) = caching
        && response.status().is_success()
    {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, caching.header_value());
    }
    response
}
