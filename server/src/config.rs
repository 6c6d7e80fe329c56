use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const DEFAULT_ATLAS_DATA_PATH: &str = "data/atlas.json";
pub const STATIC_ASSETS_DIR: &str = "client/dist";

/// `{lang}` is replaced with the requested Wikipedia language code.
pub const DEFAULT_WIKI_API_BASE: &str = "https://{lang}.wikipedia.org/api/rest_v1/page/summary";
pub const DEFAULT_WIKI_CACHE_TTL_SECS: i64 = 600; // 10 minutes
pub const MAX_WIKI_CACHE_ENTRIES: usize = 128;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn atlas_data_path() -> PathBuf {
    std::env::var("ATLAS_DATA_PATH")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ATLAS_DATA_PATH))
}

pub fn wiki_api_base() -> String {
    std::env::var("WIKI_API_BASE")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_WIKI_API_BASE.to_owned())
}

pub fn wiki_cache_ttl_secs() -> i64 {
    std::env::var("WIKI_CACHE_TTL_SECS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_WIKI_CACHE_TTL_SECS)
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_port_defaults_and_overrides() {
        temp_env::with_var_unset("SERVER_PORT", || {
            assert_eq!(server_port(), DEFAULT_SERVER_PORT);
        });
        temp_env::with_var("SERVER_PORT", Some("8080"), || {
            assert_eq!(server_port(), 8080);
        });
        temp_env::with_var("SERVER_PORT", Some("0"), || {
            assert_eq!(server_port(), DEFAULT_SERVER_PORT);
        });
        temp_env::with_var("SERVER_PORT", Some("not-a-port"), || {
            assert_eq!(server_port(), DEFAULT_SERVER_PORT);
        });
    }

    #[test]
    fn atlas_path_ignores_blank_override() {
        temp_env::with_var("ATLAS_DATA_PATH", Some("  "), || {
            assert_eq!(atlas_data_path(), PathBuf::from(DEFAULT_ATLAS_DATA_PATH));
        });
        temp_env::with_var("ATLAS_DATA_PATH", Some("/srv/atlas.json"), || {
            assert_eq!(atlas_data_path(), PathBuf::from("/srv/atlas.json"));
        });
    }

    #[test]
    fn wiki_api_base_strips_trailing_slash() {
        temp_env::with_var("WIKI_API_BASE", Some("http://127.0.0.1:9000/"), || {
            assert_eq!(wiki_api_base(), "http://127.0.0.1:9000");
        });
        temp_env::with_var_unset("WIKI_API_BASE", || {
            assert_eq!(wiki_api_base(), DEFAULT_WIKI_API_BASE);
        });
    }

    #[test]
    fn wiki_cache_ttl_rejects_non_positive() {
        temp_env::with_var("WIKI_CACHE_TTL_SECS", Some("-5"), || {
            assert_eq!(wiki_cache_ttl_secs(), DEFAULT_WIKI_CACHE_TTL_SECS);
        });
        temp_env::with_var("WIKI_CACHE_TTL_SECS", Some("30"), || {
            assert_eq!(wiki_cache_ttl_secs(), 30);
        });
    }

    #[test]
    fn upstream_timeouts_fall_back_on_invalid_values() {
        temp_env::with_vars(
            [
                ("UPSTREAM_HTTP_TIMEOUT_SECS", Some("0")),
                ("UPSTREAM_CONNECT_TIMEOUT_SECS", Some("abc")),
            ],
            || {
                assert_eq!(
                    upstream_http_timeout(),
                    Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS)
                );
                assert_eq!(
                    upstream_connect_timeout(),
                    Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS)
                );
            },
        );
        temp_env::with_var("UPSTREAM_HTTP_TIMEOUT_SECS", Some("25"), || {
            assert_eq!(upstream_http_timeout(), Duration::from_secs(25));
        });
    }
}
