use nusantara_shared::{Atlas, WikiLang, WikiSummary};

pub async fn fetch_atlas() -> Result<Atlas, String> {
    let resp = gloo_net::http::Request::get("/api/atlas")
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;
    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }
    let body = resp
        .text()
        .await
        .map_err(|e| format!("read error: {e}"))?;
    Atlas::from_json(&body).map_err(|e| format!("atlas error: {e}"))
}

pub fn wiki_summary_url(slug: &str, lang: WikiLang) -> String {
    format!("/api/wiki/{}?lang={}", encode_path_segment(slug), lang.code())
}

pub async fn fetch_wiki_summary(slug: &str, lang: WikiLang) -> Result<WikiSummary, String> {
    let resp = gloo_net::http::Request::get(&wiki_summary_url(slug, lang))
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;
    match resp.status() {
        200 => {}
        404 => return Err("No article found".to_string()),
        status => return Err(format!("HTTP {status}")),
    }
    resp.json::<WikiSummary>()
        .await
        .map_err(|e| format!("parse error: {e}"))
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wiki_url_carries_language() {
        assert_eq!(
            wiki_summary_url("Majapahit", WikiLang::Id),
            "/api/wiki/Majapahit?lang=id"
        );
    }

    #[test]
    fn wiki_url_escapes_slug() {
        assert_eq!(
            wiki_summary_url("Hayam Wuruk/x", WikiLang::En),
            "/api/wiki/Hayam%20Wuruk%2Fx?lang=en"
        );
    }
}
