//! The PEP 503 "simple" index client: given an index base URL and a project name, yields the
//! raw `(absolute_url, displayed_filename, sha256_from_fragment_or_empty)` records a listing
//! page advertised.

use url::Url;

use crate::html::parse_listing;
use crate::http::Http;
use crate::types::NormalizedPackageName;
use crate::utils::normalize_index_url;

/// One raw record recovered from an index listing page, before classification.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    /// The absolute URL the artifact can be downloaded from.
    pub url: Url,
    /// The filename as displayed in the listing (the anchor's visible text).
    pub filename: String,
    /// A `sha256=<hex>` digest hint from the href's fragment, or empty if absent.
    pub sha256_hint: String,
}

/// Queries a single index for every artifact record it advertises for `name`. Network failure
/// on this index, or a listing body with zero anchors, both yield an empty sequence: finding
/// nothing on one index is never fatal, since other configured indexes may still carry the
/// project.
pub async fn list_project(http: &Http, index_url: &Url, name: &NormalizedPackageName) -> Vec<IndexRecord> {
    let base = normalize_index_url(index_url.clone());
    let Ok(listing_url) = base.join(&format!("{}/", name.as_str())) else {
        tracing::warn!(index = %index_url, name = %name, "could not construct listing URL");
        return Vec::new();
    };

    let Some(body) = http.get_text(listing_url.as_str()).await else {
        tracing::debug!(index = %index_url, name = %name, "listing request failed or missed, skipping index");
        return Vec::new();
    };

    let entries = parse_listing(&body, &listing_url);
    if entries.is_empty() {
        tracing::debug!(index = %index_url, name = %name, "listing page had no anchors");
    }

    entries
        .into_iter()
        .map(|entry| IndexRecord {
            url: entry.url,
            filename: entry.filename,
            sha256_hint: entry.sha256,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_list_project_against_mock_server() {
        use axum::{routing::get, Router};

        async fn simple_handler() -> &'static str {
            r#"<a href="trio-0.18.0-py3-none-any.whl#sha256=aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa">trio-0.18.0-py3-none-any.whl</a>"#
        }

        let app = Router::new().route("/simple/trio/", get(simple_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let http = Http::new("ppm-test/0.1", Duration::from_secs(5), 0).unwrap();
        let index_url: Url = format!("http://{addr}/simple/").parse().unwrap();
        let name: NormalizedPackageName = "trio".parse().unwrap();

        let records = list_project(&http, &index_url, &name).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "trio-0.18.0-py3-none-any.whl");
        assert_eq!(records[0].sha256_hint.len(), 64);
    }

    #[tokio::test]
    async fn test_list_project_on_unreachable_index_yields_empty() {
        let http = Http::new("ppm-test/0.1", Duration::from_millis(200), 0).unwrap();
        let index_url: Url = "http://127.0.0.1:1/simple/".parse().unwrap();
        let name: NormalizedPackageName = "trio".parse().unwrap();
        let records = list_project(&http, &index_url, &name).await;
        assert!(records.is_empty());
    }
}
