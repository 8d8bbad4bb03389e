//! Confluence page retrieval
//!
//! Fetches a page's storage-format body (XHTML) over the Confluence REST API
//! using HTTP basic authentication.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::{Credentials, REQUEST_TIMEOUT_SECS};
use crate::error::{Result, WikiSshError};

/// Longest response excerpt included in error messages
const ERROR_BODY_EXCERPT: usize = 200;

/// A source of page bodies
#[async_trait]
pub trait DocumentSource {
    /// Fetch the HTML body of the page with the given ID
    async fn fetch_page(&self, page_id: &str) -> Result<String>;
}

/// Confluence REST API client
#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    body: Option<PageBody>,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    storage: Option<StorageBody>,
}

#[derive(Debug, Deserialize)]
struct StorageBody {
    value: String,
}

impl ConfluenceClient {
    /// Create a client for the Confluence instance at `base_url`
    pub fn new(base_url: Url, credentials: Credentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("wiki-ssh/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WikiSshError::fetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// `{base}/rest/api/content/{page_id}?expand=body.storage`
    ///
    /// Path segments already present in the base URL are kept.
    pub fn page_url(&self, page_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WikiSshError::config(format!("Invalid base url '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(["rest", "api", "content", page_id]);
        url.query_pairs_mut().clear().append_pair("expand", "body.storage");
        Ok(url)
    }
}

#[async_trait]
impl DocumentSource for ConfluenceClient {
    async fn fetch_page(&self, page_id: &str) -> Result<String> {
        let url = self.page_url(page_id)?;
        debug!(url = %url, "GET request");

        let response = self
            .http
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| WikiSshError::fetch(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WikiSshError::fetch(e.to_string()))?;

        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(WikiSshError::auth(format!(
                    "Confluence rejected credentials for '{}' ({})",
                    self.credentials.username, status
                )));
            }
            StatusCode::NOT_FOUND => {
                return Err(WikiSshError::fetch(format!("Page {} not found", page_id)));
            }
            _ => {
                return Err(WikiSshError::fetch(format!(
                    "HTTP {}: {}",
                    status,
                    excerpt(&body)
                )));
            }
        }

        let page: PageResponse = serde_json::from_str(&body)
            .map_err(|e| WikiSshError::fetch(format!("Unexpected response: {}", e)))?;

        page.body
            .and_then(|b| b.storage)
            .map(|s| s.value)
            .ok_or_else(|| WikiSshError::fetch(format!("Page {} has no storage body", page_id)))
    }
}

fn excerpt(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> ConfluenceClient {
        ConfluenceClient::new(
            Url::parse(base).unwrap(),
            Credentials::new("alice", "secret"),
        )
        .unwrap()
    }

    fn page_json(value: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "123456",
            "type": "page",
            "title": "Servers",
            "body": { "storage": { "value": value, "representation": "storage" } }
        })
    }

    #[test]
    fn test_page_url() {
        let url = client("https://wiki.example.com").page_url("123456").unwrap();
        assert_eq!(
            url.as_str(),
            "https://wiki.example.com/rest/api/content/123456?expand=body.storage"
        );
    }

    #[test]
    fn test_page_url_keeps_base_path() {
        let url = client("https://example.com/confluence/").page_url("42").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/confluence/rest/api/content/42?expand=body.storage"
        );

        let url = client("https://example.com/wiki").page_url("42").unwrap();
        assert_eq!(url.path(), "/wiki/rest/api/content/42");
    }

    #[test]
    fn test_page_url_escapes_page_id() {
        let url = client("https://wiki.example.com").page_url("a/b").unwrap();
        assert_eq!(url.path(), "/rest/api/content/a%2Fb");
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), ERROR_BODY_EXCERPT);
        assert_eq!(excerpt("  short  "), "short");
    }

    #[tokio::test]
    async fn test_fetch_page_returns_storage_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/123456"))
            .and(query_param("expand", "body.storage"))
            .and(basic_auth("alice", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json("<table></table>")))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server.uri()).fetch_page("123456").await.unwrap();
        assert_eq!(body, "<table></table>");
    }

    #[tokio::test]
    async fn test_fetch_page_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server.uri()).fetch_page("123456").await.unwrap_err();
        assert!(matches!(err, WikiSshError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_fetch_page_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client(&server.uri()).fetch_page("123456").await.unwrap_err();
        assert!(matches!(err, WikiSshError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_fetch_page_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server.uri()).fetch_page("999").await.unwrap_err();
        assert_eq!(err.to_string(), "Error retrieving page content: Page 999 not found");
    }

    #[tokio::test]
    async fn test_fetch_page_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).fetch_page("123456").await.unwrap_err();
        assert!(matches!(err, WikiSshError::Fetch(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_fetch_page_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "123456" })),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri()).fetch_page("123456").await.unwrap_err();
        assert!(err.to_string().contains("has no storage body"));
    }

    #[tokio::test]
    async fn test_fetch_page_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).fetch_page("123456").await.unwrap_err();
        assert!(err.to_string().contains("Unexpected response"));
    }

    #[tokio::test]
    async fn test_fetch_page_connection_refused() {
        // Grab a free port, then release it so connections are refused.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = client(&format!("http://127.0.0.1:{}", port))
            .fetch_page("1")
            .await
            .unwrap_err();
        assert!(matches!(err, WikiSshError::Fetch(_)));
    }
}
