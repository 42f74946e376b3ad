use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const SEARCH_ERROR_MESSAGE: &str = "Error fetching search results.";
pub const NO_RESULTS_MESSAGE: &str = "No results found.";
const MAX_RESULTS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct SearchCredentials {
    pub api_key: String,
    pub engine_id: String,
}

/// Web search capability. Always produces text; failures come back as a
/// readable message instead of an error so the rest of a plan still runs.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, credentials: &SearchCredentials) -> String;
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Clone)]
pub struct WebSearchClient {
    client: Client,
    endpoint: String,
}

impl WebSearchClient {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create search client: {}", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().to_string(),
        })
    }

    async fn fetch(
        &self,
        query: &str,
        credentials: &SearchCredentials,
    ) -> Result<SearchResponse, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .query(&[
                ("key", credentials.api_key.as_str()),
                ("cx", credentials.engine_id.as_str()),
                ("q", query),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await
    }
}

#[async_trait]
impl WebSearch for WebSearchClient {
    async fn search(&self, query: &str, credentials: &SearchCredentials) -> String {
        match self.fetch(query, credentials).await {
            Ok(response) => {
                debug!("Search returned {} item(s)", response.items.len());
                format_results(&response)
            }
            Err(e) => {
                warn!("Web search failed: {}", e);
                SEARCH_ERROR_MESSAGE.to_string()
            }
        }
    }
}

/// Renders the first three items as `title\nsnippet\nlink` blocks.
pub fn format_results(response: &SearchResponse) -> String {
    if response.items.is_empty() {
        return NO_RESULTS_MESSAGE.to_string();
    }
    response
        .items
        .iter()
        .take(MAX_RESULTS)
        .map(|item| format!("{}\n{}\n{}", item.title, item.snippet, item.link))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Query, RawQuery, State},
        http::StatusCode,
        routing::get,
        Json,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn response(count: usize) -> SearchResponse {
        let items = (1..=count)
            .map(|n| {
                serde_json::json!({
                    "title": format!("Title {n}"),
                    "snippet": format!("Snippet {n}"),
                    "link": format!("https://example.com/{n}"),
                })
            })
            .collect::<Vec<_>>();
        serde_json::from_value(serde_json::json!({ "items": items })).unwrap()
    }

    #[test]
    fn keeps_first_three_results_in_order() {
        let text = format_results(&response(5));
        let blocks: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], "Title 1\nSnippet 1\nhttps://example.com/1");
        assert_eq!(blocks[1], "Title 2\nSnippet 2\nhttps://example.com/2");
        assert_eq!(blocks[2], "Title 3\nSnippet 3\nhttps://example.com/3");
    }

    #[test]
    fn fewer_than_three_results_are_all_kept() {
        let text = format_results(&response(1));
        assert_eq!(text, "Title 1\nSnippet 1\nhttps://example.com/1");
    }

    #[test]
    fn missing_items_means_no_results() {
        let parsed: SearchResponse =
            serde_json::from_str(r#"{"kind":"customsearch#search"}"#).unwrap();
        assert_eq!(format_results(&parsed), NO_RESULTS_MESSAGE);
    }

    #[tokio::test]
    async fn unreachable_provider_soft_fails() {
        let client = WebSearchClient::new("http://127.0.0.1:9/search", Duration::from_secs(2))
            .unwrap();
        let credentials = SearchCredentials {
            api_key: "key".into(),
            engine_id: "cx".into(),
        };
        assert_eq!(
            client.search("rust", &credentials).await,
            SEARCH_ERROR_MESSAGE
        );
    }

    type Seen = Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>;

    async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/customsearch/v1")
    }

    async fn five_items(
        State(seen): State<Seen>,
        Query(params): Query<HashMap<String, String>>,
        RawQuery(raw): RawQuery,
    ) -> Json<serde_json::Value> {
        seen.lock().unwrap().push((params, raw));
        let items: Vec<_> = (1..=5)
            .map(|n| {
                serde_json::json!({
                    "title": format!("Title {n}"),
                    "snippet": format!("Snippet {n}"),
                    "link": format!("https://example.com/{n}"),
                })
            })
            .collect();
        Json(serde_json::json!({ "items": items }))
    }

    #[tokio::test]
    async fn sends_key_cx_and_encoded_query_and_keeps_three_results() {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let endpoint = serve(
            axum::Router::new()
                .route("/customsearch/v1", get(five_items))
                .with_state(seen.clone()),
        )
        .await;
        let client = WebSearchClient::new(&endpoint, Duration::from_secs(5)).unwrap();
        let credentials = SearchCredentials {
            api_key: "api-key".into(),
            engine_id: "engine".into(),
        };

        let out = client.search("c++ & rust", &credentials).await;

        assert_eq!(out.split("\n\n").count(), 3);
        assert!(out.starts_with("Title 1\nSnippet 1\nhttps://example.com/1"));
        assert!(!out.contains("Title 4"));

        let seen = seen.lock().unwrap();
        let (params, raw) = &seen[0];
        assert_eq!(params["key"], "api-key");
        assert_eq!(params["cx"], "engine");
        assert_eq!(params["q"], "c++ & rust");
        let raw = raw.as_deref().unwrap_or_default();
        assert!(raw.contains("%26"), "{raw}");
        assert!(!raw.contains(' '), "{raw}");
    }

    #[tokio::test]
    async fn error_status_and_empty_items_are_soft() {
        let endpoint = serve(
            axum::Router::new()
                .route(
                    "/customsearch/v1",
                    get(|| async { (StatusCode::FORBIDDEN, "daily limit exceeded") }),
                )
                .route("/empty", get(|| async { Json(serde_json::json!({})) })),
        )
        .await;
        let credentials = SearchCredentials::default();

        let failing = WebSearchClient::new(&endpoint, Duration::from_secs(5)).unwrap();
        assert_eq!(failing.search("rust", &credentials).await, SEARCH_ERROR_MESSAGE);

        let empty_endpoint = endpoint.replace("/customsearch/v1", "/empty");
        let empty = WebSearchClient::new(&empty_endpoint, Duration::from_secs(5)).unwrap();
        assert_eq!(empty.search("rust", &credentials).await, NO_RESULTS_MESSAGE);
    }
}
