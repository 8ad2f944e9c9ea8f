use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use pantry_chef_core::chef::HttpReply;
use pantry_chef_core::error::TransportError;
use pantry_chef_core::remote::{Method, RestRequest, RestTransport};

use crate::config::{CONNECT_TIMEOUT, STORE_TIMEOUT, StoreConfig};

/// PostgREST-style access to the remote store. Every request carries the
/// project key both as `apikey` and as a bearer token.
pub struct HttpRestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRestTransport {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key).context("Store key is not a valid header")?;
        headers.insert("apikey", key);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .context("Store key is not a valid header")?;
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .user_agent(format!("pantry-chef/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(STORE_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl RestTransport for HttpRestTransport {
    async fn send(&self, request: RestRequest) -> Result<HttpReply, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut query = request.query;

        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Delete => self.client.delete(&url),
            Method::Post => {
                let prefer = if let Some(key) = request.merge_on {
                    query.push(("on_conflict".to_string(), key));
                    "resolution=merge-duplicates"
                } else {
                    "return=minimal"
                };
                let builder = self.client.post(&url).header("Prefer", prefer);
                match &request.body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            }
        };

        let resp = builder
            .query(&query)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_chef_core::error::RemoteError;
    use pantry_chef_core::models::PantryItem;
    use pantry_chef_core::remote::RemoteStore;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> RemoteStore<HttpRestTransport> {
        let config = StoreConfig {
            base_url: server.uri(),
            api_key: "anon-key".to_string(),
        };
        RemoteStore::new(HttpRestTransport::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_fetch_pantry_sends_filter_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user_ingredients"))
            .and(query_param("user_id", "eq.alice"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "Egg", "quantity": "6"},
                {"name": "Rice", "quantity": "1kg"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let pantry = store(&server).fetch_pantry("alice").await.unwrap();
        assert_eq!(
            pantry,
            vec![PantryItem::new("Egg", "6"), PantryItem::new("Rice", "1kg")]
        );
    }

    #[tokio::test]
    async fn test_replace_pantry_deletes_then_upserts() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/user_ingredients"))
            .and(query_param("user_id", "eq.alice"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user_ingredients"))
            .and(query_param("on_conflict", "user_id,name"))
            .and(header("prefer", "resolution=merge-duplicates"))
            .and(body_json(json!([
                {"user_id": "alice", "name": "Egg", "quantity": "6"}
            ])))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .replace_pantry("alice", &[PantryItem::new("Egg", "6")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_replace_with_empty_pantry_only_deletes() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        store(&server).replace_pantry("alice", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_event_is_plain_insert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search_events"))
            .and(header("prefer", "return=minimal"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let event = pantry_chef_core::models::SearchEvent {
            user_id: None,
            recipe_name: "Bibimbap".to_string(),
            search_term: "rice".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        store(&server).append_search_event(&event).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .mount(&server)
            .await;

        let err = store(&server).fetch_pantry("alice").await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Status {
                status: 401,
                body: "JWT expired".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_popular_orders_and_limits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recipe_search_counts"))
            .and(query_param("order", "search_count.desc"))
            .and(query_param("limit", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"recipe_name": "Bibimbap", "search_count": 12}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let popular = store(&server).fetch_popular(3).await.unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].search_count, 12);
    }
}
