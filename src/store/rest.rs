//! HTTP client for the hosted relational service.
//!
//! The service speaks PostgREST conventions: one endpoint per table,
//! column predicates as query parameters (`?lead_id=eq.<uuid>`), and
//! `Prefer: return=representation` to get mutated rows back.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use super::{DataStore, Filter, Row, StoreError, Table};
use crate::config::StoreSettings;

pub struct RestStore {
    http: Client,
    base_url: String,
    api_key: String,
    actor: Option<Uuid>,
}

impl RestStore {
    pub fn new(settings: &StoreSettings) -> Result<Self, StoreError> {
        let http = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|err| StoreError::Unavailable(format!("http client init: {err}")))?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            actor: settings.acting_user,
        })
    }

    fn endpoint(&self, table: Table) -> String {
        format!("{}/{}", self.base_url, table.as_str())
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(key) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", key);
        }
        if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(reqwest::header::AUTHORIZATION, bearer);
        }
        headers
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(table))
            .headers(self.headers())
    }

    async fn read_rows(response: Response) -> Result<Vec<Row>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            // a failing backend reads as an outage, not a bad request
            if status.is_server_error() {
                return Err(StoreError::Unavailable(format!(
                    "backend returned {}: {message}",
                    status.as_u16()
                )));
            }
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        let body: Value = response.json().await.map_err(transport_error)?;
        match body {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(StoreError::Decode(serde::de::Error::custom(format!(
                        "expected row object, got {other}"
                    )))),
                })
                .collect(),
            Value::Object(row) => Ok(vec![row]),
            other => Err(StoreError::Decode(serde::de::Error::custom(format!(
                "expected row array, got {other}"
            )))),
        }
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if let Some(status) = err.status() {
        StoreError::Rejected {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else {
        StoreError::Unavailable(err.to_string())
    }
}

fn id_predicate(id: Uuid) -> [(String, String); 1] {
    [("id".to_string(), format!("eq.{id}"))]
}

#[async_trait]
impl DataStore for RestStore {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let response = self
            .request(Method::GET, table)
            .query(&filter.to_query())
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_rows(response).await
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(transport_error)?;
        let mut rows = Self::read_rows(response).await?;
        rows.pop().ok_or_else(|| StoreError::Rejected {
            status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
            message: "insert returned no representation".to_string(),
        })
    }

    async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<Row, StoreError> {
        let response = self
            .request(Method::PATCH, table)
            .query(&id_predicate(id))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(transport_error)?;
        let mut rows = Self::read_rows(response).await?;
        rows.pop()
            .ok_or_else(|| StoreError::not_found(table.as_str()))
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<bool, StoreError> {
        let response = self
            .request(Method::DELETE, table)
            .query(&id_predicate(id))
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(transport_error)?;
        let rows = Self::read_rows(response).await?;
        Ok(!rows.is_empty())
    }

    fn acting_user(&self) -> Option<Uuid> {
        self.actor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::models::Lead;
    use crate::crm::repository::{EntityRepository, FallbackStore};
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn settings(url: &str) -> StoreSettings {
        StoreSettings {
            base_url: url.to_string(),
            api_key: "test-key".to_string(),
            acting_user: None,
        }
    }

    #[tokio::test]
    async fn select_builds_predicate_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/leads")
            .match_query(mockito::Matcher::UrlEncoded(
                "status".into(),
                "eq.new".into(),
            ))
            .match_header("apikey", "test-key")
            .with_body(json!([{ "id": Uuid::new_v4(), "status": "new" }]).to_string())
            .create_async()
            .await;

        let store = RestStore::new(&settings(&server.url())).unwrap();
        let rows = store
            .select(Table::Leads, &Filter::new().eq("status", "new"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn insert_returns_representation() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        server
            .mock("POST", "/tasks")
            .match_header("Prefer", "return=representation")
            .with_status(201)
            .with_body(json!([{ "id": id, "title": "Demo" }]).to_string())
            .create_async()
            .await;

        let store = RestStore::new(&settings(&server.url())).unwrap();
        let mut row = Row::new();
        row.insert("title".into(), json!("Demo"));
        let inserted = store.insert(Table::Tasks, row).await.unwrap();
        assert_eq!(inserted.get("id"), Some(&json!(id)));
    }

    #[tokio::test]
    async fn update_of_unknown_row_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", mockito::Matcher::Any)
            .with_body("[]")
            .create_async()
            .await;

        let store = RestStore::new(&settings(&server.url())).unwrap();
        let err = store
            .update(Table::Leads, Uuid::new_v4(), Row::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn backend_failure_reads_as_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/deals")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let store = RestStore::new(&settings(&server.url())).unwrap();
        let err = store.select(Table::Deals, &Filter::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn client_error_surfaces_as_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/deals")
            .with_status(400)
            .with_body("bad predicate")
            .create_async()
            .await;

        let store = RestStore::new(&settings(&server.url())).unwrap();
        let err = store.select(Table::Deals, &Filter::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn backend_outage_read_degrades_to_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/leads")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let seed = json!({
            "id": Uuid::new_v4(),
            "first_name": "Cached",
            "last_name": "Lead",
            "email": "cached@x.com",
            "status": "new",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        });
        let fallback = FallbackStore::new().seed(
            Table::Leads,
            vec![seed.as_object().cloned().unwrap()],
        );
        let store = Arc::new(RestStore::new(&settings(&server.url())).unwrap());
        let leads: EntityRepository<Lead> = EntityRepository::new(
            store,
            Arc::new(fallback),
            CancellationToken::new(),
        );

        let listed = leads.list(&Filter::new()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].first_name, "Cached");
        assert!(leads.is_degraded());
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        // port 1 on loopback refuses the connection immediately
        let store = RestStore::new(&settings("http://127.0.0.1:1")).unwrap();
        let err = store.select(Table::Leads, &Filter::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
