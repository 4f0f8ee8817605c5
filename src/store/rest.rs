//! PostgREST client, the dialect spoken by a hosted Supabase project.

use super::{find_active_year, SurveyStore, ACADEMIC_YEARS};
use crate::error::StoreError;
use crate::models::{AcademicYear, Row, Scope, ACADEMIC_YEAR_ID, COUNTRY_ID};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;

/// Remote store reached over HTTP.
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, StoreError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http_client: builder.build()?,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn scope_filter(scope: Scope) -> [(&'static str, String); 2] {
        [
            (COUNTRY_ID, format!("eq.{}", scope.country_id)),
            (ACADEMIC_YEAR_ID, format!("eq.{}", scope.academic_year_id)),
        ]
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let mut request = self.http_client.request(method, self.table_url(table));
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }
        request
    }

    /// GET of every column, narrowed to `scope` when given.
    fn select_request(&self, table: &str, scope: Option<Scope>) -> RequestBuilder {
        let request = self.request(Method::GET, table).query(&[("select", "*")]);
        match scope {
            Some(scope) => request.query(&Self::scope_filter(scope)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                StoreError::Unreachable {
                    url: self.base_url.clone(),
                    message: e.to_string(),
                }
            } else {
                StoreError::Http(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl SurveyStore for RestStore {
    fn describe(&self) -> String {
        format!("REST store at {}", self.base_url)
    }

    async fn select_where(&self, table: &str, scope: Scope) -> Result<Vec<Row>, StoreError> {
        let request = self.select_request(table, Some(scope));
        let rows: Vec<Row> = self.send(request).await?.json().await?;
        debug!("Selected {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    async fn select_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let request = self.select_request(table, None);
        let rows: Vec<Row> = self.send(request).await?.json().await?;
        debug!("Selected {} rows from {} across all scopes", rows.len(), table);
        Ok(rows)
    }

    async fn delete_where(&self, table: &str, scope: Scope) -> Result<(), StoreError> {
        let request = self
            .request(Method::DELETE, table)
            .query(&Self::scope_filter(scope));
        self.send(request).await?;
        Ok(())
    }

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(&rows);
        self.send(request).await?;
        Ok(())
    }

    async fn upsert_single(
        &self,
        table: &str,
        row: Row,
        conflict_keys: &[&str],
    ) -> Result<(), StoreError> {
        let request = self
            .request(Method::POST, table)
            .query(&[("on_conflict", conflict_keys.join(","))])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row]);
        self.send(request).await?;
        Ok(())
    }

    async fn active_academic_year(&self) -> Result<Option<AcademicYear>, StoreError> {
        let request = self
            .request(Method::GET, ACADEMIC_YEARS)
            .query(&[("select", "*"), ("is_active", "eq.true")]);
        let rows: Vec<Row> = self.send(request).await?.json().await?;
        find_active_year(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let store = RestStore::new("https://example.supabase.co/", None, None).unwrap();
        assert_eq!(
            store.table_url("student_enrollment"),
            "https://example.supabase.co/rest/v1/student_enrollment"
        );
    }

    #[test]
    fn test_scope_filter() {
        let filter = RestStore::scope_filter(Scope::new(3, 12));
        assert_eq!(filter[0], ("country_id", "eq.3".to_string()));
        assert_eq!(filter[1], ("academic_year_id", "eq.12".to_string()));
    }

    #[test]
    fn test_request_carries_key_headers() {
        let store = RestStore::new("http://localhost:54321", Some("anon".into()), None).unwrap();
        let request = store
            .request(Method::GET, "institutions")
            .query(&RestStore::scope_filter(Scope::new(1, 2)))
            .build()
            .unwrap();
        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()["authorization"], "Bearer anon");
        assert_eq!(
            request.url().query(),
            Some("country_id=eq.1&academic_year_id=eq.2")
        );
    }

    #[test]
    fn test_select_requests() {
        let store = RestStore::new("http://localhost:54321", None, None).unwrap();
        let scoped = store
            .select_request("institutions", Some(Scope::new(1, 2)))
            .build()
            .unwrap();
        assert_eq!(
            scoped.url().query(),
            Some("select=*&country_id=eq.1&academic_year_id=eq.2")
        );

        let all = store.select_request("institutions", None).build().unwrap();
        assert_eq!(*all.method(), Method::GET);
        assert_eq!(all.url().query(), Some("select=*"));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let store = RestStore::new("http://127.0.0.1:1", None, Some(5)).unwrap();
        let err = store
            .select_where("population_data", Scope::new(1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unreachable { .. }));
    }
}
