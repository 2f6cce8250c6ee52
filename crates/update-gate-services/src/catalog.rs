//! Known test case catalog
//!
//! Requirement tokens on a submission must name test cases the automated
//! test system knows about. The catalog is exposed as a lazy stream so a
//! paged remote listing is only walked as far as the caller needs, and
//! every call starts a fresh walk.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::ServiceEndpoints;
use crate::error::ServiceError;
use crate::{http_client, ServiceResult};

const SERVICE: &str = "test case catalog";

pub trait TestCaseCatalog: Send + Sync {
    /// Stream every known test case name.
    fn test_case_names(&self) -> BoxStream<'_, ServiceResult<String>>;
}

#[derive(Debug, Deserialize)]
struct TestCasePage {
    #[serde(default)]
    data: Vec<TestCaseRecord>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TestCaseRecord {
    name: String,
}

/// Client for the results database `testcases` listing, following `next`
/// links until the last page.
pub struct TaskotronCatalog {
    base_url: String,
    http_client: reqwest::Client,
}

impl TaskotronCatalog {
    pub fn new(endpoints: &ServiceEndpoints) -> ServiceResult<Self> {
        Ok(TaskotronCatalog {
            base_url: endpoints.catalog_url.trim_end_matches('/').to_string(),
            http_client: http_client(endpoints.timeout_secs)?,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_page(
        &self,
        next: Option<String>,
    ) -> ServiceResult<Option<(Vec<String>, Option<String>)>> {
        let Some(url) = next else {
            return Ok(None);
        };
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;
        if !response.status().is_success() {
            return Err(ServiceError::unavailable(
                SERVICE,
                format!("GET {} returned {}", url, response.status()),
            ));
        }
        let page: TestCasePage = response
            .json()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;
        debug!(count = page.data.len(), "fetched test case page");
        let names = page.data.into_iter().map(|t| t.name).collect();
        Ok(Some((names, page.next)))
    }
}

impl TestCaseCatalog for TaskotronCatalog {
    fn test_case_names(&self) -> BoxStream<'_, ServiceResult<String>> {
        let first = Some(format!("{}/api/v2.0/testcases", self.base_url));
        stream::try_unfold(first, move |next| self.fetch_page(next))
            .map_ok(|names| stream::iter(names.into_iter().map(Ok::<String, ServiceError>)))
            .try_flatten()
            .boxed()
    }
}

/// Fixed list of test case names.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    names: Vec<String>,
}

impl StaticCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticCatalog {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl TestCaseCatalog for StaticCatalog {
    fn test_case_names(&self) -> BoxStream<'_, ServiceResult<String>> {
        stream::iter(self.names.iter().cloned().map(Ok)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_catalog_is_restartable() {
        let catalog = StaticCatalog::new(["dist.rpmlint", "dist.depcheck"]);

        let first: Vec<String> = catalog.test_case_names().try_collect().await.unwrap();
        let second: Vec<String> = catalog.test_case_names().try_collect().await.unwrap();
        assert_eq!(first, vec!["dist.rpmlint", "dist.depcheck"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_page_parsing() {
        let page: TestCasePage = serde_json::from_value(serde_json::json!({
            "data": [{"name": "dist.rpmlint", "ref_url": "https://example.org"}],
            "next": "https://example.org/api/v2.0/testcases?page=2"
        }))
        .unwrap();
        assert_eq!(page.data[0].name, "dist.rpmlint");
        assert!(page.next.is_some());

        let last: TestCasePage = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(last.next.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_catalog_yields_error() {
        let mut endpoints = ServiceEndpoints::single_host("http://127.0.0.1:9");
        endpoints.timeout_secs = 2;
        let catalog = TaskotronCatalog::new(&endpoints).unwrap();

        let first = catalog.test_case_names().next().await.unwrap();
        assert!(matches!(first, Err(ServiceError::Unavailable { .. })));
    }
}
