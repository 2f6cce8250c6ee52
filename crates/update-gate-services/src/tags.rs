//! Build-system tag service
//!
//! The build system labels every build with the tags it has been promoted
//! into. The admission pipeline asks for the tags of each submitted build
//! and, when releases are saved, confirms that tag names exist.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ServiceEndpoints;
use crate::error::ServiceError;
use crate::{http_client, ServiceResult};

const SERVICE: &str = "tag service";

/// Tag metadata as reported by the build system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub locked: bool,
}

impl TagInfo {
    pub fn named(name: &str) -> Self {
        TagInfo {
            name: name.to_string(),
            id: None,
            locked: false,
        }
    }
}

/// Query interface of the build-tagging service.
#[async_trait]
pub trait TagService: Send + Sync {
    /// All tags currently applied to `build`.
    async fn list_tags(&self, build: &str) -> ServiceResult<Vec<TagInfo>>;

    /// Metadata for one tag. `ServiceError::NotFound` when it does not exist.
    async fn get_tag(&self, name: &str) -> ServiceResult<TagInfo>;
}

/// JSON-over-HTTP client for a build-system gateway.
///
/// - `GET {tag_url}/builds/{nvr}/tags` → `[{"name": ..}, ..]`
/// - `GET {tag_url}/tags/{name}` → `{"name": ..}` or 404
pub struct HttpTagService {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTagService {
    pub fn new(endpoints: &ServiceEndpoints) -> ServiceResult<Self> {
        Ok(HttpTagService {
            base_url: endpoints.tag_url.trim_end_matches('/').to_string(),
            http_client: http_client(endpoints.timeout_secs)?,
        })
    }
}

#[async_trait]
impl TagService for HttpTagService {
    #[instrument(skip(self))]
    async fn list_tags(&self, build: &str) -> ServiceResult<Vec<TagInfo>> {
        let url = format!("{}/builds/{}/tags", self.base_url, build);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;

        match response.status() {
            // Unknown builds carry no tags.
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let tags: Vec<TagInfo> = response
                    .json()
                    .await
                    .map_err(|e| ServiceError::unavailable(SERVICE, e))?;
                debug!(count = tags.len(), "listed build tags");
                Ok(tags)
            }
            status => Err(ServiceError::unavailable(
                SERVICE,
                format!("GET {} returned {}", url, status),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn get_tag(&self, name: &str) -> ServiceResult<TagInfo> {
        let url = format!("{}/tags/{}", self.base_url, name);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ServiceError::NotFound {
                what: format!("tag {}", name),
            }),
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| ServiceError::unavailable(SERVICE, e)),
            status => Err(ServiceError::unavailable(
                SERVICE,
                format!("GET {} returned {}", url, status),
            )),
        }
    }
}

/// Fixed build → tags mapping for offline use and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticTagService {
    /// Tags applied to each build
    pub builds: HashMap<String, Vec<String>>,
    /// Tags that exist without being applied to any listed build
    pub tags: BTreeSet<String>,
}

impl StaticTagService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag `build` with `tags` (builder pattern).
    pub fn with_build(mut self, build: &str, tags: &[&str]) -> Self {
        self.builds.insert(
            build.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// Register a tag name that `get_tag` should know about.
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    fn knows_tag(&self, name: &str) -> bool {
        self.tags.contains(name) || self.builds.values().flatten().any(|t| t == name)
    }
}

#[async_trait]
impl TagService for StaticTagService {
    async fn list_tags(&self, build: &str) -> ServiceResult<Vec<TagInfo>> {
        Ok(self
            .builds
            .get(build)
            .map(|tags| tags.iter().map(|t| TagInfo::named(t)).collect())
            .unwrap_or_default())
    }

    async fn get_tag(&self, name: &str) -> ServiceResult<TagInfo> {
        if self.knows_tag(name) {
            Ok(TagInfo::named(name))
        } else {
            Err(ServiceError::NotFound {
                what: format!("tag {}", name),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_service_lists_build_tags() {
        let service = StaticTagService::new()
            .with_build("foo-1.0-1.fc30", &["f30-updates-candidate", "f30-updates-testing"]);

        let tags = service.list_tags("foo-1.0-1.fc30").await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["f30-updates-candidate", "f30-updates-testing"]);

        assert!(service.list_tags("bar-1-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_service_get_tag() {
        let service = StaticTagService::new()
            .with_build("foo-1.0-1.fc30", &["f30-updates-candidate"])
            .with_tag("f30-override");

        assert_eq!(
            service.get_tag("f30-override").await.unwrap().name,
            "f30-override"
        );
        assert!(service.get_tag("f30-updates-candidate").await.is_ok());

        let err = service.get_tag("f99-nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_http_service_unreachable_is_unavailable() {
        let endpoints = ServiceEndpoints {
            tag_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..ServiceEndpoints::single_host("http://127.0.0.1:9")
        };
        let service = HttpTagService::new(&endpoints).unwrap();

        let err = service.list_tags("foo-1.0-1.fc30").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable { .. }));
    }
}
