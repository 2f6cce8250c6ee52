//! Endpoint configuration for the service clients

use serde::{Deserialize, Serialize};

/// Base URLs and client settings for the external services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEndpoints {
    /// Build-system JSON gateway
    pub tag_url: String,
    /// Package database (ACL service)
    pub acl_url: String,
    /// Test-case catalog API
    pub catalog_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        ServiceEndpoints {
            tag_url: std::env::var("UPDATE_GATE_TAG_URL")
                .unwrap_or_else(|_| "https://koji.fedoraproject.org/kojihub-json".to_string()),
            acl_url: std::env::var("UPDATE_GATE_ACL_URL")
                .unwrap_or_else(|_| "https://admin.fedoraproject.org/pkgdb".to_string()),
            catalog_url: std::env::var("UPDATE_GATE_CATALOG_URL").unwrap_or_else(|_| {
                "https://taskotron.fedoraproject.org/resultsdb_api".to_string()
            }),
            timeout_secs: std::env::var("UPDATE_GATE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl ServiceEndpoints {
    /// Create endpoints from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Point every service at one base URL (useful for local gateways)
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        ServiceEndpoints {
            tag_url: format!("{}/koji", base),
            acl_url: format!("{}/pkgdb", base),
            catalog_url: format!("{}/resultsdb", base),
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_default() {
        let endpoints = ServiceEndpoints::default();
        assert!(!endpoints.tag_url.is_empty());
        assert!(!endpoints.acl_url.is_empty());
        assert!(endpoints.timeout_secs > 0);
    }

    #[test]
    fn test_single_host_strips_trailing_slash() {
        let endpoints = ServiceEndpoints::single_host("http://localhost:8080/");
        assert_eq!(endpoints.tag_url, "http://localhost:8080/koji");
        assert_eq!(endpoints.catalog_url, "http://localhost:8080/resultsdb");
    }
}
