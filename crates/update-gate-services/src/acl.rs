//! Package access-control service
//!
//! The package database records, per package and branch, who may commit
//! and who watches commits. Entries whose name carries the `group::`
//! prefix name a group instead of a person.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ServiceEndpoints;
use crate::error::ServiceError;
use crate::{http_client, ServiceResult};

const SERVICE: &str = "package database";
const GROUP_PREFIX: &str = "group::";

/// People and groups attached to a package on one branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pushers {
    pub committers: BTreeSet<String>,
    pub watchers: BTreeSet<String>,
    pub groups: BTreeSet<String>,
    pub notify_groups: BTreeSet<String>,
}

impl Pushers {
    pub fn is_empty(&self) -> bool {
        self.committers.is_empty()
            && self.watchers.is_empty()
            && self.groups.is_empty()
            && self.notify_groups.is_empty()
    }
}

/// Query interface of the access-control service.
#[async_trait]
pub trait AclService: Send + Sync {
    /// Resolve committers, watchers and groups for `package` on `branch`.
    async fn get_pushers(&self, package: &str, branch: &str) -> ServiceResult<Pushers>;
}

#[derive(Debug, Deserialize)]
struct AclResponse {
    #[serde(default)]
    packages: Vec<PackageAcls>,
}

#[derive(Debug, Deserialize)]
struct PackageAcls {
    #[serde(default)]
    acls: Vec<AclEntry>,
}

#[derive(Debug, Deserialize)]
struct AclEntry {
    acl: String,
    fas_name: String,
    status: String,
}

impl AclResponse {
    fn into_pushers(self) -> Pushers {
        let mut pushers = Pushers::default();
        for entry in self.packages.into_iter().flat_map(|p| p.acls) {
            if entry.status != "Approved" {
                continue;
            }
            let group = entry.fas_name.strip_prefix(GROUP_PREFIX).map(str::to_string);
            match (entry.acl.as_str(), group) {
                ("commit", Some(group)) => {
                    pushers.groups.insert(group);
                }
                ("commit", None) => {
                    pushers.committers.insert(entry.fas_name);
                }
                ("watchcommits", Some(group)) => {
                    pushers.notify_groups.insert(group);
                }
                ("watchcommits", None) => {
                    pushers.watchers.insert(entry.fas_name);
                }
                _ => {}
            }
        }
        pushers
    }
}

/// JSON client for the package database ACL endpoint.
pub struct PkgdbClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl PkgdbClient {
    pub fn new(endpoints: &ServiceEndpoints) -> ServiceResult<Self> {
        Ok(PkgdbClient {
            base_url: endpoints.acl_url.trim_end_matches('/').to_string(),
            http_client: http_client(endpoints.timeout_secs)?,
        })
    }
}

#[async_trait]
impl AclService for PkgdbClient {
    #[instrument(skip(self))]
    async fn get_pushers(&self, package: &str, branch: &str) -> ServiceResult<Pushers> {
        let url = format!("{}/api/package/acl/get/{}/", self.base_url, package);
        let response = self
            .http_client
            .get(&url)
            .query(&[("branches", branch)])
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;

        match response.status() {
            // Packages the database has never heard of have no pushers.
            StatusCode::NOT_FOUND => Ok(Pushers::default()),
            status if status.is_success() => {
                let body: AclResponse = response
                    .json()
                    .await
                    .map_err(|e| ServiceError::unavailable(SERVICE, e))?;
                let pushers = body.into_pushers();
                debug!(
                    committers = pushers.committers.len(),
                    groups = pushers.groups.len(),
                    "resolved package pushers"
                );
                Ok(pushers)
            }
            status => Err(ServiceError::unavailable(
                SERVICE,
                format!("GET {} returned {}", url, status),
            )),
        }
    }
}

/// Fixed per-package pushers, with a fallback for unlisted packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticAclService {
    pub packages: HashMap<String, Pushers>,
    pub fallback: Pushers,
}

impl StaticAclService {
    pub fn new(fallback: Pushers) -> Self {
        StaticAclService {
            packages: HashMap::new(),
            fallback,
        }
    }

    pub fn with_package(mut self, package: &str, pushers: Pushers) -> Self {
        self.packages.insert(package.to_string(), pushers);
        self
    }
}

#[async_trait]
impl AclService for StaticAclService {
    async fn get_pushers(&self, package: &str, _branch: &str) -> ServiceResult<Pushers> {
        Ok(self
            .packages
            .get(package)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}
