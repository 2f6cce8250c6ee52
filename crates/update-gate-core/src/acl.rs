//! Access control resolution.
//!
//! An [`AclBackend`] answers "who may push builds of this package to this
//! branch". The backend is chosen once, from configuration, when the
//! pipeline is built.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use update_gate_services::{AclService, Pushers};
use update_gate_state::User;

use crate::error::{AdmissionError, Result};

/// Committers, watchers and groups for one package on one branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAcl {
    /// ACLs are disabled; everyone has access.
    pub open: bool,
    pub committers: BTreeSet<String>,
    pub watchers: BTreeSet<String>,
    pub groups: BTreeSet<String>,
    pub notify_groups: BTreeSet<String>,
}

impl From<Pushers> for ResolvedAcl {
    fn from(pushers: Pushers) -> Self {
        ResolvedAcl {
            open: false,
            committers: pushers.committers,
            watchers: pushers.watchers,
            groups: pushers.groups,
            notify_groups: pushers.notify_groups,
        }
    }
}

/// Which ACL backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclBackendKind {
    /// Query the package database.
    #[default]
    #[serde(alias = "pkgdb")]
    Service,
    /// Fixed committers for offline use.
    #[serde(alias = "dummy")]
    Static,
    /// ACLs disabled.
    None,
}

impl FromStr for AclBackendKind {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" | "pkgdb" => Ok(AclBackendKind::Service),
            "static" | "dummy" => Ok(AclBackendKind::Static),
            "none" | "" => Ok(AclBackendKind::None),
            other => Err(AdmissionError::Config(format!(
                "unknown ACL backend: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for AclBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AclBackendKind::Service => "service",
            AclBackendKind::Static => "static",
            AclBackendKind::None => "none",
        };
        f.write_str(name)
    }
}

impl AclBackendKind {
    /// Construct the backend. `Service` needs an ACL service client.
    pub fn build(self, service: Option<Arc<dyn AclService>>) -> Result<Box<dyn AclBackend>> {
        match self {
            AclBackendKind::Service => {
                let service = service.ok_or_else(|| {
                    AdmissionError::Config(
                        "the service ACL backend needs an ACL service client".to_string(),
                    )
                })?;
                Ok(Box::new(ServiceAcl::new(service)))
            }
            AclBackendKind::Static => Ok(Box::new(StaticAcl::default())),
            AclBackendKind::None => Ok(Box::new(OpenAcl)),
        }
    }
}

#[async_trait]
pub trait AclBackend: Send + Sync {
    /// Resolve the ACL for `package` on `branch`. Service failures are
    /// `AdmissionError::ServiceUnavailable`, never an empty ACL.
    async fn resolve(&self, package: &str, branch: &str) -> Result<ResolvedAcl>;

    fn kind(&self) -> AclBackendKind;
}

/// Backend that asks the package database.
pub struct ServiceAcl {
    service: Arc<dyn AclService>,
}

impl ServiceAcl {
    pub fn new(service: Arc<dyn AclService>) -> Self {
        ServiceAcl { service }
    }
}

#[async_trait]
impl AclBackend for ServiceAcl {
    async fn resolve(&self, package: &str, branch: &str) -> Result<ResolvedAcl> {
        let pushers = self.service.get_pushers(package, branch).await?;
        debug!(package, branch, committers = ?pushers.committers, "resolved ACL");
        Ok(pushers.into())
    }

    fn kind(&self) -> AclBackendKind {
        AclBackendKind::Service
    }
}

/// The same ACL for every package.
#[derive(Debug, Clone)]
pub struct StaticAcl {
    acl: ResolvedAcl,
}

impl StaticAcl {
    pub fn new(acl: ResolvedAcl) -> Self {
        StaticAcl { acl }
    }
}

impl Default for StaticAcl {
    fn default() -> Self {
        let mut acl = ResolvedAcl::default();
        acl.committers = ["ralph", "guest"].iter().map(|s| s.to_string()).collect();
        acl.watchers.insert("guest".to_string());
        StaticAcl { acl }
    }
}

#[async_trait]
impl AclBackend for StaticAcl {
    async fn resolve(&self, _package: &str, _branch: &str) -> Result<ResolvedAcl> {
        Ok(self.acl.clone())
    }

    fn kind(&self) -> AclBackendKind {
        AclBackendKind::Static
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAcl;

#[async_trait]
impl AclBackend for OpenAcl {
    async fn resolve(&self, _package: &str, _branch: &str) -> Result<ResolvedAcl> {
        Ok(ResolvedAcl {
            open: true,
            ..ResolvedAcl::default()
        })
    }

    fn kind(&self) -> AclBackendKind {
        AclBackendKind::None
    }
}

/// Whether `user` may push builds under `acl`.
///
/// Granted when ACLs are open, the user is a named committer, one of the
/// user's groups is an ACL group, or one of the user's groups is an admin
/// group. The admin check comes last and overrides any package ACL.
pub fn has_access(user: &User, acl: &ResolvedAcl, admin_groups: &BTreeSet<String>) -> bool {
    if acl.open || acl.committers.contains(&user.name) {
        return true;
    }
    if let Some(group) = user.groups.iter().find(|g| acl.groups.contains(*g)) {
        debug!(user = %user.name, group = %group, "access via package group");
        return true;
    }
    if let Some(group) = user.groups.iter().find(|g| admin_groups.contains(*g)) {
        debug!(user = %user.name, group = %group, "access via admin group");
        return true;
    }
    false
}
