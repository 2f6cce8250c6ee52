//! update-gate-services: external collaborators of the admission pipeline
//!
//! This crate defines the service seams the pipeline calls out to and
//! ships HTTP clients plus static fixtures for each:
//!
//! - `TagService`: build tags from the build system (`HttpTagService`,
//!   `StaticTagService`)
//! - `AclService`: package committers and groups (`PkgdbClient`,
//!   `StaticAclService`)
//! - `ChallengeService`: anti-automation challenge (`SecretChallenge`)
//! - `TestCaseCatalog`: known test case names (`TaskotronCatalog`,
//!   `StaticCatalog`)
//!
//! ## Layer 2 - External services

pub mod acl;
pub mod catalog;
pub mod challenge;
pub mod config;
pub mod error;
pub mod tags;

pub use acl::{AclService, PkgdbClient, Pushers, StaticAclService};
pub use catalog::{StaticCatalog, TaskotronCatalog, TestCaseCatalog};
pub use challenge::{ChallengeService, SecretChallenge};
pub use config::ServiceEndpoints;
pub use error::ServiceError;
pub use tags::{HttpTagService, StaticTagService, TagInfo, TagService};

/// Result type for service calls
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

const USER_AGENT: &str = concat!("update-gate/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client used by every service client.
pub(crate) fn http_client(timeout_secs: u64) -> ServiceResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ServiceError::Client(e.to_string()))
}
