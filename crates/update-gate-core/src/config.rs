//! Admission settings.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::acl::AclBackendKind;
use crate::error::Result;

pub const DEFAULT_ADMIN_GROUPS: &[&str] = &["provenpackager", "releng"];
pub const DEFAULT_EXPIRATION_LIMIT_DAYS: i64 = 31;

/// Settings the pipeline is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Members of these groups may push any package and edit stable updates
    pub admin_groups: BTreeSet<String>,
    pub acl_backend: AclBackendKind,
    /// How far ahead an expiration date may lie
    pub expiration_limit_days: i64,
    /// Enables the challenge for anonymous submissions
    pub challenge_secret: Option<String>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        AdmissionConfig {
            admin_groups: DEFAULT_ADMIN_GROUPS.iter().map(|g| g.to_string()).collect(),
            acl_backend: AclBackendKind::default(),
            expiration_limit_days: DEFAULT_EXPIRATION_LIMIT_DAYS,
            challenge_secret: None,
        }
    }
}

impl AdmissionConfig {
    /// Defaults overridden by `UPDATE_GATE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(groups) = std::env::var("UPDATE_GATE_ADMIN_GROUPS") {
            config.admin_groups = split_groups(&groups);
        }
        if let Ok(backend) = std::env::var("UPDATE_GATE_ACL_BACKEND") {
            config.acl_backend = backend.parse()?;
        }
        if let Some(days) = std::env::var("UPDATE_GATE_EXPIRATION_LIMIT_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.expiration_limit_days = days;
        }
        config.challenge_secret = std::env::var("UPDATE_GATE_CHALLENGE_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        Ok(config)
    }

    pub fn is_admin(&self, groups: &BTreeSet<String>) -> bool {
        !self.admin_groups.is_disjoint(groups)
    }
}

/// Split a whitespace or comma separated group list.
fn split_groups(value: &str) -> BTreeSet<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdmissionConfig::default();
        assert!(config.admin_groups.contains("provenpackager"));
        assert_eq!(config.expiration_limit_days, 31);
        assert_eq!(config.acl_backend, AclBackendKind::Service);
        assert!(config.challenge_secret.is_none());
    }

    #[test]
    fn test_split_groups() {
        let groups = split_groups("provenpackager, releng  qa");
        assert_eq!(groups.len(), 3);
        assert!(groups.contains("qa"));
    }

    #[test]
    fn test_config_from_toml() {
        let config: AdmissionConfig = toml::from_str(
            r#"
            admin_groups = ["releng"]
            acl_backend = "dummy"
            expiration_limit_days = 14
            "#,
        )
        .unwrap();
        assert_eq!(config.acl_backend, AclBackendKind::Static);
        assert_eq!(config.expiration_limit_days, 14);
        assert!(config.is_admin(&["releng".to_string()].into_iter().collect()));
        assert!(!config.is_admin(&BTreeSet::new()));
    }
}
