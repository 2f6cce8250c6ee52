//! Domain records for the update-gate store
//!
//! Tables:
//! - releases: Release reference data and its tag set
//! - packages: Source packages (get-or-create)
//! - builds: Build artifacts, optionally attached to an update
//! - updates: Existing update submissions
//! - users / groups: Membership data for access control
//! - comments, bugs, testcases, stacks: Entities referenced by existence checks

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Declares a lowercase string enum with `FromStr`/`Display` and a value list.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every accepted string value, in declaration order.
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(StoreError::InvalidEnumValue {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Lifecycle status of an update.
    UpdateStatus {
        Pending => "pending",
        Testing => "testing",
        Stable => "stable",
        Unpushed => "unpushed",
        Obsolete => "obsolete",
        Processing => "processing",
    }
}

string_enum! {
    /// Requested transition for an update.
    UpdateRequest {
        Testing => "testing",
        Obsolete => "obsolete",
        Unpush => "unpush",
        Revoke => "revoke",
        Stable => "stable",
    }
}

string_enum! {
    UpdateSeverity {
        Unspecified => "unspecified",
        Urgent => "urgent",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

string_enum! {
    /// What the user should do after installing an update.
    UpdateSuggestion {
        Unspecified => "unspecified",
        Reboot => "reboot",
        Logout => "logout",
    }
}

string_enum! {
    UpdateType {
        Bugfix => "bugfix",
        Security => "security",
        Newpackage => "newpackage",
        Enhancement => "enhancement",
    }
}

string_enum! {
    /// Whether a release is accepting updates.
    ReleaseState {
        Disabled => "disabled",
        Pending => "pending",
        Current => "current",
        Archived => "archived",
    }
}

/// A distribution release and the build-system tags that belong to it.
///
/// Empty tag strings mean "no such tag" (pending tags are optional).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Short name, e.g. "F30"
    pub name: String,
    /// Human readable name, e.g. "Fedora 30"
    pub long_name: String,
    /// Version string, e.g. "30"
    pub version: String,
    /// Source-control branch the ACL service keys on, e.g. "f30"
    pub branch: String,
    pub id_prefix: String,
    pub dist_tag: String,
    pub candidate_tag: String,
    pub testing_tag: String,
    pub stable_tag: String,
    #[serde(default)]
    pub pending_testing_tag: String,
    #[serde(default)]
    pub pending_stable_tag: String,
    pub override_tag: String,
    pub state: ReleaseState,
    /// Creation time; the most recent release wins shared-tag collisions
    pub created_at: DateTime<Utc>,
}

impl Release {
    /// Create a release whose tags follow the conventional `<dist>-updates*`
    /// layout (e.g. `f30-updates-candidate`).
    pub fn conventional(name: &str, version: &str, branch: &str) -> Self {
        let dist = format!("f{}", version);
        Release {
            name: name.to_string(),
            long_name: format!("Fedora {}", version),
            version: version.to_string(),
            branch: branch.to_string(),
            id_prefix: "FEDORA".to_string(),
            dist_tag: dist.clone(),
            candidate_tag: format!("{}-updates-candidate", dist),
            testing_tag: format!("{}-updates-testing", dist),
            stable_tag: format!("{}-updates", dist),
            pending_testing_tag: format!("{}-updates-testing-pending", dist),
            pending_stable_tag: format!("{}-updates-pending", dist),
            override_tag: format!("{}-override", dist),
            state: ReleaseState::Current,
            created_at: Utc::now(),
        }
    }
}

/// A source package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Package {
            name: name.to_string(),
        }
    }
}

/// A build artifact known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    /// Full name-version-release string
    pub nvr: String,
    /// Owning package name
    pub package: String,
    /// Release name, when known
    pub release: Option<String>,
    /// Title of the update this build is attached to, if any
    pub update: Option<String>,
    /// Insertion time; "latest build" ordering uses this
    pub created_at: DateTime<Utc>,
}

impl Build {
    pub fn new(nvr: &str, package: &str) -> Self {
        Build {
            nvr: nvr.to_string(),
            package: package.to_string(),
            release: None,
            update: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_release(mut self, release: &str) -> Self {
        self.release = Some(release.to_string());
        self
    }

    pub fn attached_to(mut self, update: &str) -> Self {
        self.update = Some(update.to_string());
        self
    }
}

/// An existing update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub title: String,
    pub alias: Option<String>,
    pub status: UpdateStatus,
    pub request: Option<UpdateRequest>,
    /// NVRs of the builds in this update
    pub builds: Vec<String>,
    /// Release name
    pub release: String,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Group names this user belongs to
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl User {
    pub fn new(name: &str) -> Self {
        User {
            name: name.to_string(),
            email: None,
            groups: BTreeSet::new(),
        }
    }

    pub fn in_groups(mut self, groups: &[&str]) -> Self {
        self.groups.extend(groups.iter().map(|g| g.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

/// A comment left on an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    /// Update title
    pub update: String,
    pub author: String,
    pub text: String,
}

/// A bug tracker entry and the updates that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    pub bug_id: i64,
    /// Update titles
    #[serde(default)]
    pub updates: Vec<String>,
}

/// A named test case belonging to a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub package: String,
}

/// A named group of packages that are updated together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<String>,
}
