//! In-memory fakes for the storage traits
//!
//! Provides `MemoryDomainStore`, which satisfies the `DomainStore` contract
//! without any external dependencies, plus `StoreFixtures` for seeding it
//! from JSON.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::schema::*;
use crate::storage_traits::*;

/// Seed data for a `MemoryDomainStore`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreFixtures {
    pub releases: Vec<Release>,
    pub packages: Vec<Package>,
    pub builds: Vec<Build>,
    pub updates: Vec<Update>,
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub comments: Vec<Comment>,
    pub bugs: Vec<Bug>,
    pub testcases: Vec<TestCase>,
    pub stacks: Vec<Stack>,
}

#[derive(Debug, Default)]
struct Tables {
    releases: Vec<Release>,
    packages: HashMap<String, Package>,
    /// Insertion order doubles as the build id ordering.
    builds: Vec<Build>,
    updates: Vec<Update>,
    users: HashMap<String, User>,
    groups: HashMap<String, Group>,
    comments: HashMap<i64, Comment>,
    bugs: HashMap<i64, Bug>,
    testcases: HashMap<String, TestCase>,
    stacks: HashMap<String, Stack>,
}

/// In-memory domain store backed by mutex-guarded tables.
#[derive(Debug, Default)]
pub struct MemoryDomainStore {
    tables: Mutex<Tables>,
}

impl MemoryDomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated from fixtures.
    pub fn from_fixtures(fixtures: StoreFixtures) -> StoreResult<Self> {
        let store = Self::new();
        for release in fixtures.releases {
            store.insert_release(release)?;
        }
        for package in fixtures.packages {
            store.insert_package(package)?;
        }
        for build in fixtures.builds {
            store.insert_build(build)?;
        }
        for update in fixtures.updates {
            store.insert_update(update)?;
        }
        for user in fixtures.users {
            store.insert_user(user)?;
        }
        for group in fixtures.groups {
            store.insert_group(group)?;
        }
        for comment in fixtures.comments {
            store.insert_comment(comment)?;
        }
        for bug in fixtures.bugs {
            store.insert_bug(bug)?;
        }
        for testcase in fixtures.testcases {
            store.insert_testcase(testcase)?;
        }
        for stack in fixtures.stacks {
            store.insert_stack(stack)?;
        }
        Ok(store)
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| StoreError::Backend(format!("memory store lock poisoned: {}", e)))
    }

    pub fn insert_release(&self, release: Release) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.releases.iter().any(|r| r.name == release.name) {
            return Err(StoreError::Duplicate {
                table: "releases",
                key: release.name,
            });
        }
        tables.releases.push(release);
        Ok(())
    }

    pub fn insert_package(&self, package: Package) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.packages.insert(package.name.clone(), package);
        Ok(())
    }

    /// Insert a build, creating its package on the fly.
    pub fn insert_build(&self, build: Build) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.builds.iter().any(|b| b.nvr == build.nvr) {
            return Err(StoreError::Duplicate {
                table: "builds",
                key: build.nvr,
            });
        }
        tables
            .packages
            .entry(build.package.clone())
            .or_insert_with(|| Package::new(&build.package));
        tables.builds.push(build);
        Ok(())
    }

    pub fn insert_update(&self, update: Update) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.updates.iter().any(|u| u.title == update.title) {
            return Err(StoreError::Duplicate {
                table: "updates",
                key: update.title,
            });
        }
        tables.updates.push(update);
        Ok(())
    }

    pub fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut tables = self.tables()?;
        for group in &user.groups {
            tables
                .groups
                .entry(group.clone())
                .or_insert_with(|| Group { name: group.clone() });
        }
        tables.users.insert(user.name.clone(), user);
        Ok(())
    }

    pub fn insert_group(&self, group: Group) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.groups.insert(group.name.clone(), group);
        Ok(())
    }

    pub fn insert_comment(&self, comment: Comment) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.comments.insert(comment.id, comment);
        Ok(())
    }

    pub fn insert_bug(&self, bug: Bug) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.bugs.insert(bug.bug_id, bug);
        Ok(())
    }

    pub fn insert_testcase(&self, testcase: TestCase) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.testcases.insert(testcase.name.clone(), testcase);
        Ok(())
    }

    pub fn insert_stack(&self, stack: Stack) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.stacks.insert(stack.name.clone(), stack);
        Ok(())
    }

    /// Number of package rows, for asserting get-or-create idempotence.
    pub fn package_count(&self) -> usize {
        self.tables().map(|t| t.packages.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DomainStore for MemoryDomainStore {
    async fn releases(&self) -> StoreResult<Vec<Release>> {
        Ok(self.tables()?.releases.clone())
    }

    async fn release_by_name(&self, name: &str) -> StoreResult<Option<Release>> {
        let tables = self.tables()?;
        Ok(tables.releases.iter().find(|r| r.name == name).cloned())
    }

    async fn release_by_name_or_version(&self, key: &str) -> StoreResult<Option<Release>> {
        let tables = self.tables()?;
        Ok(tables
            .releases
            .iter()
            .find(|r| r.name == key || r.version == key)
            .cloned())
    }

    async fn package_by_name(&self, name: &str) -> StoreResult<Option<Package>> {
        Ok(self.tables()?.packages.get(name).cloned())
    }

    async fn get_or_create_package(&self, name: &str) -> StoreResult<Package> {
        let mut tables = self.tables()?;
        let package = tables
            .packages
            .entry(name.to_string())
            .or_insert_with(|| Package::new(name));
        Ok(package.clone())
    }

    async fn build_by_nvr(&self, nvr: &str) -> StoreResult<Option<Build>> {
        let tables = self.tables()?;
        Ok(tables.builds.iter().find(|b| b.nvr == nvr).cloned())
    }

    async fn latest_build_for_package(&self, package: &str) -> StoreResult<Option<Build>> {
        let tables = self.tables()?;
        Ok(tables
            .builds
            .iter()
            .rev()
            .find(|b| b.package == package)
            .cloned())
    }

    async fn update_by_title(&self, title: &str) -> StoreResult<Option<Update>> {
        let tables = self.tables()?;
        Ok(tables.updates.iter().find(|u| u.title == title).cloned())
    }

    async fn update_by_title_or_alias(&self, key: &str) -> StoreResult<Option<Update>> {
        let tables = self.tables()?;
        Ok(tables
            .updates
            .iter()
            .find(|u| u.title == key || u.alias.as_deref() == Some(key))
            .cloned())
    }

    async fn user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        Ok(self.tables()?.users.get(name).cloned())
    }

    async fn group_by_name(&self, name: &str) -> StoreResult<Option<Group>> {
        Ok(self.tables()?.groups.get(name).cloned())
    }

    async fn comment_by_id(&self, id: i64) -> StoreResult<Option<Comment>> {
        Ok(self.tables()?.comments.get(&id).cloned())
    }

    async fn bug_by_id(&self, bug_id: i64) -> StoreResult<Option<Bug>> {
        Ok(self.tables()?.bugs.get(&bug_id).cloned())
    }

    async fn testcase_by_name(&self, name: &str) -> StoreResult<Option<TestCase>> {
        Ok(self.tables()?.testcases.get(name).cloned())
    }

    async fn stack_by_name(&self, name: &str) -> StoreResult<Option<Stack>> {
        Ok(self.tables()?.stacks.get(name).cloned())
    }
}

/// A release fixture timestamped `offset_secs` after now; handy for
/// exercising created-at tie-breaks.
pub fn release_created_after(mut release: Release, offset_secs: i64) -> Release {
    release.created_at = Utc::now() + chrono::Duration::seconds(offset_secs);
    release
}
