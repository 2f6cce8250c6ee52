//! Storage trait definitions for update-gate
//!
//! `DomainStore` is the queryable view of the relational domain model the
//! admission pipeline reconciles against: point lookups by unique key, the
//! "latest build for a package" ordering, and an atomic get-or-create for
//! packages.
//!
//! The trait is async and backend-agnostic. An in-memory fake is provided
//! via the `fakes` module; `SurrealDomainStore` persists to SurrealDB.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::schema::{Bug, Build, Comment, Group, Package, Release, Stack, TestCase, Update, User};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read-mostly access to the update domain model.
///
/// Guarantees:
/// - Lookups return `Ok(None)` for missing records; `Err` means the backend
///   itself failed.
/// - `get_or_create_package` is atomic: concurrent callers for the same new
///   name observe exactly one package record.
/// - `latest_build_for_package` orders by insertion time, newest first.
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// All releases, in no particular order.
    async fn releases(&self) -> StoreResult<Vec<Release>>;

    /// Release by exact name.
    async fn release_by_name(&self, name: &str) -> StoreResult<Option<Release>>;

    /// Release whose name or version equals `key`.
    async fn release_by_name_or_version(&self, key: &str) -> StoreResult<Option<Release>>;

    async fn package_by_name(&self, name: &str) -> StoreResult<Option<Package>>;

    /// Return the package called `name`, inserting it first if absent.
    async fn get_or_create_package(&self, name: &str) -> StoreResult<Package>;

    async fn build_by_nvr(&self, nvr: &str) -> StoreResult<Option<Build>>;

    /// Most recently recorded build of `package`.
    async fn latest_build_for_package(&self, package: &str) -> StoreResult<Option<Build>>;

    async fn update_by_title(&self, title: &str) -> StoreResult<Option<Update>>;

    /// Update whose title or alias equals `key`.
    async fn update_by_title_or_alias(&self, key: &str) -> StoreResult<Option<Update>>;

    async fn user_by_name(&self, name: &str) -> StoreResult<Option<User>>;

    async fn group_by_name(&self, name: &str) -> StoreResult<Option<Group>>;

    async fn comment_by_id(&self, id: i64) -> StoreResult<Option<Comment>>;

    async fn bug_by_id(&self, bug_id: i64) -> StoreResult<Option<Bug>>;

    async fn testcase_by_name(&self, name: &str) -> StoreResult<Option<TestCase>>;

    async fn stack_by_name(&self, name: &str) -> StoreResult<Option<Stack>>;
}
