use std::sync::Arc;

use async_trait::async_trait;

use crate::schema::{Bug, Build, Comment, Group, Package, Release, Stack, TestCase, Update, User};
use crate::storage_traits::{DomainStore, StoreResult};
use crate::SurrealHandle;

/// SurrealDB-backed implementation of the DomainStore trait.
#[derive(Clone)]
pub struct SurrealDomainStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealDomainStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl DomainStore for SurrealDomainStore {
    async fn releases(&self) -> StoreResult<Vec<Release>> {
        self.handle.releases().await
    }

    async fn release_by_name(&self, name: &str) -> StoreResult<Option<Release>> {
        self.handle.release_by_name(name).await
    }

    async fn release_by_name_or_version(&self, key: &str) -> StoreResult<Option<Release>> {
        self.handle.release_by_name_or_version(key).await
    }

    async fn package_by_name(&self, name: &str) -> StoreResult<Option<Package>> {
        self.handle.package_by_name(name).await
    }

    async fn get_or_create_package(&self, name: &str) -> StoreResult<Package> {
        self.handle.get_or_create_package(name).await
    }

    async fn build_by_nvr(&self, nvr: &str) -> StoreResult<Option<Build>> {
        self.handle.build_by_nvr(nvr).await
    }

    async fn latest_build_for_package(&self, package: &str) -> StoreResult<Option<Build>> {
        self.handle.latest_build_for_package(package).await
    }

    async fn update_by_title(&self, title: &str) -> StoreResult<Option<Update>> {
        self.handle.update_by_title(title).await
    }

    async fn update_by_title_or_alias(&self, key: &str) -> StoreResult<Option<Update>> {
        self.handle.update_by_title_or_alias(key).await
    }

    async fn user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        self.handle.user_by_name(name).await
    }

    async fn group_by_name(&self, name: &str) -> StoreResult<Option<Group>> {
        self.handle.group_by_name(name).await
    }

    async fn comment_by_id(&self, id: i64) -> StoreResult<Option<Comment>> {
        self.handle.comment_by_id(id).await
    }

    async fn bug_by_id(&self, bug_id: i64) -> StoreResult<Option<Bug>> {
        self.handle.bug_by_id(bug_id).await
    }

    async fn testcase_by_name(&self, name: &str) -> StoreResult<Option<TestCase>> {
        self.handle.testcase_by_name(name).await
    }

    async fn stack_by_name(&self, name: &str) -> StoreResult<Option<Stack>> {
        self.handle.stack_by_name(name).await
    }
}
