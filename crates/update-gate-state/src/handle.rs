//! SurrealDB Handle - Connection and Operations
//!
//! Manages the connection and provides keyed queries over the update domain
//! tables, plus seeding inserts used by tests and tooling.
//!
//! Supports local (in-memory) and remote (`UPDATE_GATE_SURREAL_URL`)
//! connections.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::schema::{
    Bug, Build, Comment, Group, Package, Release, ReleaseState, Stack, TestCase, Update, User,
};
use crate::storage_traits::StoreResult;

const NAMESPACE: &str = "update_gate";
const DATABASE: &str = "main";

/// SurrealDB connection handle for update-gate
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbRelease {
    name: String,
    long_name: String,
    version: String,
    branch: String,
    id_prefix: String,
    dist_tag: String,
    candidate_tag: String,
    testing_tag: String,
    stable_tag: String,
    pending_testing_tag: String,
    pending_stable_tag: String,
    override_tag: String,
    state: ReleaseState,
    created_at: SurrealDatetime,
}

impl From<Release> for DbRelease {
    fn from(r: Release) -> Self {
        DbRelease {
            name: r.name,
            long_name: r.long_name,
            version: r.version,
            branch: r.branch,
            id_prefix: r.id_prefix,
            dist_tag: r.dist_tag,
            candidate_tag: r.candidate_tag,
            testing_tag: r.testing_tag,
            stable_tag: r.stable_tag,
            pending_testing_tag: r.pending_testing_tag,
            pending_stable_tag: r.pending_stable_tag,
            override_tag: r.override_tag,
            state: r.state,
            created_at: SurrealDatetime::from(r.created_at),
        }
    }
}

impl DbRelease {
    fn into_release(self) -> Release {
        Release {
            name: self.name,
            long_name: self.long_name,
            version: self.version,
            branch: self.branch,
            id_prefix: self.id_prefix,
            dist_tag: self.dist_tag,
            candidate_tag: self.candidate_tag,
            testing_tag: self.testing_tag,
            stable_tag: self.stable_tag,
            pending_testing_tag: self.pending_testing_tag,
            pending_stable_tag: self.pending_stable_tag,
            override_tag: self.override_tag,
            state: self.state,
            created_at: DateTime::<Utc>::from(self.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbBuild {
    nvr: String,
    package: String,
    release: Option<String>,
    update_title: Option<String>,
    created_at: SurrealDatetime,
}

impl From<Build> for DbBuild {
    fn from(b: Build) -> Self {
        DbBuild {
            nvr: b.nvr,
            package: b.package,
            release: b.release,
            update_title: b.update,
            created_at: SurrealDatetime::from(b.created_at),
        }
    }
}

impl DbBuild {
    fn into_build(self) -> Build {
        Build {
            nvr: self.nvr,
            package: self.package,
            release: self.release,
            update: self.update_title,
            created_at: DateTime::<Utc>::from(self.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbUser {
    name: String,
    email: Option<String>,
    member_of: Vec<String>,
}

impl DbUser {
    fn into_user(self) -> User {
        User {
            name: self.name,
            email: self.email,
            groups: self.member_of.into_iter().collect::<BTreeSet<_>>(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbComment {
    comment_id: i64,
    update_title: String,
    author: String,
    text: String,
}

impl From<Comment> for DbComment {
    fn from(c: Comment) -> Self {
        DbComment {
            comment_id: c.id,
            update_title: c.update,
            author: c.author,
            text: c.text,
        }
    }
}

impl DbComment {
    fn into_comment(self) -> Comment {
        Comment {
            id: self.comment_id,
            update: self.update_title,
            author: self.author,
            text: self.text,
        }
    }
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> StoreResult<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect("mem://").await
    }

    /// Connect using `UPDATE_GATE_SURREAL_URL`, falling back to in-memory.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> StoreResult<Self> {
        match std::env::var("UPDATE_GATE_SURREAL_URL") {
            Ok(url) => {
                info!("UPDATE_GATE_SURREAL_URL found, connecting to {}", url);
                Self::connect(&url).await
            }
            Err(_) => Self::setup_db().await,
        }
    }

    async fn connect(endpoint: &str) -> StoreResult<Self> {
        let db = surrealdb::engine::any::connect(endpoint)
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to connect to {}: {}", endpoint, e))
            })?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    /// Initialize the database schema
    async fn init_schema(&self) -> StoreResult<()> {
        debug!("Initializing update-gate schema");

        let schema = r#"
            DEFINE TABLE releases SCHEMAFULL;
            DEFINE FIELD name ON releases TYPE string;
            DEFINE FIELD long_name ON releases TYPE string;
            DEFINE FIELD version ON releases TYPE string;
            DEFINE FIELD branch ON releases TYPE string;
            DEFINE FIELD id_prefix ON releases TYPE string;
            DEFINE FIELD dist_tag ON releases TYPE string;
            DEFINE FIELD candidate_tag ON releases TYPE string;
            DEFINE FIELD testing_tag ON releases TYPE string;
            DEFINE FIELD stable_tag ON releases TYPE string;
            DEFINE FIELD pending_testing_tag ON releases TYPE string;
            DEFINE FIELD pending_stable_tag ON releases TYPE string;
            DEFINE FIELD override_tag ON releases TYPE string;
            DEFINE FIELD state ON releases TYPE string;
            DEFINE FIELD created_at ON releases TYPE datetime;
            DEFINE INDEX idx_release_name ON releases FIELDS name UNIQUE;

            -- Package record ids are the package name, which makes the
            -- get-or-create upsert atomic.
            DEFINE TABLE packages SCHEMAFULL;
            DEFINE FIELD name ON packages TYPE string;
            DEFINE INDEX idx_package_name ON packages FIELDS name UNIQUE;

            DEFINE TABLE builds SCHEMAFULL;
            DEFINE FIELD nvr ON builds TYPE string;
            DEFINE FIELD package ON builds TYPE string;
            DEFINE FIELD release ON builds TYPE option<string>;
            DEFINE FIELD update_title ON builds TYPE option<string>;
            DEFINE FIELD created_at ON builds TYPE datetime;
            DEFINE INDEX idx_build_nvr ON builds FIELDS nvr UNIQUE;
            DEFINE INDEX idx_build_package_created_at ON builds FIELDS package, created_at;

            DEFINE TABLE updates SCHEMAFULL;
            DEFINE FIELD title ON updates TYPE string;
            DEFINE FIELD alias ON updates TYPE option<string>;
            DEFINE FIELD status ON updates TYPE string;
            DEFINE FIELD request ON updates TYPE option<string>;
            DEFINE FIELD builds ON updates TYPE array<string>;
            DEFINE FIELD release ON updates TYPE string;
            DEFINE INDEX idx_update_title ON updates FIELDS title UNIQUE;
            DEFINE INDEX idx_update_alias ON updates FIELDS alias;

            DEFINE TABLE users SCHEMAFULL;
            DEFINE FIELD name ON users TYPE string;
            DEFINE FIELD email ON users TYPE option<string>;
            DEFINE FIELD member_of ON users TYPE array<string>;
            DEFINE INDEX idx_user_name ON users FIELDS name UNIQUE;

            DEFINE TABLE user_groups SCHEMAFULL;
            DEFINE FIELD name ON user_groups TYPE string;
            DEFINE INDEX idx_group_name ON user_groups FIELDS name UNIQUE;

            DEFINE TABLE comments SCHEMAFULL;
            DEFINE FIELD comment_id ON comments TYPE int;
            DEFINE FIELD update_title ON comments TYPE string;
            DEFINE FIELD author ON comments TYPE string;
            DEFINE FIELD text ON comments TYPE string;
            DEFINE INDEX idx_comment_id ON comments FIELDS comment_id UNIQUE;

            DEFINE TABLE bugs SCHEMAFULL;
            DEFINE FIELD bug_id ON bugs TYPE int;
            DEFINE FIELD updates ON bugs TYPE array<string>;
            DEFINE INDEX idx_bug_id ON bugs FIELDS bug_id UNIQUE;

            DEFINE TABLE testcases SCHEMAFULL;
            DEFINE FIELD name ON testcases TYPE string;
            DEFINE FIELD package ON testcases TYPE string;
            DEFINE INDEX idx_testcase_name ON testcases FIELDS name UNIQUE;

            DEFINE TABLE stacks SCHEMAFULL;
            DEFINE FIELD name ON stacks TYPE string;
            DEFINE FIELD packages ON stacks TYPE array<string>;
            DEFINE INDEX idx_stack_name ON stacks FIELDS name UNIQUE;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| StoreError::SchemaSetup(e.to_string()))?
            .check()
            .map_err(|e| StoreError::SchemaSetup(e.to_string()))?;

        debug!("Schema initialized successfully");
        Ok(())
    }

    /// Run a single-statement query with one string binding and decode rows.
    async fn select<T>(&self, query: &'static str, key: &str) -> StoreResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut result = self.db.query(query).bind(("key", key.to_string())).await?;
        let rows: Vec<T> = result.take(0)?;
        Ok(rows)
    }

    /// Same as `select`, with an integer binding.
    async fn select_by_int<T>(&self, query: &'static str, key: i64) -> StoreResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut result = self.db.query(query).bind(("key", key)).await?;
        let rows: Vec<T> = result.take(0)?;
        Ok(rows)
    }

    // ========== Releases ==========

    #[instrument(skip(self, release), fields(name = %release.name))]
    pub async fn insert_release(&self, release: Release) -> StoreResult<()> {
        let _created: Option<DbRelease> = self
            .db
            .create("releases")
            .content(DbRelease::from(release))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn releases(&self) -> StoreResult<Vec<Release>> {
        let mut result = self.db.query("SELECT * FROM releases").await?;
        let rows: Vec<DbRelease> = result.take(0)?;
        Ok(rows.into_iter().map(DbRelease::into_release).collect())
    }

    #[instrument(skip(self))]
    pub async fn release_by_name(&self, name: &str) -> StoreResult<Option<Release>> {
        let rows: Vec<DbRelease> = self
            .select("SELECT * FROM releases WHERE name = $key LIMIT 1", name)
            .await?;
        Ok(rows.into_iter().next().map(DbRelease::into_release))
    }

    #[instrument(skip(self))]
    pub async fn release_by_name_or_version(&self, key: &str) -> StoreResult<Option<Release>> {
        let rows: Vec<DbRelease> = self
            .select(
                "SELECT * FROM releases WHERE name = $key OR version = $key LIMIT 1",
                key,
            )
            .await?;
        Ok(rows.into_iter().next().map(DbRelease::into_release))
    }

    // ========== Packages ==========

    #[instrument(skip(self))]
    pub async fn package_by_name(&self, name: &str) -> StoreResult<Option<Package>> {
        let rows: Vec<Package> = self
            .select("SELECT * FROM packages WHERE name = $key LIMIT 1", name)
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Atomic get-or-create keyed on the package record id.
    #[instrument(skip(self))]
    pub async fn get_or_create_package(&self, name: &str) -> StoreResult<Package> {
        let rows: Vec<Package> = self
            .select(
                "UPSERT type::thing('packages', $key) SET name = $key RETURN AFTER",
                name,
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(format!("failed to upsert package {}", name)))
    }

    /// Number of package rows.
    #[instrument(skip(self))]
    pub async fn package_count(&self) -> StoreResult<usize> {
        let mut result = self.db.query("SELECT * FROM packages").await?;
        let rows: Vec<Package> = result.take(0)?;
        Ok(rows.len())
    }

    // ========== Builds ==========

    #[instrument(skip(self, build), fields(nvr = %build.nvr))]
    pub async fn insert_build(&self, build: Build) -> StoreResult<()> {
        self.get_or_create_package(&build.package).await?;
        let _created: Option<DbBuild> = self
            .db
            .create("builds")
            .content(DbBuild::from(build))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn build_by_nvr(&self, nvr: &str) -> StoreResult<Option<Build>> {
        let rows: Vec<DbBuild> = self
            .select("SELECT * FROM builds WHERE nvr = $key LIMIT 1", nvr)
            .await?;
        Ok(rows.into_iter().next().map(DbBuild::into_build))
    }

    #[instrument(skip(self))]
    pub async fn latest_build_for_package(&self, package: &str) -> StoreResult<Option<Build>> {
        let rows: Vec<DbBuild> = self
            .select(
                "SELECT * FROM builds WHERE package = $key ORDER BY created_at DESC LIMIT 1",
                package,
            )
            .await?;
        Ok(rows.into_iter().next().map(DbBuild::into_build))
    }

    // ========== Updates ==========

    #[instrument(skip(self, update), fields(title = %update.title))]
    pub async fn insert_update(&self, update: Update) -> StoreResult<()> {
        let _created: Option<Update> = self.db.create("updates").content(update).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_by_title(&self, title: &str) -> StoreResult<Option<Update>> {
        let rows: Vec<Update> = self
            .select("SELECT * FROM updates WHERE title = $key LIMIT 1", title)
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self))]
    pub async fn update_by_title_or_alias(&self, key: &str) -> StoreResult<Option<Update>> {
        let rows: Vec<Update> = self
            .select(
                "SELECT * FROM updates WHERE title = $key OR alias = $key LIMIT 1",
                key,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    // ========== Users & Groups ==========

    #[instrument(skip(self, user), fields(name = %user.name))]
    pub async fn insert_user(&self, user: User) -> StoreResult<()> {
        let record = DbUser {
            name: user.name,
            email: user.email,
            member_of: user.groups.into_iter().collect(),
        };
        let _created: Option<DbUser> = self.db.create("users").content(record).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        let rows: Vec<DbUser> = self
            .select("SELECT * FROM users WHERE name = $key LIMIT 1", name)
            .await?;
        Ok(rows.into_iter().next().map(DbUser::into_user))
    }

    #[instrument(skip(self, group), fields(name = %group.name))]
    pub async fn insert_group(&self, group: Group) -> StoreResult<()> {
        let _created: Option<Group> = self.db.create("user_groups").content(group).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn group_by_name(&self, name: &str) -> StoreResult<Option<Group>> {
        let rows: Vec<Group> = self
            .select("SELECT * FROM user_groups WHERE name = $key LIMIT 1", name)
            .await?;
        Ok(rows.into_iter().next())
    }

    // ========== Referenced entities ==========

    pub async fn insert_comment(&self, comment: Comment) -> StoreResult<()> {
        let _created: Option<DbComment> = self
            .db
            .create("comments")
            .content(DbComment::from(comment))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn comment_by_id(&self, id: i64) -> StoreResult<Option<Comment>> {
        let rows: Vec<DbComment> = self
            .select_by_int("SELECT * FROM comments WHERE comment_id = $key LIMIT 1", id)
            .await?;
        Ok(rows.into_iter().next().map(DbComment::into_comment))
    }

    pub async fn insert_bug(&self, bug: Bug) -> StoreResult<()> {
        let _created: Option<Bug> = self.db.create("bugs").content(bug).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn bug_by_id(&self, bug_id: i64) -> StoreResult<Option<Bug>> {
        let rows: Vec<Bug> = self
            .select_by_int("SELECT * FROM bugs WHERE bug_id = $key LIMIT 1", bug_id)
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert_testcase(&self, testcase: TestCase) -> StoreResult<()> {
        let _created: Option<TestCase> = self.db.create("testcases").content(testcase).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn testcase_by_name(&self, name: &str) -> StoreResult<Option<TestCase>> {
        let rows: Vec<TestCase> = self
            .select("SELECT * FROM testcases WHERE name = $key LIMIT 1", name)
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert_stack(&self, stack: Stack) -> StoreResult<()> {
        let _created: Option<Stack> = self.db.create("stacks").content(stack).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stack_by_name(&self, name: &str) -> StoreResult<Option<Stack>> {
        let rows: Vec<Stack> = self
            .select("SELECT * FROM stacks WHERE name = $key LIMIT 1", name)
            .await?;
        Ok(rows.into_iter().next())
    }
}
