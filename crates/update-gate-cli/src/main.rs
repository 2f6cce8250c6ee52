//! update-gate - admission checks for package update submissions
//!
//! ## Commands
//!
//! - `check`: Run the admission pipeline over a JSON submission
//! - `nvr parse`: Split a build into name, version and release
//! - `nvr compare`: Order two builds by version and release

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, Level};

use update_gate_core::{
    AdmissionConfig, DomainStore, HttpTagService, MemoryDomainStore, Nvr, Pipeline, PkgdbClient,
    ServiceEndpoints, StaticAclService, StaticCatalog, StaticTagService, StoreFixtures,
    Submission, SurrealDomainStore, SurrealHandle, TaskotronCatalog, User, ValidationContext,
};

#[derive(Parser)]
#[command(name = "update-gate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Admission checks for package update submissions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a submission and print the resulting context as JSON
    ///
    /// Exits with status 1 when the submission is rejected.
    Check {
        /// Path to the submission (JSON)
        #[arg(short, long)]
        submission: PathBuf,

        /// Seed data for an in-memory store and static services (JSON).
        /// Without it the SurrealDB store and HTTP services are used.
        #[arg(short, long)]
        fixtures: Option<PathBuf>,

        /// Admission settings (TOML); defaults to UPDATE_GATE_* variables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Submitting user; anonymous when omitted
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Build identifier helpers
    Nvr {
        #[command(subcommand)]
        action: NvrAction,
    },
}

#[derive(Subcommand)]
enum NvrAction {
    /// Print the parts of a build as JSON
    Parse {
        /// Build in name-version-release form
        build: String,
    },
    /// Compare two builds by version, then release
    Compare { a: String, b: String },
}

/// Everything `check --fixtures` needs in one file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Fixtures {
    #[serde(flatten)]
    store: StoreFixtures,
    /// Build and tag data standing in for the build system
    koji: StaticTagService,
    /// Package pushers standing in for the package database
    acl: StaticAclService,
    /// Known test case names
    testcases: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    update_gate_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Check {
            submission,
            fixtures,
            config,
            user,
        } => {
            let ctx = cmd_check(
                &submission,
                fixtures.as_deref(),
                config.as_deref(),
                user.as_deref(),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&ctx)?);
            if !ctx.is_valid() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Nvr { action } => match action {
            NvrAction::Parse { build } => cmd_nvr_parse(&build),
            NvrAction::Compare { a, b } => cmd_nvr_compare(&a, &b),
        },
    }
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn load_config(path: Option<&Path>) -> Result<AdmissionConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).with_context(|| format!("Invalid TOML in {:?}", path))
        }
        None => AdmissionConfig::from_env().context("Invalid UPDATE_GATE_* configuration"),
    }
}

/// Build the pipeline over fixtures, or over the live store and services.
async fn build_pipeline(
    fixtures: Option<&Path>,
    config: AdmissionConfig,
) -> Result<(Pipeline, Arc<dyn DomainStore>)> {
    match fixtures {
        Some(path) => {
            let fixtures: Fixtures = read_json_file(path)?;
            let store: Arc<dyn DomainStore> = Arc::new(
                MemoryDomainStore::from_fixtures(fixtures.store)
                    .context("Failed to seed the in-memory store")?,
            );
            let pipeline = Pipeline::builder(store.clone(), Arc::new(fixtures.koji))
                .config(config)
                .acl_service(Arc::new(fixtures.acl))
                .catalog(Arc::new(StaticCatalog::new(fixtures.testcases)))
                .build()?;
            Ok((pipeline, store))
        }
        None => {
            let handle = SurrealHandle::setup_from_env()
                .await
                .context("Failed to connect to the update-gate database")?;
            let store: Arc<dyn DomainStore> = Arc::new(SurrealDomainStore::new(Arc::new(handle)));
            let endpoints = ServiceEndpoints::from_env();
            info!(
                tags = %endpoints.tag_url,
                acl = %endpoints.acl_url,
                catalog = %endpoints.catalog_url,
                "using live services"
            );
            let tags = Arc::new(HttpTagService::new(&endpoints)?);
            let pipeline = Pipeline::builder(store.clone(), tags)
                .config(config)
                .acl_service(Arc::new(PkgdbClient::new(&endpoints)?))
                .catalog(Arc::new(TaskotronCatalog::new(&endpoints)?))
                .build()?;
            Ok((pipeline, store))
        }
    }
}

/// Run the admission pipeline over one submission file.
async fn cmd_check(
    submission: &Path,
    fixtures: Option<&Path>,
    config: Option<&Path>,
    user: Option<&str>,
) -> Result<ValidationContext> {
    let submission: Submission = read_json_file(submission)?;
    let config = load_config(config)?;
    let (pipeline, store) = build_pipeline(fixtures, config).await?;

    let user = match user {
        Some(name) => Some(
            store
                .user_by_name(name)
                .await?
                .unwrap_or_else(|| User::new(name)),
        ),
        None => None,
    };

    let mode = submission.mode();
    let ctx = pipeline
        .run(mode, submission, user)
        .await
        .context("Admission could not be decided")?;

    info!(
        admitted = ctx.is_valid(),
        errors = ctx.errors().len(),
        "admission decided"
    );
    Ok(ctx)
}

fn cmd_nvr_parse(build: &str) -> Result<()> {
    let nvr = Nvr::parse(build)?;
    println!("{}", serde_json::to_string_pretty(&nvr)?);
    Ok(())
}

fn compare_builds(a: &str, b: &str) -> Result<Ordering> {
    let left = Nvr::parse(a)?;
    let right = Nvr::parse(b)?;
    Ok(left.label_cmp(&right))
}

fn cmd_nvr_compare(a: &str, b: &str) -> Result<()> {
    let symbol = match compare_builds(a, b)? {
        Ordering::Less => "<",
        Ordering::Equal => "==",
        Ordering::Greater => ">",
    };
    println!("{} {} {}", a, symbol, b);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use update_gate_core::ErrorKind;

    fn fixtures_json() -> serde_json::Value {
        json!({
            "releases": [{
                "name": "F30",
                "long_name": "Fedora 30",
                "version": "30",
                "branch": "f30",
                "id_prefix": "FEDORA",
                "dist_tag": "f30",
                "candidate_tag": "f30-updates-candidate",
                "testing_tag": "f30-updates-testing",
                "stable_tag": "f30-updates",
                "pending_testing_tag": "f30-updates-testing-pending",
                "pending_stable_tag": "f30-updates-pending",
                "override_tag": "f30-override",
                "state": "current",
                "created_at": "2019-04-30T00:00:00Z"
            }],
            "users": [{"name": "ralph", "groups": ["packager"]}],
            "koji": {
                "builds": {"foo-1.0-1.fc30": ["f30-updates-candidate"]}
            },
            "acl": {
                "packages": {"foo": {"committers": ["ralph"]}}
            },
            "testcases": ["depcheck"]
        })
    }

    fn write(dir: &Path, name: &str, value: &serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_check_admits_committer_build() {
        let dir = tempfile::tempdir().unwrap();
        let fixtures = write(dir.path(), "fixtures.json", &fixtures_json());
        let submission = write(
            dir.path(),
            "submission.json",
            &json!({"builds": ["foo-1.0-1.fc30"], "requirements": "depcheck"}),
        );
        let config = dir.path().join("gate.toml");
        std::fs::write(&config, "acl_backend = \"service\"\n").unwrap();

        let ctx = cmd_check(&submission, Some(&fixtures), Some(&config), Some("ralph"))
            .await
            .unwrap();

        assert!(ctx.is_valid(), "unexpected errors: {:?}", ctx.errors());
        let rendered = serde_json::to_value(&ctx).unwrap();
        assert_eq!(
            rendered["build_info"]["foo-1.0-1.fc30"]["release"]["name"],
            "F30"
        );
    }

    #[tokio::test]
    async fn test_check_rejects_non_committer() {
        let dir = tempfile::tempdir().unwrap();
        let fixtures = write(dir.path(), "fixtures.json", &fixtures_json());
        let submission = write(
            dir.path(),
            "submission.json",
            &json!({"builds": ["foo-1.0-1.fc30"]}),
        );
        let config = dir.path().join("gate.toml");
        std::fs::write(&config, "acl_backend = \"pkgdb\"\n").unwrap();

        let ctx = cmd_check(&submission, Some(&fixtures), Some(&config), Some("mallory"))
            .await
            .unwrap();

        assert!(!ctx.is_valid());
        assert!(ctx.has_error(ErrorKind::PermissionDenied));
    }

    #[tokio::test]
    async fn test_check_reports_unreadable_submission() {
        let dir = tempfile::tempdir().unwrap();
        let fixtures = write(dir.path(), "fixtures.json", &fixtures_json());
        let submission = dir.path().join("submission.json");
        std::fs::write(&submission, "{not json").unwrap();

        let err = cmd_check(&submission, Some(&fixtures), None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_load_config_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.toml");
        std::fs::write(
            &path,
            "admin_groups = [\"releng\"]\nacl_backend = \"none\"\nexpiration_limit_days = 14\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.expiration_limit_days, 14);
        assert!(config.admin_groups.contains("releng"));
        assert!(!config.admin_groups.contains("provenpackager"));
    }

    #[test]
    fn test_compare_builds() {
        assert_eq!(
            compare_builds("foo-1.0-1.fc30", "foo-1.0-2.fc30").unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_builds("foo-1.10-1", "foo-1.9-1").unwrap(),
            Ordering::Greater
        );
        assert!(compare_builds("foo", "foo-1-1").is_err());
    }
}
