//! Admission pipeline.
//!
//! Runs the [`Check`]s in their fixed order against one
//! [`ValidationContext`]. Each check records field errors and returns;
//! the pipeline continues to the next check unless the context was
//! aborted. Infrastructure failures end the run with `Err`.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use update_gate_services::{
    AclService, ChallengeService, SecretChallenge, StaticCatalog, TagService, TestCaseCatalog,
};
use update_gate_state::{DomainStore, User};

use crate::acl::AclBackend;
use crate::checks;
use crate::config::AdmissionConfig;
use crate::context::{Mode, Submission, ValidationContext};
use crate::error::Result;
use crate::obs::{self, AdmissionSpan};
use crate::tags::TagTable;

/// Source of "now" for the expiration window.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    BuildFormat,
    BuildOwnership,
    BuildTags,
    Acl,
    Version,
    Uniqueness,
    Enums,
    Existence,
    Expiration,
    Challenge,
    Requirements,
}

impl Check {
    /// Execution order. Later checks consume what earlier ones derive.
    pub const ORDER: [Check; 11] = [
        Check::BuildFormat,
        Check::BuildOwnership,
        Check::BuildTags,
        Check::Acl,
        Check::Version,
        Check::Uniqueness,
        Check::Enums,
        Check::Existence,
        Check::Expiration,
        Check::Challenge,
        Check::Requirements,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Check::BuildFormat => "build_format",
            Check::BuildOwnership => "build_ownership",
            Check::BuildTags => "build_tags",
            Check::Acl => "acl",
            Check::Version => "version",
            Check::Uniqueness => "uniqueness",
            Check::Enums => "enums",
            Check::Existence => "existence",
            Check::Expiration => "expiration",
            Check::Challenge => "challenge",
            Check::Requirements => "requirements",
        }
    }
}

/// The admission pipeline and the collaborators its checks call.
pub struct Pipeline {
    pub(crate) store: Arc<dyn DomainStore>,
    pub(crate) tags: Arc<dyn TagService>,
    pub(crate) acl: Box<dyn AclBackend>,
    pub(crate) challenge: Option<Arc<dyn ChallengeService>>,
    pub(crate) catalog: Arc<dyn TestCaseCatalog>,
    pub(crate) config: AdmissionConfig,
    pub(crate) clock: Clock,
}

pub struct PipelineBuilder {
    store: Arc<dyn DomainStore>,
    tags: Arc<dyn TagService>,
    config: AdmissionConfig,
    acl_service: Option<Arc<dyn AclService>>,
    acl_backend: Option<Box<dyn AclBackend>>,
    challenge: Option<Arc<dyn ChallengeService>>,
    catalog: Option<Arc<dyn TestCaseCatalog>>,
    clock: Option<Clock>,
}

impl PipelineBuilder {
    pub fn config(mut self, config: AdmissionConfig) -> Self {
        self.config = config;
        self
    }

    /// Client used when the configured backend is `service`.
    pub fn acl_service(mut self, service: Arc<dyn AclService>) -> Self {
        self.acl_service = Some(service);
        self
    }

    /// Use this backend instead of the configured one.
    pub fn acl_backend(mut self, backend: Box<dyn AclBackend>) -> Self {
        self.acl_backend = Some(backend);
        self
    }

    /// Challenge verifier; defaults to a `SecretChallenge` over the
    /// configured secret.
    pub fn challenge(mut self, challenge: Arc<dyn ChallengeService>) -> Self {
        self.challenge = Some(challenge);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn TestCaseCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let acl = match self.acl_backend {
            Some(backend) => backend,
            None => self.config.acl_backend.build(self.acl_service)?,
        };
        let challenge = self.challenge.or_else(|| {
            self.config
                .challenge_secret
                .as_deref()
                .map(|secret| Arc::new(SecretChallenge::new(secret)) as Arc<dyn ChallengeService>)
        });
        Ok(Pipeline {
            store: self.store,
            tags: self.tags,
            acl,
            challenge,
            catalog: self
                .catalog
                .unwrap_or_else(|| Arc::new(StaticCatalog::default()) as Arc<dyn TestCaseCatalog>),
            config: self.config,
            clock: self.clock.unwrap_or_else(|| Arc::new(Utc::now) as Clock),
        })
    }
}

impl Pipeline {
    pub fn builder(store: Arc<dyn DomainStore>, tags: Arc<dyn TagService>) -> PipelineBuilder {
        PipelineBuilder {
            store,
            tags,
            config: AdmissionConfig::default(),
            acl_service: None,
            acl_backend: None,
            challenge: None,
            catalog: None,
            clock: None,
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Validate one submission.
    ///
    /// Returns the context whether or not the submission was admitted;
    /// check [`ValidationContext::is_valid`]. `Err` means a service or the
    /// store failed and the submission was neither admitted nor rejected.
    pub async fn run(
        &self,
        mode: Mode,
        submission: Submission,
        user: Option<User>,
    ) -> Result<ValidationContext> {
        let mode_name = match &mode {
            Mode::New => "new",
            Mode::Edit(_) => "edit",
        };
        let admission = AdmissionSpan::new(mode_name);
        let mut ctx = ValidationContext::new(mode, submission, user);
        self.run_checks(admission.id(), &mut ctx)
            .instrument(admission.span())
            .await?;
        Ok(ctx)
    }

    async fn run_checks(&self, admission_id: &str, ctx: &mut ValidationContext) -> Result<()> {
        let started = Instant::now();
        obs::emit_admission_started(
            admission_id,
            ctx.validated.builds.len(),
            ctx.user.as_ref().map(|u| u.name.as_str()),
        );

        let table = TagTable::load(self.store.as_ref()).await?;
        for check in Check::ORDER {
            let before = ctx.errors().len();
            self.run_check(check, &table, ctx).await?;
            obs::emit_check_finished(
                admission_id,
                check.name(),
                ctx.errors().len() - before,
                ctx.is_aborted(),
            );
            if ctx.is_aborted() {
                break;
            }
        }

        obs::emit_admission_finished(
            admission_id,
            started.elapsed().as_millis() as u64,
            ctx.errors().len(),
            ctx.is_valid(),
        );
        Ok(())
    }

    /// Run a single check. Checks re-derive what they need, so this is
    /// also usable outside the fixed order.
    pub async fn run_check(
        &self,
        check: Check,
        table: &TagTable,
        ctx: &mut ValidationContext,
    ) -> Result<()> {
        match check {
            Check::BuildFormat => checks::builds::build_format(ctx),
            Check::BuildOwnership => checks::builds::build_ownership(self, ctx).await?,
            Check::BuildTags => checks::builds::build_tags(self, table, ctx).await?,
            Check::Acl => checks::builds::acl(self, table, ctx).await?,
            Check::Version => checks::builds::version(self, ctx).await?,
            Check::Uniqueness => checks::builds::uniqueness(ctx),
            Check::Enums => checks::fields::enums(ctx),
            Check::Existence => checks::existence::run_all(self, table, ctx).await?,
            Check::Expiration => checks::fields::expiration(self, ctx),
            Check::Challenge => checks::fields::challenge(self, ctx).await?,
            Check::Requirements => checks::fields::requirements(self, ctx).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use update_gate_services::StaticTagService;
    use update_gate_state::MemoryDomainStore;

    use crate::acl::AclBackendKind;

    #[test]
    fn test_check_order_is_fixed() {
        assert_eq!(Check::ORDER.first(), Some(&Check::BuildFormat));
        assert_eq!(Check::ORDER.last(), Some(&Check::Requirements));
        let acl = Check::ORDER.iter().position(|c| *c == Check::Acl);
        let tags = Check::ORDER.iter().position(|c| *c == Check::BuildTags);
        assert!(tags < acl);
    }

    #[test]
    fn test_builder_needs_acl_client_for_service_backend() {
        let store = Arc::new(MemoryDomainStore::new());
        let tags = Arc::new(StaticTagService::new());

        let result = Pipeline::builder(store.clone(), tags.clone()).build();
        assert!(result.is_err());

        let config = AdmissionConfig {
            acl_backend: AclBackendKind::None,
            challenge_secret: Some("s3cret".to_string()),
            ..AdmissionConfig::default()
        };
        let pipeline = Pipeline::builder(store, tags).config(config).build().unwrap();
        assert!(pipeline.challenge.is_some());
        assert_eq!(pipeline.acl.kind(), AclBackendKind::None);
    }
}
