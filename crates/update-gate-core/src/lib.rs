//! update-gate core library
//!
//! Decides whether an update submission may be admitted: builds are parsed
//! as NVRs, classified by tag, checked against package ACLs, and every
//! referenced entity is resolved. See [`Pipeline::run`].

pub mod acl;
mod checks;
pub mod config;
pub mod context;
pub mod error;
pub mod nvr;
pub mod obs;
pub mod pipeline;
pub mod tags;
pub mod telemetry;

pub use acl::{has_access, AclBackend, AclBackendKind, OpenAcl, ResolvedAcl, ServiceAcl, StaticAcl};
pub use config::{AdmissionConfig, DEFAULT_ADMIN_GROUPS, DEFAULT_EXPIRATION_LIMIT_DAYS};
pub use context::{
    resolve_once, tokenize, BugFeedback, BuildInfo, FieldError, Location, Mode, People,
    Resolvable, ResolvedBugFeedback, ResolvedTestCaseFeedback, SuggestedStatus, Submission,
    TestCaseFeedback, ValidatedFields, ValidationContext,
};
pub use error::{AdmissionError, ErrorKind, Result};
pub use nvr::{rpmvercmp, Nvr, NvrError};
pub use obs::{
    emit_acl_denied, emit_admission_finished, emit_admission_started, emit_check_finished,
    AdmissionSpan,
};
pub use pipeline::{Check, Clock, Pipeline, PipelineBuilder};
pub use tags::{TagTable, TagType};
pub use telemetry::init_tracing;

pub use update_gate_services::{
    AclService, ChallengeService, HttpTagService, PkgdbClient, Pushers, SecretChallenge,
    ServiceEndpoints, ServiceError, StaticAclService, StaticCatalog, StaticTagService, TagInfo,
    TagService, TaskotronCatalog, TestCaseCatalog,
};
pub use update_gate_state::{
    Build, DomainStore, MemoryDomainStore, Release, StoreError, StoreFixtures, SurrealDomainStore,
    SurrealHandle, Update, UpdateStatus, User,
};
