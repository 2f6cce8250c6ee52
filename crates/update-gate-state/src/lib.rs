//! update-gate-state: domain records and store backends
//!
//! This crate provides the persistence layer the admission pipeline
//! reconciles submissions against: releases and their tags, packages,
//! builds, updates, users and groups, plus the entities referenced by the
//! existence checks.
//!
//! ## Layer 0 - Data/Persistence
//!
//! ## Key Components
//!
//! - `DomainStore`: async lookup trait consumed by the pipeline
//! - `MemoryDomainStore`: in-memory fake seeded from `StoreFixtures`
//! - `SurrealDomainStore`: SurrealDB backend over a `SurrealHandle`

mod error;
pub mod fakes;
mod handle;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::StoreError;
pub use fakes::{MemoryDomainStore, StoreFixtures};
pub use handle::SurrealHandle;
pub use schema::{
    Bug, Build, Comment, Group, Package, Release, ReleaseState, Stack, TestCase, Update,
    UpdateRequest, UpdateSeverity, UpdateStatus, UpdateSuggestion, UpdateType, User,
};
pub use storage_traits::{DomainStore, StoreResult};
pub use surreal_store::SurrealDomainStore;
