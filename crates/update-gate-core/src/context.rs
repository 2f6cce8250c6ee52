//! Per-submission validation state.
//!
//! A [`Submission`] is what the caller hands in. The pipeline turns it into
//! [`ValidatedFields`] inside a [`ValidationContext`], then the checks
//! resolve raw strings into store entities in place, fill per-build
//! [`BuildInfo`], and record [`FieldError`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use update_gate_state::{
    Bug, Build, Comment, DomainStore, Group, Package, Release, ReleaseState, Stack, StoreResult,
    TestCase, Update, UpdateRequest, UpdateSeverity, UpdateStatus, UpdateSuggestion, UpdateType,
    User,
};

use crate::error::ErrorKind;
use crate::nvr::Nvr;
use crate::tags::TagType;

/// Split a free-text list on commas and whitespace, dropping empties.
pub fn tokenize(value: &str) -> Vec<String> {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS
        .get_or_init(|| Regex::new(r"[,\s]+").expect("separator pattern is valid"))
        .split(value)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether the submission creates a new update or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    New,
    /// Edit the update with this title.
    Edit(String),
}

impl Mode {
    pub fn edited(&self) -> Option<&str> {
        match self {
            Mode::New => None,
            Mode::Edit(title) => Some(title),
        }
    }
}

/// Where in the request an offending value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Body,
    Querystring,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub location: Location,
    pub field: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Status a caller should answer with, when a check suggests one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedStatus {
    BadRequest,
    NotFound,
}

impl SuggestedStatus {
    pub fn code(&self) -> u16 {
        match self {
            SuggestedStatus::BadRequest => 400,
            SuggestedStatus::NotFound => 404,
        }
    }
}

/// A value that is either still the raw string from the request or the
/// entity it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Resolvable<R, T> {
    Raw(R),
    Resolved(T),
}

impl<R, T> Resolvable<R, T> {
    pub fn raw(&self) -> Option<&R> {
        match self {
            Resolvable::Raw(raw) => Some(raw),
            Resolvable::Resolved(_) => None,
        }
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Resolvable::Raw(_) => None,
            Resolvable::Resolved(value) => Some(value),
        }
    }
}

/// Resolve an update reference (title or alias) at most once.
///
/// A raw reference is looked up and, when found, replaced in the slot by
/// the update, so later callers get the entity without another lookup.
pub async fn resolve_once<'a>(
    store: &dyn DomainStore,
    slot: &'a mut Resolvable<String, Update>,
) -> StoreResult<Option<&'a Update>> {
    if let Resolvable::Raw(key) = &*slot {
        match store.update_by_title_or_alias(key).await? {
            Some(update) => *slot = Resolvable::Resolved(update),
            None => return Ok(None),
        }
    }
    Ok(slot.resolved())
}

/// Who owns and watches a build's package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct People {
    pub committers: BTreeSet<String>,
    pub watchers: BTreeSet<String>,
}

/// What the checks learned about one submitted build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildInfo {
    pub nvr: Option<Nvr>,
    pub tags: Option<Vec<String>>,
    pub release: Option<Release>,
    pub people: Option<People>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugFeedback {
    pub bug_id: i64,
    #[serde(default)]
    pub karma: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseFeedback {
    pub testcase_name: String,
    #[serde(default)]
    pub karma: i32,
}

/// Feedback whose bug was found and is linked to the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedBugFeedback {
    pub bug: Bug,
    pub karma: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTestCaseFeedback {
    pub testcase: TestCase,
    pub karma: i32,
}

/// Raw request data, as decoded from the caller.
///
/// Every field is optional; checks only look at fields that are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
    pub builds: Vec<String>,
    /// Title of the update being edited
    pub edited: Option<String>,

    pub request: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub suggest: Option<String>,
    #[serde(rename = "type")]
    pub update_type: Option<String>,
    pub state: Option<String>,

    pub packages: Option<Vec<String>>,
    pub updates: Option<Vec<String>>,
    pub releases: Option<Vec<String>>,
    pub release: Option<String>,
    pub groups: Option<Vec<String>>,
    pub user: Option<String>,
    pub update_owner: Option<String>,
    /// Update referenced from the URL (title or alias)
    pub update: Option<String>,
    /// Update id from the URL
    pub update_id: Option<String>,
    /// Comment id from the URL
    pub comment_id: Option<String>,
    pub bug_feedback: Option<Vec<BugFeedback>>,
    pub testcase_feedback: Option<Vec<TestCaseFeedback>>,
    /// Build requested for a buildroot override
    pub nvr: Option<String>,
    pub stack: Option<String>,

    pub candidate_tag: Option<String>,
    pub testing_tag: Option<String>,
    pub stable_tag: Option<String>,
    pub pending_testing_tag: Option<String>,
    pub pending_stable_tag: Option<String>,
    pub override_tag: Option<String>,

    pub expiration_date: Option<DateTime<Utc>>,
    pub email: Option<String>,
    pub captcha_key: Option<String>,
    pub captcha_value: Option<String>,
    pub requirements: Option<String>,
}

impl Submission {
    pub fn mode(&self) -> Mode {
        match &self.edited {
            Some(title) if !title.is_empty() => Mode::Edit(title.clone()),
            _ => Mode::New,
        }
    }
}

/// Submission data as the checks leave it: enums coerced, references
/// resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidatedFields {
    pub builds: Vec<String>,

    pub request: Option<Resolvable<String, UpdateRequest>>,
    pub severity: Option<Resolvable<String, UpdateSeverity>>,
    pub status: Option<Resolvable<String, UpdateStatus>>,
    pub suggest: Option<Resolvable<String, UpdateSuggestion>>,
    #[serde(rename = "type")]
    pub update_type: Option<Resolvable<String, UpdateType>>,
    pub state: Option<Resolvable<String, ReleaseState>>,

    pub packages: Option<Resolvable<Vec<String>, Vec<Package>>>,
    pub updates: Option<Resolvable<Vec<String>, Vec<Update>>>,
    pub releases: Option<Resolvable<Vec<String>, Vec<Release>>>,
    pub release: Option<Resolvable<String, Release>>,
    pub groups: Option<Resolvable<Vec<String>, Vec<Group>>>,
    pub user: Option<Resolvable<String, User>>,
    pub update_owner: Option<Resolvable<String, User>>,
    pub update: Option<Resolvable<String, Update>>,
    pub update_id: Option<String>,
    pub comment_id: Option<String>,
    pub comment: Option<Comment>,
    pub bug_feedback: Option<Resolvable<Vec<BugFeedback>, Vec<ResolvedBugFeedback>>>,
    pub testcase_feedback:
        Option<Resolvable<Vec<TestCaseFeedback>, Vec<ResolvedTestCaseFeedback>>>,
    pub nvr: Option<String>,
    /// Override build, existing or about to be created
    pub build: Option<Build>,
    pub stack: Option<Resolvable<String, Stack>>,

    pub release_tags: BTreeMap<TagType, String>,

    pub expiration_date: Option<DateTime<Utc>>,
    pub email: Option<String>,
    #[serde(skip)]
    pub captcha_key: Option<String>,
    #[serde(skip)]
    pub captcha_value: Option<String>,
    pub requirements: Option<String>,
}

impl From<Submission> for ValidatedFields {
    fn from(s: Submission) -> Self {
        let release_tags = [
            (TagType::Candidate, s.candidate_tag),
            (TagType::Testing, s.testing_tag),
            (TagType::Stable, s.stable_tag),
            (TagType::PendingTesting, s.pending_testing_tag),
            (TagType::PendingStable, s.pending_stable_tag),
            (TagType::Override, s.override_tag),
        ]
        .into_iter()
        .filter_map(|(ty, tag)| tag.filter(|t| !t.is_empty()).map(|t| (ty, t)))
        .collect();

        ValidatedFields {
            builds: s.builds.iter().flat_map(|b| tokenize(b)).collect(),
            request: s.request.map(Resolvable::Raw),
            severity: s.severity.map(Resolvable::Raw),
            status: s.status.map(Resolvable::Raw),
            suggest: s.suggest.map(Resolvable::Raw),
            update_type: s.update_type.map(Resolvable::Raw),
            state: s.state.map(Resolvable::Raw),
            packages: s.packages.map(Resolvable::Raw),
            updates: s.updates.map(Resolvable::Raw),
            releases: s.releases.map(Resolvable::Raw),
            release: s.release.map(Resolvable::Raw),
            groups: s.groups.map(Resolvable::Raw),
            user: s.user.map(Resolvable::Raw),
            update_owner: s.update_owner.map(Resolvable::Raw),
            update: s.update.map(Resolvable::Raw),
            update_id: s.update_id,
            comment_id: s.comment_id,
            comment: None,
            bug_feedback: s.bug_feedback.map(Resolvable::Raw),
            testcase_feedback: s.testcase_feedback.map(Resolvable::Raw),
            nvr: s.nvr,
            build: None,
            stack: s.stack.map(Resolvable::Raw),
            release_tags,
            expiration_date: s.expiration_date,
            email: s.email,
            captcha_key: s.captcha_key,
            captcha_value: s.captcha_value,
            requirements: s.requirements,
        }
    }
}

/// The shared state every check reads and writes.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationContext {
    pub mode: Mode,
    pub user: Option<User>,
    pub validated: ValidatedFields,
    pub build_info: BTreeMap<String, BuildInfo>,
    errors: Vec<FieldError>,
    status: Option<SuggestedStatus>,
    aborted: bool,
}

impl ValidationContext {
    pub fn new(mode: Mode, submission: Submission, user: Option<User>) -> Self {
        let validated = ValidatedFields::from(submission);
        let build_info = validated
            .builds
            .iter()
            .map(|b| (b.clone(), BuildInfo::default()))
            .collect();
        ValidationContext {
            mode,
            user,
            validated,
            build_info,
            errors: Vec::new(),
            status: None,
            aborted: false,
        }
    }

    pub fn add_error(
        &mut self,
        location: Location,
        field: &str,
        kind: ErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldError {
            location,
            field: field.to_string(),
            kind,
            message: message.into(),
        });
    }

    pub fn set_status(&mut self, status: SuggestedStatus) {
        self.status = Some(status);
    }

    /// Stop the pipeline after the current check.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has_error(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn status(&self) -> Option<SuggestedStatus> {
        self.status
    }

    /// Per-build info, created on first access.
    pub fn build_info_mut(&mut self, build: &str) -> &mut BuildInfo {
        self.build_info.entry(build.to_string()).or_default()
    }

    /// Parsed NVR of `build`, parsing it now if no earlier check did.
    pub fn nvr_of(&mut self, build: &str) -> Option<Nvr> {
        let info = self.build_info_mut(build);
        if info.nvr.is_none() {
            info.nvr = Nvr::parse(build).ok();
        }
        info.nvr.clone()
    }
}
