//! Checks over the submitted build list.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use update_gate_state::UpdateStatus;

use super::{edited_release, tags_of};
use crate::acl::has_access;
use crate::context::{Location, Mode, People, SuggestedStatus, ValidationContext};
use crate::error::{ErrorKind, Result};
use crate::nvr::Nvr;
use crate::obs;
use crate::pipeline::Pipeline;
use crate::tags::TagTable;

const FIELD: &str = "builds";

/// Every build must be `name-version-release`. One bad entry empties the
/// whole list.
pub(crate) fn build_format(ctx: &mut ValidationContext) {
    let builds = ctx.validated.builds.clone();
    for build in &builds {
        match Nvr::parse(build) {
            Ok(nvr) => ctx.build_info_mut(build).nvr = Some(nvr),
            Err(err) => {
                ctx.validated.builds.clear();
                ctx.add_error(Location::Body, FIELD, ErrorKind::FormatError, err.to_string());
                ctx.abort();
                return;
            }
        }
    }
}

/// Edits need an existing update that is not frozen; new submissions may
/// not reuse builds that already belong to an update.
pub(crate) async fn build_ownership(
    pipeline: &Pipeline,
    ctx: &mut ValidationContext,
) -> Result<()> {
    match ctx.mode.clone() {
        Mode::Edit(title) => {
            let Some(update) = pipeline.store.update_by_title(&title).await? else {
                ctx.add_error(
                    Location::Body,
                    FIELD,
                    ErrorKind::NotFound,
                    format!("Cannot find update to edit: {}", title),
                );
                ctx.set_status(SuggestedStatus::NotFound);
                ctx.abort();
                return Ok(());
            };

            let is_admin = ctx
                .user
                .as_ref()
                .is_some_and(|u| pipeline.config.is_admin(&u.groups));
            if !is_admin && update.status == UpdateStatus::Stable {
                ctx.add_error(
                    Location::Body,
                    FIELD,
                    ErrorKind::PermissionDenied,
                    "Cannot edit stable updates",
                );
            }
        }
        Mode::New => {
            for nvr in ctx.validated.builds.clone() {
                let attached = pipeline
                    .store
                    .build_by_nvr(&nvr)
                    .await?
                    .and_then(|b| b.update);
                if let Some(update) = attached {
                    debug!(build = %nvr, update = %update, "build already attached");
                    ctx.add_error(
                        Location::Body,
                        FIELD,
                        ErrorKind::OwnershipConflict,
                        format!("Update for {} already exists", nvr),
                    );
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

/// Every build must carry a tag valid for the mode; edits may not pull in
/// builds of another release.
pub(crate) async fn build_tags(
    pipeline: &Pipeline,
    table: &TagTable,
    ctx: &mut ValidationContext,
) -> Result<()> {
    let builds = ctx.validated.builds.clone();
    if builds.is_empty() {
        return Ok(());
    }

    let release = edited_release(pipeline, ctx).await?;
    if release.is_none() {
        if let Some(title) = ctx.mode.edited().map(str::to_string) {
            let message = format!("Cannot find the release of update {}", title);
            ctx.add_error(Location::Body, FIELD, ErrorKind::NotFound, message);
            return Ok(());
        }
    }
    let valid = table.valid_tags_for(&ctx.mode, release.as_ref());

    for build in &builds {
        let tags = tags_of(pipeline, ctx, build).await?;

        if let Some(release) = &release {
            let build_release = table.infer_release(&tags, Some(release));
            if build_release.as_ref().map(|r| &r.name) != Some(&release.name) {
                let found = build_release
                    .map(|r| r.name)
                    .unwrap_or_else(|| "unknown".to_string());
                ctx.add_error(
                    Location::Body,
                    FIELD,
                    ErrorKind::TagMismatch,
                    format!("Cannot add a {} build to an {} update", found, release.name),
                );
                return Ok(());
            }
        }

        if !tags.iter().any(|t| valid.contains(t)) {
            let expected: Vec<&str> = valid.iter().map(String::as_str).collect();
            ctx.add_error(
                Location::Body,
                FIELD,
                ErrorKind::TagMismatch,
                format!(
                    "Invalid tag: {} not tagged with any of {}",
                    build,
                    expected.join(", ")
                ),
            );
        }
    }
    Ok(())
}

/// The caller must be allowed to push every build's package. Any failure
/// aborts the submission.
pub(crate) async fn acl(
    pipeline: &Pipeline,
    table: &TagTable,
    ctx: &mut ValidationContext,
) -> Result<()> {
    let builds = ctx.validated.builds.clone();
    if builds.is_empty() {
        return Ok(());
    }

    let Some(user) = ctx.user.clone() else {
        ctx.add_error(
            Location::Body,
            FIELD,
            ErrorKind::PermissionDenied,
            "Anonymous users may not submit builds",
        );
        ctx.abort();
        return Ok(());
    };
    let edited = edited_release(pipeline, ctx).await?;

    for build in &builds {
        let Some(nvr) = ctx.nvr_of(build) else {
            let message = format!("Build not in name-version-release format: {}", build);
            ctx.add_error(Location::Body, FIELD, ErrorKind::FormatError, message);
            ctx.abort();
            return Ok(());
        };
        let package = pipeline.store.get_or_create_package(&nvr.name).await?;

        let tags = tags_of(pipeline, ctx, build).await?;
        let Some(release) = table.infer_release(&tags, edited.as_ref()) else {
            warn!(build = %build, tags = ?tags, "unable to determine release from tags");
            ctx.add_error(
                Location::Body,
                FIELD,
                ErrorKind::ReleaseInferenceError,
                format!(
                    "Cannot find release associated with tags: {}",
                    tags.join(", ")
                ),
            );
            ctx.abort();
            return Ok(());
        };

        let resolved = pipeline.acl.resolve(&package.name, &release.branch).await?;
        let info = ctx.build_info_mut(build);
        info.people = Some(People {
            committers: resolved.committers.clone(),
            watchers: resolved.watchers.clone(),
        });
        info.release = Some(release.clone());

        if !has_access(&user, &resolved, &pipeline.config.admin_groups) {
            obs::emit_acl_denied(&user.name, &package.name, &release.branch);
            ctx.add_error(
                Location::Body,
                FIELD,
                ErrorKind::PermissionDenied,
                format!(
                    "{} does not have commit access to {}",
                    user.name, package.name
                ),
            );
            ctx.abort();
            return Ok(());
        }
    }
    Ok(())
}

/// No build may be older than the latest recorded build of its package.
pub(crate) async fn version(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    for build in ctx.validated.builds.clone() {
        let Some(nvr) = ctx.nvr_of(&build) else {
            continue;
        };
        let Some(last) = pipeline.store.latest_build_for_package(&nvr.name).await? else {
            continue;
        };
        let Ok(last_nvr) = Nvr::parse(&last.nvr) else {
            warn!(build = %last.nvr, "recorded build has a malformed NVR");
            continue;
        };
        if nvr.label_cmp(&last_nvr) == Ordering::Less {
            ctx.add_error(
                Location::Body,
                FIELD,
                ErrorKind::VersionRegression,
                format!("Invalid build: {} is older than {}", nvr, last.nvr),
            );
            return Ok(());
        }
    }
    Ok(())
}

/// No build twice, and at most one build per package.
pub(crate) fn uniqueness(ctx: &mut ValidationContext) {
    let builds = ctx.validated.builds.clone();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut by_package: HashMap<String, &str> = HashMap::new();

    for build in &builds {
        if !seen.insert(build.as_str()) {
            ctx.add_error(
                Location::Body,
                FIELD,
                ErrorKind::DuplicateBuild,
                format!("Duplicate builds: {}", build),
            );
            return;
        }
        let Some(nvr) = ctx.nvr_of(build) else {
            continue;
        };
        if let Some(other) = by_package.insert(nvr.name.clone(), build.as_str()) {
            ctx.add_error(
                Location::Body,
                FIELD,
                ErrorKind::AmbiguousPackageBuilds,
                format!("Multiple {} builds specified: {} & {}", nvr.name, other, build),
            );
            return;
        }
    }
}
