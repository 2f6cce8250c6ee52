//! Referenced-entity existence checks.
//!
//! Each check only runs when its field is present. Checks are independent:
//! a failure records one error naming every unresolved value and the next
//! check still runs.

use std::collections::BTreeSet;
use std::future::Future;

use tracing::debug;
use update_gate_state::{Build, StoreResult};

use crate::context::{
    resolve_once, Location, Resolvable, ResolvedBugFeedback, ResolvedTestCaseFeedback,
    SuggestedStatus, ValidationContext,
};
use crate::error::{ErrorKind, Result};
use crate::nvr::Nvr;
use crate::pipeline::Pipeline;
use crate::tags::{TagTable, TagType};

pub(crate) async fn run_all(
    pipeline: &Pipeline,
    table: &TagTable,
    ctx: &mut ValidationContext,
) -> Result<()> {
    packages(pipeline, ctx).await?;
    updates(pipeline, ctx).await?;
    releases(pipeline, ctx).await?;
    release(pipeline, ctx).await?;
    groups(pipeline, ctx).await?;
    users(pipeline, ctx).await?;
    update(pipeline, ctx).await?;
    update_id(pipeline, ctx).await?;
    bug_feedback(pipeline, ctx).await?;
    testcase_feedback(pipeline, ctx).await?;
    comment_id(pipeline, ctx).await?;
    override_build(pipeline, table, ctx).await?;
    stack(pipeline, ctx).await?;
    release_tags(pipeline, ctx).await?;
    Ok(())
}

/// Look up every name; returns what was found and what was not.
async fn resolve_names<T, F, Fut>(names: &[String], lookup: F) -> Result<(Vec<T>, Vec<String>)>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = StoreResult<Option<T>>>,
{
    let mut found = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match lookup(name.clone()).await? {
            Some(value) => found.push(value),
            None => missing.push(name.clone()),
        }
    }
    Ok((found, missing))
}

fn invalid_list(ctx: &mut ValidationContext, field: &str, label: &str, missing: &[String]) {
    ctx.add_error(
        Location::Querystring,
        field,
        ErrorKind::InvalidReference,
        format!("Invalid {} specified: {}", label, missing.join(", ")),
    );
}

/// Feedback karma is a single vote: -1, 0 or 1.
fn valid_karma(ctx: &mut ValidationContext, field: &str, karma: i32, target: &str) -> bool {
    if (-1..=1).contains(&karma) {
        return true;
    }
    ctx.add_error(
        Location::Body,
        field,
        ErrorKind::InvalidReference,
        format!("Invalid karma {} for {}. Must be -1, 0 or 1", karma, target),
    );
    false
}

async fn packages(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(Resolvable::Raw(names)) = ctx.validated.packages.clone() else {
        return Ok(());
    };
    let store = pipeline.store.as_ref();
    let (found, missing) =
        resolve_names(&names, move |n: String| async move { store.package_by_name(&n).await })
            .await?;
    if missing.is_empty() {
        ctx.validated.packages = Some(Resolvable::Resolved(found));
    } else {
        invalid_list(ctx, "packages", "packages", &missing);
    }
    Ok(())
}

/// Updates are named by title or alias.
async fn updates(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(Resolvable::Raw(names)) = ctx.validated.updates.clone() else {
        return Ok(());
    };
    let store = pipeline.store.as_ref();
    let (found, missing) = resolve_names(&names, move |n: String| async move {
        store.update_by_title_or_alias(&n).await
    })
    .await?;
    if missing.is_empty() {
        ctx.validated.updates = Some(Resolvable::Resolved(found));
    } else {
        invalid_list(ctx, "updates", "updates", &missing);
    }
    Ok(())
}

/// Releases are named by name or version.
async fn releases(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(Resolvable::Raw(names)) = ctx.validated.releases.clone() else {
        return Ok(());
    };
    let store = pipeline.store.as_ref();
    let (found, missing) = resolve_names(&names, move |n: String| async move {
        store.release_by_name_or_version(&n).await
    })
    .await?;
    if missing.is_empty() {
        ctx.validated.releases = Some(Resolvable::Resolved(found));
    } else {
        invalid_list(ctx, "releases", "releases", &missing);
    }
    Ok(())
}

async fn release(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(Resolvable::Raw(name)) = ctx.validated.release.clone() else {
        return Ok(());
    };
    match pipeline.store.release_by_name(&name).await? {
        Some(release) => ctx.validated.release = Some(Resolvable::Resolved(release)),
        None => invalid_list(ctx, "release", "release", &[name]),
    }
    Ok(())
}

async fn groups(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(Resolvable::Raw(names)) = ctx.validated.groups.clone() else {
        return Ok(());
    };
    let store = pipeline.store.as_ref();
    let (found, missing) =
        resolve_names(&names, move |n: String| async move { store.group_by_name(&n).await })
            .await?;
    if missing.is_empty() {
        ctx.validated.groups = Some(Resolvable::Resolved(found));
    } else {
        invalid_list(ctx, "groups", "groups", &missing);
    }
    Ok(())
}

/// `user` and `update_owner` both name a user account.
async fn users(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    if let Some(Resolvable::Raw(name)) = ctx.validated.user.clone() {
        match pipeline.store.user_by_name(&name).await? {
            Some(user) => ctx.validated.user = Some(Resolvable::Resolved(user)),
            None => invalid_list(ctx, "user", "user", &[name]),
        }
    }
    if let Some(Resolvable::Raw(name)) = ctx.validated.update_owner.clone() {
        match pipeline.store.user_by_name(&name).await? {
            Some(user) => ctx.validated.update_owner = Some(Resolvable::Resolved(user)),
            None => invalid_list(ctx, "update_owner", "user", &[name]),
        }
    }
    Ok(())
}

/// The update named in the URL must exist.
async fn update(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(slot) = ctx.validated.update.as_mut() else {
        return Ok(());
    };
    if resolve_once(pipeline.store.as_ref(), slot).await?.is_some() {
        return Ok(());
    }
    let name = slot.raw().cloned().unwrap_or_default();
    ctx.add_error(
        Location::Url,
        "update",
        ErrorKind::NotFound,
        format!("Invalid update specified: {}", name),
    );
    ctx.set_status(SuggestedStatus::NotFound);
    Ok(())
}

async fn update_id(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(id) = ctx.validated.update_id.clone() else {
        return Ok(());
    };
    match pipeline.store.update_by_title_or_alias(&id).await? {
        Some(update) => ctx.validated.update = Some(Resolvable::Resolved(update)),
        None => {
            ctx.add_error(Location::Url, "id", ErrorKind::NotFound, "Invalid update id");
            ctx.set_status(SuggestedStatus::NotFound);
        }
    }
    Ok(())
}

/// Resolve the update feedback refers to, recording a 404 when it is
/// missing.
async fn feedback_target(
    pipeline: &Pipeline,
    ctx: &mut ValidationContext,
) -> Result<Option<update_gate_state::Update>> {
    let update = match ctx.validated.update.as_mut() {
        Some(slot) => resolve_once(pipeline.store.as_ref(), slot).await?.cloned(),
        None => None,
    };
    if update.is_none() {
        ctx.add_error(Location::Url, "id", ErrorKind::NotFound, "Invalid update");
        ctx.set_status(SuggestedStatus::NotFound);
    }
    Ok(update)
}

/// Bug feedback may only name bugs linked to the update.
async fn bug_feedback(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(Resolvable::Raw(items)) = ctx.validated.bug_feedback.clone() else {
        return Ok(());
    };
    let Some(update) = feedback_target(pipeline, ctx).await? else {
        return Ok(());
    };

    let mut resolved = Vec::new();
    let mut bad = Vec::new();
    let mut karma_ok = true;
    for item in items {
        let target = format!("bug {}", item.bug_id);
        if !valid_karma(ctx, "bug_feedback", item.karma, &target) {
            karma_ok = false;
            continue;
        }
        match pipeline.store.bug_by_id(item.bug_id).await? {
            Some(bug) if bug.updates.contains(&update.title) => resolved.push(ResolvedBugFeedback {
                bug,
                karma: item.karma,
            }),
            _ => bad.push(item.bug_id.to_string()),
        }
    }

    if !bad.is_empty() {
        invalid_list(ctx, "bug_feedback", "bug ids", &bad);
    } else if karma_ok {
        ctx.validated.bug_feedback = Some(Resolvable::Resolved(resolved));
    }
    Ok(())
}

/// Test case feedback may only name test cases of the update's packages.
async fn testcase_feedback(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(Resolvable::Raw(items)) = ctx.validated.testcase_feedback.clone() else {
        return Ok(());
    };
    let Some(update) = feedback_target(pipeline, ctx).await? else {
        return Ok(());
    };

    let mut packages = BTreeSet::new();
    for nvr in &update.builds {
        match pipeline.store.build_by_nvr(nvr).await? {
            Some(build) => {
                packages.insert(build.package);
            }
            None => {
                if let Ok(parsed) = Nvr::parse(nvr) {
                    packages.insert(parsed.name);
                }
            }
        }
    }

    let mut resolved = Vec::new();
    let mut bad = Vec::new();
    let mut karma_ok = true;
    for item in items {
        let target = format!("test case {}", item.testcase_name);
        if !valid_karma(ctx, "testcase_feedback", item.karma, &target) {
            karma_ok = false;
            continue;
        }
        match pipeline.store.testcase_by_name(&item.testcase_name).await? {
            Some(testcase) if packages.contains(&testcase.package) => {
                resolved.push(ResolvedTestCaseFeedback {
                    testcase,
                    karma: item.karma,
                })
            }
            _ => bad.push(item.testcase_name),
        }
    }

    if !bad.is_empty() {
        invalid_list(ctx, "testcase_feedback", "testcase names", &bad);
    } else if karma_ok {
        ctx.validated.testcase_feedback = Some(Resolvable::Resolved(resolved));
    }
    Ok(())
}

async fn comment_id(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(raw) = ctx.validated.comment_id.clone() else {
        return Ok(());
    };
    let Ok(id) = raw.trim().parse::<i64>() else {
        ctx.add_error(
            Location::Url,
            "id",
            ErrorKind::InvalidReference,
            "Comment id must be an int",
        );
        ctx.set_status(SuggestedStatus::BadRequest);
        return Ok(());
    };
    match pipeline.store.comment_by_id(id).await? {
        Some(comment) => ctx.validated.comment = Some(comment),
        None => {
            ctx.add_error(Location::Url, "id", ErrorKind::NotFound, "Invalid comment id");
            ctx.set_status(SuggestedStatus::NotFound);
        }
    }
    Ok(())
}

/// A buildroot override build must belong to a release and be tagged as
/// that release's candidate or testing build. Unknown builds are prepared
/// but not stored.
async fn override_build(
    pipeline: &Pipeline,
    table: &TagTable,
    ctx: &mut ValidationContext,
) -> Result<()> {
    let Some(nvr) = ctx.validated.nvr.clone() else {
        return Ok(());
    };

    let existing = pipeline.store.build_by_nvr(&nvr).await?;
    let is_new = existing.is_none();
    let mut build = match existing {
        Some(build) => build,
        None => match Nvr::parse(&nvr) {
            Ok(parsed) => Build::new(&nvr, &parsed.name),
            Err(err) => {
                ctx.add_error(Location::Body, "nvr", ErrorKind::FormatError, err.to_string());
                return Ok(());
            }
        },
    };

    let tags: Vec<String> = pipeline
        .tags
        .list_tags(&nvr)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();
    let known_release = match &build.release {
        Some(name) => pipeline.store.release_by_name(name).await?,
        None => None,
    };
    let release = match known_release {
        Some(release) => release,
        None => {
            let promotable: BTreeSet<&String> = table
                .tags_of_type(TagType::Candidate)
                .iter()
                .chain(table.tags_of_type(TagType::Testing))
                .collect();
            let candidates: Vec<&String> =
                tags.iter().filter(|t| promotable.contains(t)).collect();
            match table.infer_release(&candidates, None) {
                Some(release) => {
                    build.release = Some(release.name.clone());
                    release
                }
                None => {
                    let message = if is_new {
                        "Invalid build"
                    } else {
                        "Invalid build.  Couldn't determine release from build tags."
                    };
                    ctx.add_error(
                        Location::Body,
                        "nvr",
                        ErrorKind::ReleaseInferenceError,
                        message,
                    );
                    return Ok(());
                }
            }
        }
    };

    let promotable = tags
        .iter()
        .any(|t| *t == release.candidate_tag || *t == release.testing_tag);
    if !promotable {
        ctx.add_error(
            Location::Body,
            "nvr",
            ErrorKind::TagMismatch,
            "Invalid build.  It must be tagged as either candidate or testing.",
        );
        return Ok(());
    }

    debug!(build = %nvr, release = %release.name, is_new, "override build accepted");
    ctx.validated.build = Some(build);
    Ok(())
}

async fn stack(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(Resolvable::Raw(name)) = ctx.validated.stack.clone() else {
        return Ok(());
    };
    match pipeline.store.stack_by_name(&name).await? {
        Some(stack) => ctx.validated.stack = Some(Resolvable::Resolved(stack)),
        None => {
            ctx.add_error(
                Location::Querystring,
                "stack",
                ErrorKind::NotFound,
                format!("Invalid stack specified: {}", name),
            );
            ctx.set_status(SuggestedStatus::NotFound);
        }
    }
    Ok(())
}

/// Release tag fields must name tags the build system knows.
async fn release_tags(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let tags = ctx.validated.release_tags.clone();
    for (ty, tag) in tags {
        match pipeline.tags.get_tag(&tag).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                ctx.validated.release_tags.remove(&ty);
                ctx.add_error(
                    Location::Body,
                    ty.field_name(),
                    ErrorKind::InvalidReference,
                    format!("Invalid tag: {}", tag),
                );
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
