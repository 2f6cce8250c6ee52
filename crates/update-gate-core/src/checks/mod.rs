//! The individual admission checks.
//!
//! - `builds`: format, ownership, tags, ACL, version, uniqueness
//! - `fields`: enum coercion, expiration window, challenge, requirements
//! - `existence`: referenced-entity lookups
//!
//! A check records errors on the context and returns `Ok`. It calls
//! `ctx.abort()` when later checks cannot proceed without its output.

pub(crate) mod builds;
pub(crate) mod existence;
pub(crate) mod fields;

use update_gate_state::Release;

use crate::context::ValidationContext;
use crate::error::Result;
use crate::pipeline::Pipeline;

/// Tags of `build`, fetched from the tag service unless already known.
pub(crate) async fn tags_of(
    pipeline: &Pipeline,
    ctx: &mut ValidationContext,
    build: &str,
) -> Result<Vec<String>> {
    if let Some(tags) = ctx.build_info.get(build).and_then(|info| info.tags.clone()) {
        return Ok(tags);
    }
    let tags: Vec<String> = pipeline
        .tags
        .list_tags(build)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();
    ctx.build_info_mut(build).tags = Some(tags.clone());
    Ok(tags)
}

/// Release of the update under edit, if editing and both exist.
pub(crate) async fn edited_release(
    pipeline: &Pipeline,
    ctx: &ValidationContext,
) -> Result<Option<Release>> {
    let Some(title) = ctx.mode.edited() else {
        return Ok(None);
    };
    let Some(update) = pipeline.store.update_by_title(title).await? else {
        return Ok(None);
    };
    Ok(pipeline.store.release_by_name(&update.release).await?)
}
