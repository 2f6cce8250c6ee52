//! Checks over scalar submission fields.

use std::str::FromStr;

use chrono::TimeDelta;
use futures::TryStreamExt;
use update_gate_state::{
    ReleaseState, StoreError, UpdateRequest, UpdateSeverity, UpdateStatus, UpdateSuggestion,
    UpdateType,
};

use crate::context::{tokenize, Location, Resolvable, SuggestedStatus, ValidationContext};
use crate::error::{ErrorKind, Result};
use crate::pipeline::Pipeline;

/// Replace a raw enum string with its value. Returns the error message
/// when the string names no value.
fn coerce<E>(
    slot: &mut Option<Resolvable<String, E>>,
    field: &str,
    values: &[&str],
) -> Option<String>
where
    E: FromStr<Err = StoreError>,
{
    let Some(Resolvable::Raw(raw)) = slot.as_ref() else {
        return None;
    };
    match raw.parse::<E>() {
        Ok(value) => {
            *slot = Some(Resolvable::Resolved(value));
            None
        }
        Err(_) => Some(format!(
            "Invalid {} specified: {}. Must be one of {}",
            field,
            raw,
            values.join(", ")
        )),
    }
}

/// Convert the whitelisted string fields into their enum values.
pub(crate) fn enums(ctx: &mut ValidationContext) {
    let fields = &mut ctx.validated;
    let failures = [
        ("request", coerce(&mut fields.request, "request", UpdateRequest::VALUES)),
        ("severity", coerce(&mut fields.severity, "severity", UpdateSeverity::VALUES)),
        ("status", coerce(&mut fields.status, "status", UpdateStatus::VALUES)),
        ("suggest", coerce(&mut fields.suggest, "suggest", UpdateSuggestion::VALUES)),
        ("type", coerce(&mut fields.update_type, "type", UpdateType::VALUES)),
        ("state", coerce(&mut fields.state, "state", ReleaseState::VALUES)),
    ];
    for (field, message) in failures {
        if let Some(message) = message {
            ctx.add_error(Location::Body, field, ErrorKind::InvalidEnumValue, message);
        }
    }
}

/// An expiration date must lie strictly in the future and within the
/// configured number of days.
pub(crate) fn expiration(pipeline: &Pipeline, ctx: &mut ValidationContext) {
    let Some(expiration) = ctx.validated.expiration_date else {
        return;
    };
    let now = (pipeline.clock)();

    if expiration <= now {
        ctx.add_error(
            Location::Body,
            "expiration_date",
            ErrorKind::ExpirationOutOfRange,
            "Expiration date in the past",
        );
        return;
    }

    // A limit past the representable date range bounds nothing.
    let days = pipeline.config.expiration_limit_days;
    let limit = TimeDelta::try_days(days).and_then(|delta| now.checked_add_signed(delta));
    if limit.is_some_and(|limit| expiration > limit) {
        ctx.add_error(
            Location::Body,
            "expiration_date",
            ErrorKind::ExpirationOutOfRange,
            format!("Expiration date may not be longer than {} days", days),
        );
    }
}

/// Anonymous submissions must answer the challenge when a secret is
/// configured. The key and value never survive into the validated fields.
pub(crate) async fn challenge(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let key = ctx.validated.captcha_key.take().filter(|k| !k.is_empty());
    let value = ctx.validated.captcha_value.take().filter(|v| !v.is_empty());

    let anonymous =
        ctx.user.is_none() && ctx.validated.email.as_deref().map_or(true, str::is_empty);
    if !anonymous || pipeline.config.challenge_secret.is_none() {
        return Ok(());
    }
    let Some(service) = &pipeline.challenge else {
        return Ok(());
    };

    let (key, value) = match (key, value) {
        (None, _) => {
            reject_challenge(ctx, "captcha_key", "You must provide a captcha_key.");
            return Ok(());
        }
        (_, None) => {
            reject_challenge(ctx, "captcha_value", "You must provide a captcha_value.");
            return Ok(());
        }
        (Some(key), Some(value)) => (key, value),
    };

    if !service.verify(&key, &value).await? {
        reject_challenge(ctx, "captcha_value", "Incorrect response to the captcha.");
    }
    Ok(())
}

fn reject_challenge(ctx: &mut ValidationContext, field: &str, message: &str) {
    ctx.add_error(Location::Body, field, ErrorKind::ChallengeFailed, message);
    ctx.set_status(SuggestedStatus::BadRequest);
}

/// Every requirement token must name a known test case.
pub(crate) async fn requirements(pipeline: &Pipeline, ctx: &mut ValidationContext) -> Result<()> {
    let Some(requirements) = ctx.validated.requirements.clone() else {
        return Ok(());
    };
    let tokens = tokenize(&requirements);
    if tokens.is_empty() {
        return Ok(());
    }

    let known: Vec<String> = pipeline.catalog.test_case_names().try_collect().await?;
    if let Some(unknown) = tokens.iter().find(|t| !known.contains(t)) {
        ctx.add_error(
            Location::Querystring,
            "requirements",
            ErrorKind::InvalidReference,
            format!(
                "Invalid requirement specified: {}.  Must be one of {}",
                unknown,
                known.join(", ")
            ),
        );
        ctx.set_status(SuggestedStatus::BadRequest);
    }
    Ok(())
}
