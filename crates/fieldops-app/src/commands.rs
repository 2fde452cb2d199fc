use std::io::Write;

use fieldops_domain::{group_by_date_bucket, TicketKey};
use fieldops_engine::{
    build_store_digests, DispatchError, RescheduleOutcome, RescheduleRequest, ResolutionMode,
};
use serde_json::json;
use tracing::info;

use crate::cli::{Command, QueryArgs};
use crate::composition::AppContext;
use crate::error::AppError;
use crate::render;

/// Process outcome of a command that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    /// At least one key failed.
    PartialFailure,
    /// Conflicts were found and no resolution mode was given.
    ConflictsPending,
}

impl CommandOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::PartialFailure => 1,
            Self::ConflictsPending => 2,
        }
    }
}

pub async fn run_command<W: Write>(
    command: &Command,
    json: bool,
    context: &AppContext,
    out: &mut W,
) -> Result<CommandOutcome, AppError> {
    match command {
        Command::Stores(args) => stores(args, json, context, out).await,
        Command::Schedule(args) => schedule(args, json, context, out).await,
        Command::Reschedule {
            date,
            on_conflict,
            keys,
        } => {
            let request = RescheduleRequest::new(parse_keys(keys), *date);
            reschedule(request, on_conflict.map(Into::into), json, context, out).await
        }
        Command::Transition { status, keys } => {
            transition(&parse_keys(keys), status, json, context, out).await
        }
        Command::Check => check(json, context, out).await,
    }
}

async fn stores<W: Write>(
    args: &QueryArgs,
    json: bool,
    context: &AppContext,
    out: &mut W,
) -> Result<CommandOutcome, AppError> {
    let queries = context.resolve_queries(args)?;
    let outcome = context.engine.fetch_many(&queries).await?;
    let digests = build_store_digests(
        &outcome.tickets,
        context.age_thresholds,
        context.status_thresholds,
        context.now,
    );
    info!(
        tickets = outcome.tickets.len(),
        stores = digests.len(),
        "built store digests"
    );

    if json {
        render::write_json(
            out,
            &json!({ "stores": digests, "dropped_records": outcome.rejected.len() }),
        )?;
    } else {
        render::render_store_digests(out, &digests, outcome.rejected.len())?;
    }
    Ok(CommandOutcome::Success)
}

async fn schedule<W: Write>(
    args: &QueryArgs,
    json: bool,
    context: &AppContext,
    out: &mut W,
) -> Result<CommandOutcome, AppError> {
    let queries = context.resolve_queries(args)?;
    let outcome = context.engine.fetch_many(&queries).await?;
    let buckets = group_by_date_bucket(&outcome.tickets, context.target_offset);

    if json {
        render::write_json(
            out,
            &json!({ "buckets": buckets, "dropped_records": outcome.rejected.len() }),
        )?;
    } else {
        render::render_schedule(out, &buckets, outcome.rejected.len())?;
    }
    Ok(CommandOutcome::Success)
}

async fn reschedule<W: Write>(
    request: RescheduleRequest,
    mode: Option<ResolutionMode>,
    json: bool,
    context: &AppContext,
    out: &mut W,
) -> Result<CommandOutcome, AppError> {
    let current_dates = context.engine.current_schedule(&request.keys).await?;
    let request = request.with_current_dates(current_dates);

    match context.dispatcher.batch_reschedule(&request, mode).await {
        Ok(RescheduleOutcome::Cancelled { conflicts }) => {
            if json {
                render::write_json(out, &json!({ "cancelled": true, "conflicts": conflicts }))?;
            } else {
                render::render_conflicts(out, &conflicts)?;
                writeln!(out, "Reschedule aborted; nothing was changed.")?;
            }
            Ok(CommandOutcome::Success)
        }
        Ok(RescheduleOutcome::Applied {
            result,
            conflicts,
            skipped,
        }) => {
            if json {
                render::write_json(
                    out,
                    &json!({ "result": result, "conflicts": conflicts, "skipped": skipped }),
                )?;
            } else {
                render::render_batch_result(out, "reschedule", &result, &skipped)?;
            }
            Ok(batch_outcome(result.failures.is_empty()))
        }
        Err(DispatchError::ConflictDetected(conflicts)) => {
            if json {
                render::write_json(out, &json!({ "conflicts": conflicts }))?;
            } else {
                render::render_conflicts(out, &conflicts)?;
                writeln!(
                    out,
                    "Re-run with --on-conflict abort, overwrite or skip to proceed."
                )?;
            }
            Ok(CommandOutcome::ConflictsPending)
        }
        Err(DispatchError::NothingToDo(reason)) => nothing_to_do(&reason, json, out),
        Err(error) => Err(error.into()),
    }
}

async fn transition<W: Write>(
    keys: &[TicketKey],
    status: &str,
    json: bool,
    context: &AppContext,
    out: &mut W,
) -> Result<CommandOutcome, AppError> {
    match context.dispatcher.batch_transition(keys, status).await {
        Ok(result) => {
            if json {
                render::write_json(out, &result)?;
            } else {
                render::render_batch_result(out, "transition", &result, &[])?;
            }
            Ok(batch_outcome(result.failures.is_empty()))
        }
        Err(DispatchError::NothingToDo(reason)) => nothing_to_do(&reason, json, out),
        Err(error) => Err(error.into()),
    }
}

async fn check<W: Write>(
    json: bool,
    context: &AppContext,
    out: &mut W,
) -> Result<CommandOutcome, AppError> {
    context.store.health_check().await?;
    let base_url = context.config.tracker.base_url.as_str();
    if json {
        render::write_json(
            out,
            &json!({ "store": context.store.store_key(), "base_url": base_url, "healthy": true }),
        )?;
    } else {
        writeln!(out, "Tracker at {base_url} is reachable and accepted the credentials.")?;
    }
    Ok(CommandOutcome::Success)
}

fn nothing_to_do<W: Write>(
    reason: &str,
    json: bool,
    out: &mut W,
) -> Result<CommandOutcome, AppError> {
    if json {
        render::write_json(out, &json!({ "nothing_to_do": reason }))?;
    } else {
        writeln!(out, "Nothing to do: {reason}")?;
    }
    Ok(CommandOutcome::Success)
}

fn batch_outcome(all_succeeded: bool) -> CommandOutcome {
    if all_succeeded {
        CommandOutcome::Success
    } else {
        CommandOutcome::PartialFailure
    }
}

fn parse_keys(raw: &[String]) -> Vec<TicketKey> {
    raw.iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(TicketKey::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_keys, CommandOutcome};

    #[test]
    fn keys_accept_commas_and_whitespace() {
        let keys = parse_keys(&["FS-1,FS-2".to_owned(), " FS-3 ".to_owned(), ",".to_owned()]);
        let keys: Vec<&str> = keys.iter().map(|key| key.as_str()).collect();
        assert_eq!(keys, vec!["FS-1", "FS-2", "FS-3"]);
    }

    #[test]
    fn exit_codes_distinguish_failures_from_pending_conflicts() {
        assert_eq!(CommandOutcome::Success.exit_code(), 0);
        assert_eq!(CommandOutcome::PartialFailure.exit_code(), 1);
        assert_eq!(CommandOutcome::ConflictsPending.exit_code(), 2);
    }
}
