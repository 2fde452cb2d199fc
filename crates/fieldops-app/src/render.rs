//! Text and JSON output. Stdout carries only command output; diagnostics go
//! to the log file.

use std::io::Write;

use fieldops_domain::{bucket_label, AgingReport, BucketKey, DateBucket, TicketKey};
use fieldops_engine::{BatchResult, RescheduleConflict, StoreDigest};
use serde::Serialize;

use crate::error::AppError;

pub fn write_json<W: Write, T: Serialize + ?Sized>(
    out: &mut W,
    value: &T,
) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn age_text(report: AgingReport) -> String {
    match report.age_days {
        Some(days) => format!("{} {days}d", report.class.label()),
        None => report.class.label().to_owned(),
    }
}

fn calendar_label(date: time::Date) -> String {
    bucket_label(BucketKey::Dated(date))
}

pub fn render_store_digests<W: Write>(
    out: &mut W,
    digests: &[StoreDigest],
    dropped_records: usize,
) -> Result<(), AppError> {
    if digests.is_empty() {
        writeln!(out, "No tickets found.")?;
    }
    for digest in digests {
        writeln!(
            out,
            "{}  {}  ({} tickets: {} fresh, {} warning, {} critical, {} unknown)",
            digest.store_id,
            digest.store_name,
            digest.tickets.len(),
            digest.counts.fresh,
            digest.counts.warning,
            digest.counts.critical,
            digest.counts.unknown
        )?;
        for entry in &digest.tickets {
            let ticket = &entry.ticket;
            writeln!(
                out,
                "  {}  [age {} | in status {}]  {}  {}/{}  {}{}",
                ticket.key,
                age_text(entry.aging.ticket_age),
                age_text(entry.aging.status_age),
                ticket.status,
                ticket.device_slot,
                ticket.asset_type,
                ticket.summary,
                if entry.duplicate { "  (possible duplicate)" } else { "" }
            )?;
        }
        for signature in &digest.duplicate_signatures {
            writeln!(
                out,
                "  duplicates: {}/{}",
                signature.device_slot, signature.asset_type
            )?;
        }
    }
    render_dropped(out, dropped_records)
}

pub fn render_schedule<W: Write>(
    out: &mut W,
    buckets: &[DateBucket],
    dropped_records: usize,
) -> Result<(), AppError> {
    if buckets.is_empty() {
        writeln!(out, "No tickets found.")?;
    }
    for bucket in buckets {
        writeln!(out, "{} ({})", bucket.label, bucket.tickets.len())?;
        for ticket in &bucket.tickets {
            writeln!(
                out,
                "  {}  {} {}  {}  {}",
                ticket.key, ticket.store_id, ticket.store_name, ticket.status, ticket.summary
            )?;
        }
    }
    render_dropped(out, dropped_records)
}

fn render_dropped<W: Write>(out: &mut W, dropped_records: usize) -> Result<(), AppError> {
    if dropped_records > 0 {
        writeln!(out, "Dropped {dropped_records} tracker record(s) without a key.")?;
    }
    Ok(())
}

pub fn render_conflicts<W: Write>(
    out: &mut W,
    conflicts: &[RescheduleConflict],
) -> Result<(), AppError> {
    writeln!(
        out,
        "{} ticket(s) already scheduled for another date:",
        conflicts.len()
    )?;
    for conflict in conflicts {
        writeln!(
            out,
            "  {}  currently {}, requested {}",
            conflict.key,
            calendar_label(conflict.current_date),
            calendar_label(conflict.requested_date)
        )?;
    }
    Ok(())
}

pub fn render_batch_result<W: Write>(
    out: &mut W,
    operation: &str,
    result: &BatchResult,
    skipped: &[TicketKey],
) -> Result<(), AppError> {
    writeln!(
        out,
        "{operation}: {} total, {} succeeded, {} failed",
        result.total,
        result.succeeded,
        result.failures.len()
    )?;
    for failure in &result.failures {
        writeln!(out, "  {}: {}", failure.key, failure.reason)?;
    }
    if !skipped.is_empty() {
        writeln!(out, "Skipped (conflicting): {}", join_keys(skipped))?;
    }
    if !result.not_dispatched.is_empty() {
        writeln!(out, "Not dispatched: {}", join_keys(&result.not_dispatched))?;
    }
    Ok(())
}

fn join_keys(keys: &[TicketKey]) -> String {
    keys.iter()
        .map(TicketKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
