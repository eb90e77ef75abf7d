use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, Error};

/// A recurring availability request: the base window(s) plus how they
/// repeat. Materialized into one `ScheduleSlot` row per occurrence.
#[derive(Debug, Clone)]
pub struct CreateScheduleRequest {
    pub employee_id: Ulid,
    pub description: Option<String>,
    /// Raw `(from, to)` pairs; `to < from` marks a midnight crossing.
    pub slots: Vec<(Ms, Ms)>,
    pub repeat: RepeatPattern,
    pub repeat_count: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct UpdateScheduleRequest {
    pub slot_id: Ulid,
    pub description: Option<String>,
    /// Raw replacement window for the edited row.
    pub slot: (Ms, Ms),
    pub repeat: RepeatPattern,
    pub repeat_count: Option<u32>,
    /// Regenerate the whole recurrence group from the edited row.
    pub update_all_slots: bool,
}

// ── Pure expansion & validation ──────────────────────────────────

fn validate_window(span: &Span) -> Result<(), Error> {
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(Error::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SLOT_DURATION_MS {
        return Err(Error::LimitExceeded("slot too wide"));
    }
    Ok(())
}

pub(super) fn normalize_slots(raw: &[(Ms, Ms)]) -> Result<Vec<Span>, Error> {
    let mut spans = Vec::with_capacity(raw.len());
    for &(from, to) in raw {
        let span = Span::normalized(from, to)
            .ok_or(Error::Validation("slot must have a positive duration"))?;
        validate_window(&span)?;
        spans.push(span);
    }
    Ok(spans)
}

/// Rows to materialize and the `repeat_count` to store on each of them.
/// A non-repeating request yields one row and stores a count of zero.
pub(super) fn occurrence_count(
    repeat: RepeatPattern,
    repeat_count: Option<u32>,
) -> Result<(u32, u32), Error> {
    if !repeat.is_repeating() {
        return Ok((1, 0));
    }
    match repeat_count {
        Some(n) if n > 0 => {
            if n > MAX_REPEAT_COUNT {
                return Err(Error::LimitExceeded("too many occurrences"));
            }
            Ok((n, n))
        }
        _ => Err(Error::Validation("repeat duration required for a repeating schedule")),
    }
}

/// Materialize every occurrence of every base slot.
pub(super) fn expand(
    base: &[Span],
    repeat: RepeatPattern,
    occurrences: u32,
) -> Result<Vec<Span>, Error> {
    let mut candidates = Vec::with_capacity(base.len() * occurrences as usize);
    for index in 0..occurrences {
        for span in base {
            let shifted = repeat
                .occurrence(*span, index)
                .ok_or(Error::LimitExceeded("occurrence out of range"))?;
            validate_window(&shifted)?;
            candidates.push(shifted);
        }
    }
    Ok(candidates)
}

/// Candidates must not collide with each other — the per-employee
/// non-overlap invariant covers the new rows too, not just new-vs-old.
pub(super) fn check_self_overlap(candidates: &[Span]) -> Result<(), Error> {
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            if a.overlaps(b) {
                return Err(Error::ScheduleConflict { slot: *b, existing: *a });
            }
        }
    }
    Ok(())
}

/// Every candidate against every kept row of the employee. O(existing ×
/// candidates) — fine at employee-schedule scale.
pub(super) fn check_against_existing(
    candidates: &[Span],
    existing: &[ScheduleSlot],
) -> Result<(), Error> {
    for row in existing {
        for candidate in candidates {
            if row.span.overlaps(candidate) {
                return Err(Error::ScheduleConflict {
                    slot: *candidate,
                    existing: row.span,
                });
            }
        }
    }
    Ok(())
}

fn check_description(description: &Option<String>) -> Result<(), Error> {
    if description.as_ref().is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN) {
        return Err(Error::LimitExceeded("description too long"));
    }
    Ok(())
}

// ── Engine mutations ─────────────────────────────────────────────

impl Engine {
    /// Expand a recurring availability request into concrete rows and
    /// persist them, rejecting any overlap with the employee's existing
    /// schedule.
    pub async fn create_schedule(
        &self,
        request: CreateScheduleRequest,
    ) -> Result<Vec<ScheduleSlot>, Error> {
        if request.slots.is_empty() {
            return Err(Error::Validation("at least one slot required"));
        }
        if request.slots.len() > MAX_BASE_SLOTS_PER_REQUEST {
            return Err(Error::LimitExceeded("too many slots in one request"));
        }
        check_description(&request.description)?;
        let (occurrences, stored_count) = occurrence_count(request.repeat, request.repeat_count)?;

        self.require_employee(request.employee_id).await?;
        let base = normalize_slots(&request.slots)?;
        let candidates = expand(&base, request.repeat, occurrences)?;
        check_self_overlap(&candidates)?;

        let existing = self.store.schedules_by_employee(request.employee_id).await?;
        if let Err(e) = check_against_existing(&candidates, &existing) {
            metrics::counter!(crate::observability::SCHEDULE_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let group_id = if request.repeat.is_repeating() {
            Some(self.store.next_group_id().await?)
        } else {
            None
        };
        let rows: Vec<ScheduleSlot> = candidates
            .into_iter()
            .map(|span| ScheduleSlot {
                id: Ulid::new(),
                employee_id: request.employee_id,
                group_id,
                description: request.description.clone(),
                repeat: request.repeat,
                repeat_count: stored_count,
                span,
            })
            .collect();
        self.store.insert_schedule_slots(rows.clone()).await?;

        metrics::counter!(crate::observability::SCHEDULE_ROWS_TOTAL)
            .increment(rows.len() as u64);
        tracing::info!(
            employee = %request.employee_id,
            rows = rows.len(),
            repeat = ?request.repeat,
            "schedule created"
        );
        self.invalidate_schedule_views(request.employee_id);
        Ok(rows)
    }

    /// Replace one row, or regenerate its whole recurrence group from the
    /// edited row as the new base.
    pub async fn update_schedule(
        &self,
        request: UpdateScheduleRequest,
    ) -> Result<Vec<ScheduleSlot>, Error> {
        check_description(&request.description)?;
        let row = self
            .store
            .find_schedule_slot(request.slot_id)
            .await?
            .ok_or(Error::NotFound(request.slot_id))?;
        let new_span = normalize_slots(&[request.slot])?[0];
        let existing = self.store.schedules_by_employee(row.employee_id).await?;

        let rows = if request.update_all_slots {
            let group_id = row
                .group_id
                .ok_or(Error::Validation("slot is not part of a recurrence group"))?;
            let (occurrences, stored_count) =
                occurrence_count(request.repeat, request.repeat_count)?;
            let candidates = expand(&[new_span], request.repeat, occurrences)?;
            check_self_overlap(&candidates)?;

            let others: Vec<ScheduleSlot> = existing
                .into_iter()
                .filter(|s| s.group_id != Some(group_id))
                .collect();
            if let Err(e) = check_against_existing(&candidates, &others) {
                metrics::counter!(crate::observability::SCHEDULE_CONFLICTS_TOTAL).increment(1);
                return Err(e);
            }

            self.store.delete_schedule_group(group_id, Some(row.id)).await?;
            let new_group = if request.repeat.is_repeating() { Some(group_id) } else { None };
            let mut rows = Vec::with_capacity(candidates.len());
            for (index, span) in candidates.into_iter().enumerate() {
                rows.push(ScheduleSlot {
                    // The edited row is reused as occurrence 0.
                    id: if index == 0 { row.id } else { Ulid::new() },
                    employee_id: row.employee_id,
                    group_id: new_group,
                    description: request.description.clone(),
                    repeat: request.repeat,
                    repeat_count: stored_count,
                    span,
                });
            }
            self.store.update_schedule_slot(rows[0].clone()).await?;
            if rows.len() > 1 {
                self.store.insert_schedule_slots(rows[1..].to_vec()).await?;
            }
            rows
        } else {
            let others: Vec<ScheduleSlot> =
                existing.into_iter().filter(|s| s.id != row.id).collect();
            if let Err(e) = check_against_existing(&[new_span], &others) {
                metrics::counter!(crate::observability::SCHEDULE_CONFLICTS_TOTAL).increment(1);
                return Err(e);
            }
            let updated = ScheduleSlot {
                description: request.description.clone(),
                span: new_span,
                ..row.clone()
            };
            self.store.update_schedule_slot(updated.clone()).await?;
            vec![updated]
        };

        tracing::info!(
            employee = %row.employee_id,
            rows = rows.len(),
            all_slots = request.update_all_slots,
            "schedule updated"
        );
        self.invalidate_schedule_views(row.employee_id);
        Ok(rows)
    }

    /// Remove one row, or every row sharing its recurrence group.
    pub async fn delete_schedule(
        &self,
        slot_id: Ulid,
        delete_all_slots: bool,
    ) -> Result<(), Error> {
        let row = self
            .store
            .find_schedule_slot(slot_id)
            .await?
            .ok_or(Error::NotFound(slot_id))?;

        if delete_all_slots {
            let group_id = row
                .group_id
                .ok_or(Error::Validation("slot is not part of a recurrence group"))?;
            self.store.delete_schedule_group(group_id, None).await?;
        } else {
            self.store.delete_schedule_slot(row.id).await?;
        }

        tracing::info!(employee = %row.employee_id, all_slots = delete_all_slots, "schedule deleted");
        self.invalidate_schedule_views(row.employee_id);
        Ok(())
    }
}
