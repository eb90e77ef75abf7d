use crate::model::Span;

// ── Free-window algebra ──────────────────────────────────────────

/// Compute the bookable windows for one employee inside `query`:
/// availability slots clamped to the window, merged, minus the spans of
/// active reservations.
pub fn free_windows(slots: &[Span], busy: &[Span], query: &Span) -> Vec<Span> {
    let mut open: Vec<Span> = slots
        .iter()
        .filter(|s| s.overlaps(query))
        .map(|s| clamp(s, query))
        .collect();
    open.sort_by_key(|s| s.start);
    let mut open = merge_overlapping(&open);

    let mut blocked: Vec<Span> = busy
        .iter()
        .filter(|s| s.overlaps(query))
        .map(|s| clamp(s, query))
        .collect();
    blocked.sort_by_key(|s| s.start);

    if !blocked.is_empty() {
        open = subtract_intervals(&open, &blocked);
    }
    open
}

fn clamp(span: &Span, query: &Span) -> Span {
    Span::new(span.start.max(query.start), span.end.min(query.end))
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
