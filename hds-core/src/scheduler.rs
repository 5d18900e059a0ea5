//! Computes the next `(segment, fragment)` pair to fetch for a variant, and
//! drives the live-window bootstrap refresh.
//!
//! Grounded on `original_source/libavformat/hdsdec.c`'s
//! `calculate_next_segment`, `calculate_next_fragment`,
//! `calculate_fragment_offset`, `calculate_fragment_total`, and
//! `get_segment_fragment`. Per spec.md §4.5 steps 1-2, only the *last*
//! segment-run table and the *last* fragment-run table are authoritative —
//! `next_segment`/`next_fragment` below scan a single table each, not every
//! table in the bootstrap. One quirk of the original is preserved for
//! compatibility rather than "fixed": the live rollover comparison
//! (`fragment >= first_fragment + nb_total`) uses the *pre-refresh*
//! `first_fragment`, not a value recomputed from the freshly downloaded
//! bootstrap.

use crate::types::{BootstrapInfo, VariantCursor};

/// `(first_segment, fragments_per_segment)` of the last entry of the last
/// segment-run table (spec.md §4.5 step 1).
fn next_segment(bootstrap: &BootstrapInfo) -> (u32, u32) {
    let Some(table) = bootstrap.segment_tables.last() else {
        return (0, 0);
    };
    match table.entries.last() {
        Some(entry) => (entry.first_segment, entry.fragments_per_segment),
        None => (0, 0),
    }
}

/// `first_fragment` of the last positive-`first_fragment` entry of the last
/// fragment-run table (spec.md §4.5 step 2).
fn next_fragment(bootstrap: &BootstrapInfo) -> u32 {
    let Some(table) = bootstrap.fragment_tables.last() else {
        return 0;
    };
    let mut fragment = 0;
    for entry in &table.entries {
        if entry.first_fragment > 0 {
            fragment = entry.first_fragment;
        }
    }
    fragment
}

/// Sum of `fragments_per_segment` across every entry of the *last* segment
/// run table (source: `calculate_fragment_offset`). Zero if that table has
/// one or fewer entries.
fn fragment_offset(bootstrap: &BootstrapInfo) -> u32 {
    let Some(asrt) = bootstrap.segment_tables.last() else {
        return 0;
    };
    if asrt.entries.len() <= 1 {
        return 0;
    }
    asrt.entries.iter().map(|e| e.fragments_per_segment).sum()
}

/// `entry_count * first_entry.fragments_per_segment` of the last segment run
/// table (source: `calculate_fragment_total`).
fn fragment_total(bootstrap: &BootstrapInfo) -> u32 {
    let Some(asrt) = bootstrap.segment_tables.last() else {
        return 0;
    };
    let Some(first) = asrt.entries.first() else {
        return 0;
    };
    asrt.entries.len() as u32 * first.fragments_per_segment
}

/// Outcome of [`next_segment_fragment`]: either a download target, or a
/// request to refresh the bootstrap first (live rollover) before retrying.
pub enum ScheduleOutcome {
    Download { segment: u32, fragment: u32 },
    RefreshBootstrap,
    EndOfStream,
}

/// Compute the next `(segment, fragment)` to fetch, mutating `cursor`'s live
/// window bookkeeping as the source's `HDSMedia` fields are mutated in place.
///
/// Call sequence on live rollover: caller sees [`ScheduleOutcome::RefreshBootstrap`],
/// re-parses the bootstrap, resets the cursor's `fragments_read`/`live_offset`/
/// `live_total` to zero (mirroring `media->nb_fragments_read = 0` etc.), and
/// calls this function again with the refreshed bootstrap.
pub fn next_segment_fragment(
    bootstrap: &BootstrapInfo,
    cursor: &mut VariantCursor,
    is_live: bool,
) -> ScheduleOutcome {
    let (segment, fragments_per_segment) = next_segment(bootstrap);
    let first_fragment = next_fragment(bootstrap);

    let mut fragment = first_fragment + cursor.fragments_read;

    if is_live {
        if cursor.live_offset == 0 {
            cursor.live_offset = fragment_offset(bootstrap);
        }
        if cursor.live_total == 0 {
            cursor.live_total = fragment_total(bootstrap);
        }

        fragment += cursor.live_offset.saturating_sub(1);

        if fragment >= first_fragment + cursor.live_total {
            return ScheduleOutcome::RefreshBootstrap;
        }
    }

    if !is_live && fragment >= first_fragment + fragments_per_segment {
        return ScheduleOutcome::EndOfStream;
    }

    ScheduleOutcome::Download { segment, fragment }
}

/// Reset the live-window bookkeeping a bootstrap refresh requires, mirroring
/// `media->nb_fragments_read = media->nb_offset = media->nb_total = 0`.
pub fn reset_after_refresh(cursor: &mut VariantCursor) {
    cursor.fragments_read = 0;
    cursor.live_offset = 0;
    cursor.live_total = 0;
}
