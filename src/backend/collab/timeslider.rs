//! Changeset history for the timeslider: the requested revision range cut
//! into `granularity`-sized chunks, each composed forwards and inverted
//! backwards.

use crate::backend::pad::{Pad, PadError, PadResult};
use crate::shared::apool::AttributePool;
use crate::shared::atext::{apply_to_atext, AText};
use crate::shared::changeset::{compose, inverse, move_ops_to_new_pool};
use crate::shared::message::ChangesetInfo;

/// Revisions a single CHANGESET_REQ may span, in units of granularity
pub const CHUNKS_PER_REQUEST: i64 = 100;

/// Composition of revisions `start..end`, clamped to the head.
pub fn compose_pad_changesets(pad: &Pad, start: i64, end: i64, pool: &mut AttributePool) -> PadResult<String> {
    let end = end.min(pad.head + 1);
    let start = start.max(0);
    if start >= end {
        return Err(PadError::InvalidRange { start, end, head: pad.head });
    }
    let mut composed = pad.get_rev_changeset(start)?.to_string();
    for rev in start + 1..end {
        composed = compose(&composed, pad.get_rev_changeset(rev)?, pool)?;
    }
    Ok(composed)
}

/// Forward and backward changesets for `start..end` in steps of
/// `granularity`, with attributes moved into a fresh pool.
pub fn changeset_info(pad: &Pad, start: i64, end: i64, granularity: i64) -> PadResult<ChangesetInfo> {
    if granularity <= 0 || start < 0 {
        return Err(PadError::InvalidRange { start, end, head: pad.head });
    }
    let end = end.min(pad.head + 1);
    let end = end.div_euclid(granularity) * granularity;

    let mut atext = if start > 0 {
        pad.get_internal_revision_atext(start - 1)?
    } else {
        AText::default()
    };
    let mut pool = pad.pool.clone();
    let mut wire_pool = AttributePool::new();

    let mut info = ChangesetInfo {
        forwards_changesets: Vec::new(),
        backwards_changesets: Vec::new(),
        apool: Default::default(),
        actual_end_num: end,
        time_deltas: Vec::new(),
        start,
        granularity,
    };

    let mut chunk_start = start;
    while chunk_start < end {
        let chunk_end = chunk_start + granularity;
        if chunk_end > end || chunk_end > pad.head + 1 {
            break;
        }
        let forwards = compose_pad_changesets(pad, chunk_start, chunk_end, &mut pool)?;
        let backwards = inverse(&forwards, &atext, &mut pool)?;
        atext = apply_to_atext(&forwards, &atext, &mut pool)?;

        let t1 = pad.get_rev_date((chunk_start - 1).max(0))?;
        let t2 = pad.get_rev_date(chunk_end - 1)?;
        info.time_deltas.push(t2 - t1);
        info.forwards_changesets.push(move_ops_to_new_pool(&forwards, &pool, &mut wire_pool)?);
        info.backwards_changesets.push(move_ops_to_new_pool(&backwards, &pool, &mut wire_pool)?);
        chunk_start = chunk_end;
    }

    info.apool = wire_pool.to_jsonable();
    Ok(info)
}
