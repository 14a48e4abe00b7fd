//! Changeset inversion against a known attributed text.

use crate::shared::apool::AttributePool;
use crate::shared::atext::AText;
use crate::shared::changeset::attributes::AttributeMap;
use crate::shared::changeset::builder::Builder;
use crate::shared::changeset::codec::{check_rep, unpack};
use crate::shared::changeset::op::{deserialize_ops, OpCode};
use crate::shared::error::ChangesetError;

/// A run of identically attributed characters, in character positions
struct Run {
    start: usize,
    end: usize,
    attribs: String,
}

/// Sequential reader over the attribution runs of a text
struct RunCursor {
    runs: Vec<Run>,
    idx: usize,
}

impl RunCursor {
    fn new(attribs: &str) -> Result<Self, ChangesetError> {
        let mut runs = Vec::new();
        let mut pos = 0;
        for op in deserialize_ops(attribs)? {
            runs.push(Run {
                start: pos,
                end: pos + op.chars,
                attribs: op.attribs,
            });
            pos += op.chars;
        }
        Ok(Self { runs, idx: 0 })
    }

    /// Pieces of `[start, end)` split at run boundaries. Calls must move
    /// forward through the text.
    fn slice(&mut self, start: usize, end: usize) -> Vec<(usize, usize, String)> {
        let mut pieces = Vec::new();
        while self.idx < self.runs.len() && self.runs[self.idx].end <= start {
            self.idx += 1;
        }
        let mut i = self.idx;
        while i < self.runs.len() && self.runs[i].start < end {
            let run = &self.runs[i];
            let piece_start = run.start.max(start);
            let piece_end = run.end.min(end);
            if piece_start < piece_end {
                pieces.push((piece_start, piece_end, run.attribs.clone()));
            }
            i += 1;
        }
        pieces
    }
}

/// Changeset that undoes `cs` when applied to `apply_to_atext(cs, atext)`,
/// restoring both text and attribution.
pub fn inverse(cs: &str, atext: &AText, pool: &mut AttributePool) -> Result<String, ChangesetError> {
    let unpacked = unpack(cs)?;
    let chars: Vec<char> = atext.text.chars().collect();
    if chars.len() != unpacked.old_len {
        return Err(ChangesetError::LengthMismatch {
            expected: unpacked.old_len,
            actual: chars.len(),
        });
    }

    let mut runs = RunCursor::new(&atext.attribs)?;
    let mut builder = Builder::new(unpacked.new_len);
    let mut pos = 0usize;
    let text_of = |start: usize, end: usize| -> String { chars[start..end].iter().collect() };

    // Only keeps and removes consume the old text.
    let consume = |pos: usize, n: usize| -> Result<usize, ChangesetError> {
        let end = pos + n;
        if end > chars.len() {
            return Err(ChangesetError::invalid("changeset extends past end of text"));
        }
        Ok(end)
    };

    for op in deserialize_ops(&unpacked.ops)? {
        match op.opcode {
            OpCode::Keep if op.attribs.is_empty() => {
                let end = consume(pos, op.chars)?;
                builder.keep(op.chars, op.lines, "");
                pos = end;
            }
            OpCode::Keep => {
                let end = consume(pos, op.chars)?;
                let applied = AttributeMap::from_attribs_string(&op.attribs, pool)?;
                for (start, stop, old_attribs) in runs.slice(pos, end) {
                    let old = AttributeMap::from_attribs_string(&old_attribs, pool)?;
                    let mut back = AttributeMap::new();
                    for (key, value) in applied.iter() {
                        let old_value = old.get(key).unwrap_or("");
                        if old_value != value {
                            back.set(key, old_value);
                        }
                    }
                    let back_attribs = back.to_attribs_string(pool);
                    builder.keep_text(&text_of(start, stop), &back_attribs);
                }
                pos = end;
            }
            OpCode::Insert => {
                builder.remove(op.chars, op.lines);
            }
            OpCode::Remove => {
                let end = consume(pos, op.chars)?;
                for (start, stop, old_attribs) in runs.slice(pos, end) {
                    builder.insert(&text_of(start, stop), &old_attribs);
                }
                pos = end;
            }
            OpCode::Empty => {}
        }
    }

    let inverted = builder.to_string();
    check_rep(&inverted)?;
    Ok(inverted)
}
