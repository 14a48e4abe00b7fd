/**
 * Applying Changesets
 *
 * Text application walks the ops with a cursor over the old text and one
 * over the char bank. Attribution application zips the attribution ops of
 * the old text with the changeset's ops through `slicer_zipper`, which is
 * also the core of `compose`.
 */

use crate::shared::apool::AttributePool;
use crate::shared::changeset::assembler::{MergingOpAssembler, SmartOpAssembler};
use crate::shared::changeset::attributes::compose_attributes;
use crate::shared::changeset::builder::ops_from_text;
use crate::shared::changeset::codec::{pack, unpack};
use crate::shared::changeset::op::{deserialize_ops, Op, OpCode};
use crate::shared::changeset::text::{char_len, char_slice, CharCursor};
use crate::shared::error::ChangesetError;

/// Applies `cs` to `text`, checking lengths and line counts as it goes.
pub fn apply_to_text(cs: &str, text: &str) -> Result<String, ChangesetError> {
    let unpacked = unpack(cs)?;
    let text_len = char_len(text);
    if text_len != unpacked.old_len {
        return Err(ChangesetError::LengthMismatch {
            expected: unpacked.old_len,
            actual: text_len,
        });
    }

    let mut bank = CharCursor::new(&unpacked.char_bank);
    let mut source = CharCursor::new(text);
    let mut out = String::with_capacity(text.len() + unpacked.char_bank.len());

    for op in deserialize_ops(&unpacked.ops)? {
        match op.opcode {
            OpCode::Insert => {
                let inserted = bank.take(op.chars)?;
                check_lines(&op, inserted)?;
                out.push_str(inserted);
            }
            OpCode::Remove => {
                let removed = source.take(op.chars)?;
                check_lines(&op, removed)?;
            }
            OpCode::Keep => {
                let kept = source.take(op.chars)?;
                check_lines(&op, kept)?;
                out.push_str(kept);
            }
            OpCode::Empty => {}
        }
    }
    out.push_str(source.remaining());
    Ok(out)
}

fn check_lines(op: &Op, span: &str) -> Result<(), ChangesetError> {
    let newlines = span.matches('\n').count();
    if newlines != op.lines {
        return Err(ChangesetError::invalid(format!(
            "op {} covers {} newlines but claims {}",
            op, newlines, op.lines
        )));
    }
    Ok(())
}

/// Walks two op strings in lockstep. `f` consumes from one or both sides
/// (clearing an op once it is used up) and returns the op to emit.
pub fn apply_zip<F>(in1: &str, in2: &str, mut f: F) -> Result<String, ChangesetError>
where
    F: FnMut(&mut Op, &mut Op) -> Result<Op, ChangesetError>,
{
    let mut ops1 = deserialize_ops(in1)?.into_iter();
    let mut ops2 = deserialize_ops(in2)?.into_iter();
    let mut op1 = Op::default();
    let mut op2 = Op::default();
    let mut assem = SmartOpAssembler::new();

    loop {
        if op1.is_empty() {
            if let Some(next) = ops1.next() {
                op1 = next;
            }
        }
        if op2.is_empty() {
            if let Some(next) = ops2.next() {
                op2 = next;
            }
        }
        if op1.is_empty() && op2.is_empty() {
            break;
        }
        let out = f(&mut op1, &mut op2)?;
        if !out.is_empty() {
            assem.append(&out);
        }
    }

    assem.end_document();
    Ok(assem.to_string())
}

/// Combines an op of the text's attribution (or of a first changeset) with
/// an op of a changeset applied on top of it.
pub fn slicer_zipper(att_op: &mut Op, cs_op: &mut Op, pool: &mut AttributePool) -> Result<Op, ChangesetError> {
    if att_op.is_empty() {
        let out = cs_op.clone();
        cs_op.clear();
        return Ok(out);
    }
    if cs_op.is_empty() {
        let out = att_op.clone();
        att_op.clear();
        return Ok(out);
    }
    if att_op.opcode == OpCode::Remove {
        let out = att_op.clone();
        att_op.clear();
        return Ok(out);
    }
    if cs_op.opcode == OpCode::Insert {
        let out = cs_op.clone();
        cs_op.clear();
        return Ok(out);
    }

    for op in [&*att_op, &*cs_op] {
        if op.chars < op.lines {
            return Err(ChangesetError::invalid(format!("op {} has more lines than chars", op)));
        }
    }
    let consistent = if att_op.chars < cs_op.chars {
        att_op.lines <= cs_op.lines
    } else if att_op.chars > cs_op.chars {
        att_op.lines >= cs_op.lines
    } else {
        att_op.lines == cs_op.lines
    };
    if !consistent {
        return Err(ChangesetError::invalid(format!(
            "line count mismatch between {} and {}",
            att_op, cs_op
        )));
    }

    let opcode = match (att_op.opcode, cs_op.opcode) {
        (OpCode::Insert, OpCode::Remove) => OpCode::Empty,
        (OpCode::Insert, OpCode::Keep) => OpCode::Insert,
        (OpCode::Keep, OpCode::Remove) => OpCode::Remove,
        (OpCode::Keep, OpCode::Keep) => OpCode::Keep,
        _ => {
            return Err(ChangesetError::invalid(format!(
                "cannot zip {} with {}",
                att_op, cs_op
            )))
        }
    };
    let attribs = if cs_op.opcode == OpCode::Remove {
        cs_op.attribs.clone()
    } else {
        compose_attributes(&att_op.attribs, &cs_op.attribs, att_op.opcode == OpCode::Keep, pool)?
    };

    let att_fully_consumed = att_op.chars <= cs_op.chars;
    let (fully, partially) = if att_fully_consumed {
        (att_op, cs_op)
    } else {
        (cs_op, att_op)
    };
    let out = Op::with_counts(opcode, fully.chars, fully.lines, attribs);
    partially.chars -= fully.chars;
    partially.lines -= fully.lines;
    if partially.chars == 0 {
        partially.clear();
    }
    fully.clear();
    Ok(out)
}

/// Applies `cs` to an attribution string describing the old text.
pub fn apply_to_attribution(cs: &str, astr: &str, pool: &mut AttributePool) -> Result<String, ChangesetError> {
    let unpacked = unpack(cs)?;
    apply_zip(astr, &unpacked.ops, |att_op, cs_op| slicer_zipper(att_op, cs_op, pool))
}

/// Attribution of plain text: one insert run, split at the last newline.
pub fn make_attribution(text: &str) -> String {
    let mut assem = SmartOpAssembler::new();
    for op in ops_from_text(OpCode::Insert, text, "") {
        assem.append(&op);
    }
    assem.to_string()
}

/// Changeset replacing `ndel` characters at `start` with `ins`. Positions
/// past the end are clamped.
pub fn make_splice(orig: &str, start: usize, ndel: usize, ins: &str, attribs: &str) -> String {
    let orig_len = char_len(orig);
    let start = start.min(orig_len);
    let ndel = ndel.min(orig_len - start);
    let prefix = char_slice(orig, 0, start);
    let deleted = char_slice(orig, start, start + ndel);

    let mut assem = SmartOpAssembler::new();
    for op in ops_from_text(OpCode::Keep, prefix, "") {
        assem.append(&op);
    }
    for op in ops_from_text(OpCode::Remove, deleted, "") {
        assem.append(&op);
    }
    for op in ops_from_text(OpCode::Insert, ins, attribs) {
        assem.append(&op);
    }
    assem.end_document();
    pack(orig_len, orig_len + char_len(ins) - ndel, &assem.to_string(), ins)
}

/// Splits an attribution string into one string per line of `text`.
pub fn split_attribution_lines(attr_ops: &str, text: &str) -> Result<Vec<String>, ChangesetError> {
    let chars: Vec<char> = text.chars().collect();
    let mut assem = MergingOpAssembler::new();
    let mut lines = Vec::new();
    let mut pos = 0usize;

    let mut append_op = |op: &Op, assem: &mut MergingOpAssembler, pos: &mut usize| {
        assem.append(op);
        if op.lines > 0 {
            lines.push(assem.to_string());
            assem.clear();
        }
        *pos += op.chars;
    };

    for mut op in deserialize_ops(attr_ops)? {
        let mut num_chars = op.chars;
        let mut num_lines = op.lines;
        while num_lines > 1 {
            let newline_end = chars[pos.min(chars.len())..]
                .iter()
                .position(|c| *c == '\n')
                .map(|off| pos + off + 1)
                .ok_or_else(|| ChangesetError::invalid("attribution claims more lines than the text has"))?;
            op.chars = newline_end - pos;
            op.lines = 1;
            append_op(&op, &mut assem, &mut pos);
            num_chars -= op.chars;
            num_lines -= 1;
        }
        if num_lines == 1 {
            op.chars = num_chars;
            op.lines = 1;
        }
        append_op(&op, &mut assem, &mut pos);
    }
    Ok(lines)
}

pub fn join_attribution_lines(lines: &[String]) -> Result<String, ChangesetError> {
    let mut assem = MergingOpAssembler::new();
    for line in lines {
        for op in deserialize_ops(line)? {
            assem.append(&op);
        }
    }
    Ok(assem.to_string())
}

/// Attribution of the character range `[start, end)`; to the end of the
/// text when `end` is `None`.
pub fn subattribution(astr: &str, start: usize, end: Option<usize>) -> Result<String, ChangesetError> {
    let mut att_ops = deserialize_ops(astr)?.into_iter().peekable();
    let mut assem = SmartOpAssembler::new();
    let mut att_op = Op::default();
    // Attributes are only ever passed through here.
    let mut scratch = AttributePool::new();

    let mut do_cs_op = |cs_op: &mut Op,
                        att_op: &mut Op,
                        att_ops: &mut std::iter::Peekable<std::vec::IntoIter<Op>>,
                        assem: &mut SmartOpAssembler|
     -> Result<(), ChangesetError> {
        if cs_op.chars == 0 {
            return Ok(());
        }
        while !cs_op.is_empty() && (!att_op.is_empty() || att_ops.peek().is_some()) {
            if att_op.is_empty() {
                if let Some(next) = att_ops.next() {
                    *att_op = next;
                }
            }
            if !cs_op.is_empty() && !att_op.is_empty() && cs_op.chars >= att_op.chars && att_op.lines > 0 && cs_op.lines == 0 {
                cs_op.lines += 1;
            }
            let out = slicer_zipper(att_op, cs_op, &mut scratch)?;
            if !out.is_empty() {
                assem.append(&out);
            }
        }
        Ok(())
    };

    let mut cs_op = Op::with_counts(OpCode::Remove, start, 0, "");
    do_cs_op(&mut cs_op, &mut att_op, &mut att_ops, &mut assem)?;

    match end {
        None => {
            if !att_op.is_empty() {
                assem.append(&att_op);
            }
            for rest in att_ops {
                assem.append(&rest);
            }
        }
        Some(end) => {
            let mut cs_op = Op::with_counts(OpCode::Keep, end.saturating_sub(start), 0, "");
            do_cs_op(&mut cs_op, &mut att_op, &mut att_ops, &mut assem)?;
        }
    }
    Ok(assem.to_string())
}
