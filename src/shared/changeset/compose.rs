/**
 * Composition and Rebase
 *
 * `compose(a, b)` is the single changeset equivalent to applying `a` then
 * `b`. `follow(a, b)` rewrites `b` so it applies after `a` when both were
 * made against the same text; this is how concurrent commits are ordered.
 *
 * For concurrent `a` and `b` over the same text:
 *
 * ```text
 * compose(a, follow(a, b, false)) == compose(b, follow(b, a, true))
 * ```
 */

use std::collections::HashMap;

use crate::shared::apool::{Attribute, AttributePool};
use crate::shared::changeset::apply::{apply_zip, slicer_zipper};
use crate::shared::changeset::attributes::{follow_attributes, has_attrib, rewrite_attrib_markers};
use crate::shared::changeset::codec::{identity, pack, unpack};
use crate::shared::changeset::op::{Op, OpCode};
use crate::shared::changeset::text::CharCursor;
use crate::shared::error::ChangesetError;

pub fn compose(cs1: &str, cs2: &str, pool: &mut AttributePool) -> Result<String, ChangesetError> {
    let unpacked1 = unpack(cs1)?;
    let unpacked2 = unpack(cs2)?;
    if unpacked1.new_len != unpacked2.old_len {
        return Err(ChangesetError::invalid(format!(
            "cannot compose: first changeset produces length {} but second expects {}",
            unpacked1.new_len, unpacked2.old_len
        )));
    }

    let mut bank1 = CharCursor::new(&unpacked1.char_bank);
    let mut bank2 = CharCursor::new(&unpacked2.char_bank);
    let mut bank = String::new();

    let ops = apply_zip(&unpacked1.ops, &unpacked2.ops, |op1, op2| {
        let op1code = op1.opcode;
        let op2code = op2.opcode;
        if op1code == OpCode::Insert && op2code == OpCode::Remove {
            bank1.skip(op1.chars.min(op2.chars))?;
        }
        let out = slicer_zipper(op1, op2, pool)?;
        if out.opcode == OpCode::Insert {
            let taken = if op2code == OpCode::Insert {
                bank2.take(out.chars)?
            } else {
                bank1.take(out.chars)?
            };
            bank.push_str(taken);
        }
        Ok(out)
    })?;

    Ok(pack(unpacked1.old_len, unpacked2.new_len, &ops, &bank))
}

/// Rebases `cs2` over `cs1`. Both must apply to the same text. On tied
/// inserts `cs1` goes first unless `reverse_insert_order` is set.
pub fn follow(cs1: &str, cs2: &str, reverse_insert_order: bool, pool: &AttributePool) -> Result<String, ChangesetError> {
    let unpacked1 = unpack(cs1)?;
    let unpacked2 = unpack(cs2)?;
    if unpacked1.old_len != unpacked2.old_len {
        return Err(ChangesetError::invalid(format!(
            "mismatched follow: {} vs {}",
            unpacked1.old_len, unpacked2.old_len
        )));
    }
    if unpacked1.is_identity() {
        return Ok(cs2.to_string());
    }
    if unpacked2.is_identity() {
        return Ok(identity(unpacked1.new_len));
    }

    let mut chars1 = CharCursor::new(&unpacked1.char_bank);
    let mut chars2 = CharCursor::new(&unpacked2.char_bank);
    let old_len = unpacked1.new_len;
    let mut old_pos = 0usize;
    let mut new_len = 0usize;
    let insert_first = Attribute::new("insertorder", "first");

    let ops = apply_zip(&unpacked1.ops, &unpacked2.ops, |op1, op2| {
        let mut out = Op::default();

        if op1.opcode == OpCode::Insert || op2.opcode == OpCode::Insert {
            let side_one = if op2.opcode != OpCode::Insert {
                true
            } else if op1.opcode != OpCode::Insert {
                false
            } else {
                let first1 = chars1.peek(1)?;
                let first2 = chars2.peek(1)?;
                let insert_first1 = has_attrib(&op1.attribs, &insert_first, pool);
                let insert_first2 = has_attrib(&op2.attribs, &insert_first, pool);
                if insert_first1 && !insert_first2 {
                    true
                } else if insert_first2 && !insert_first1 {
                    false
                } else if first1 == "\n" && first2 != "\n" {
                    // Keep lines intact: the side not starting a new line goes first.
                    false
                } else if first1 != "\n" && first2 == "\n" {
                    true
                } else {
                    !reverse_insert_order
                }
            };
            if side_one {
                chars1.skip(op1.chars)?;
                out = Op::with_counts(OpCode::Keep, op1.chars, op1.lines, "");
                op1.clear();
            } else {
                chars2.skip(op2.chars)?;
                out = op2.clone();
                op2.clear();
            }
        } else if op1.opcode == OpCode::Remove {
            if op2.is_empty() {
                op1.clear();
            } else if op1.chars <= op2.chars {
                op2.chars -= op1.chars;
                op2.lines = op2.lines.saturating_sub(op1.lines);
                op1.clear();
                if op2.chars == 0 {
                    op2.clear();
                }
            } else {
                op1.chars -= op2.chars;
                op1.lines = op1.lines.saturating_sub(op2.lines);
                op2.clear();
            }
        } else if op2.opcode == OpCode::Remove {
            out = op2.clone();
            if op1.is_empty() {
                op2.clear();
            } else if op2.chars <= op1.chars {
                op1.chars -= op2.chars;
                op1.lines = op1.lines.saturating_sub(op2.lines);
                op2.clear();
                if op1.chars == 0 {
                    op1.clear();
                }
            } else {
                out.chars = op1.chars;
                out.lines = op1.lines;
                op2.chars -= op1.chars;
                op2.lines = op2.lines.saturating_sub(op1.lines);
                op1.clear();
            }
        } else if op1.is_empty() {
            out = op2.clone();
            op2.clear();
        } else if op2.is_empty() {
            // The first side's keep attributes are already applied.
            op1.clear();
        } else {
            out.opcode = OpCode::Keep;
            out.attribs = follow_attributes(&op1.attribs, &op2.attribs, pool)?;
            if op1.chars <= op2.chars {
                out.chars = op1.chars;
                out.lines = op1.lines;
                op2.chars -= op1.chars;
                op2.lines = op2.lines.saturating_sub(op1.lines);
                op1.clear();
                if op2.chars == 0 {
                    op2.clear();
                }
            } else {
                out.chars = op2.chars;
                out.lines = op2.lines;
                op1.chars -= op2.chars;
                op1.lines = op1.lines.saturating_sub(op2.lines);
                op2.clear();
            }
        }

        match out.opcode {
            OpCode::Keep => {
                old_pos += out.chars;
                new_len += out.chars;
            }
            OpCode::Remove => old_pos += out.chars,
            OpCode::Insert => new_len += out.chars,
            OpCode::Empty => {}
        }
        Ok(out)
    })?;

    let new_len = new_len + old_len.saturating_sub(old_pos);
    Ok(pack(old_len, new_len, &ops, &unpacked2.char_bank))
}

/// Re-interns every attribute `cs` mentions from `old_pool` into `new_pool`.
pub fn move_ops_to_new_pool(
    cs: &str,
    old_pool: &AttributePool,
    new_pool: &mut AttributePool,
) -> Result<String, ChangesetError> {
    let mut translated: HashMap<usize, usize> = HashMap::new();
    rewrite_attrib_markers(cs, |num| {
        if let Some(mapped) = translated.get(&num) {
            return Ok(*mapped);
        }
        let attrib = old_pool.require_attrib(num)?.clone();
        let mapped = new_pool.put_attrib(attrib);
        translated.insert(num, mapped);
        Ok(mapped)
    })
}

/// Translates `cs` into a fresh pool holding only the attributes it uses.
pub fn prepare_for_wire(cs: &str, pool: &AttributePool) -> Result<(String, AttributePool), ChangesetError> {
    let mut wire_pool = AttributePool::new();
    let translated = move_ops_to_new_pool(cs, pool, &mut wire_pool)?;
    Ok((translated, wire_pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::changeset::apply::{apply_to_text, make_splice};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compose_two_inserts() {
        let mut pool = AttributePool::new();
        let a = make_splice("abc\n", 1, 0, "X", "");
        let b = make_splice("aXbc\n", 4, 0, "Y", "");
        let ab = compose(&a, &b, &mut pool).unwrap();
        assert_eq!(apply_to_text(&ab, "abc\n").unwrap(), "aXbcY\n");
    }

    #[test]
    fn test_compose_insert_then_delete_drops() {
        let mut pool = AttributePool::new();
        let a = make_splice("abc\n", 1, 0, "XYZ", "");
        let b = make_splice("aXYZbc\n", 2, 1, "", "");
        let ab = compose(&a, &b, &mut pool).unwrap();
        assert_eq!(ab, "Z:4>2=1+2$XZ");
    }

    #[test]
    fn test_compose_length_mismatch() {
        let mut pool = AttributePool::new();
        assert!(compose("Z:4>1+1$a", "Z:4>1+1$b", &mut pool).is_err());
    }

    #[test]
    fn test_follow_concurrent_inserts() {
        let pool = AttributePool::new();
        let text = "hello\n";
        let a = make_splice(text, 5, 0, "!", "");
        let b = make_splice(text, 0, 0, "?", "");
        let b_prime = follow(&a, &b, false, &pool).unwrap();
        assert_eq!(b_prime, "Z:7>1+1$?");
        let after_a = apply_to_text(&a, text).unwrap();
        assert_eq!(apply_to_text(&b_prime, &after_a).unwrap(), "?hello!\n");
    }

    #[test]
    fn test_follow_tie_break() {
        let pool = AttributePool::new();
        let text = "ab\n";
        let a = make_splice(text, 1, 0, "X", "");
        let b = make_splice(text, 1, 0, "Y", "");
        let after_a = apply_to_text(&a, text).unwrap();
        let b_after_a = follow(&a, &b, false, &pool).unwrap();
        assert_eq!(apply_to_text(&b_after_a, &after_a).unwrap(), "aXYb\n");
        let b_first = follow(&a, &b, true, &pool).unwrap();
        assert_eq!(apply_to_text(&b_first, &after_a).unwrap(), "aYXb\n");
    }

    #[test]
    fn test_follow_overlapping_deletes() {
        let pool = AttributePool::new();
        let text = "abcdef\n";
        let a = make_splice(text, 1, 3, "", "");
        let b = make_splice(text, 2, 3, "", "");
        let after_a = apply_to_text(&a, text).unwrap();
        let b_prime = follow(&a, &b, false, &pool).unwrap();
        assert_eq!(apply_to_text(&b_prime, &after_a).unwrap(), "af\n");
    }

    #[test]
    fn test_follow_identity_contract() {
        let pool = AttributePool::new();
        let b = make_splice("ab\n", 1, 0, "Y", "");
        assert_eq!(follow("Z:3>0$", &b, false, &pool).unwrap(), b);
        let a = make_splice("ab\n", 1, 0, "XX", "");
        assert_eq!(follow(&a, "Z:3>0$", false, &pool).unwrap(), "Z:5>0$");
    }

    #[test]
    fn test_follow_mismatched_lengths() {
        let pool = AttributePool::new();
        assert!(follow("Z:3>1+1$a", "Z:4>1+1$b", false, &pool).is_err());
    }

    #[test]
    fn test_move_ops_to_new_pool() {
        let mut old_pool = AttributePool::new();
        old_pool.put_attrib(Attribute::new("bold", "true"));
        old_pool.put_attrib(Attribute::new("author", "a.1"));
        let mut new_pool = AttributePool::new();
        new_pool.put_attrib(Attribute::new("author", "a.1"));

        let moved = move_ops_to_new_pool("Z:1>2*1*0+2$ab", &old_pool, &mut new_pool).unwrap();
        assert_eq!(moved, "Z:1>2*0*1+2$ab");
        assert_eq!(new_pool.get_attrib(1), Some(&Attribute::new("bold", "true")));
    }

    #[test]
    fn test_prepare_for_wire() {
        let mut pool = AttributePool::new();
        pool.put_attrib(Attribute::new("bold", "true"));
        pool.put_attrib(Attribute::new("author", "a.1"));
        let (cs, wire) = prepare_for_wire("Z:1>1*1+1$a", &pool).unwrap();
        assert_eq!(cs, "Z:1>1*0+1$a");
        assert_eq!(wire.next_num(), 1);
    }
}
