/**
 * Changeset Codec
 *
 * Header layout: `Z:<oldLen>(>|<)<|lenDiff|><ops>$<charBank>`, every number
 * in lowercase base-36. Lengths are counted in characters, not bytes.
 */

use std::fmt;
use std::str::FromStr;

use crate::shared::changeset::assembler::SmartOpAssembler;
use crate::shared::changeset::op::{deserialize_ops, is_base36_digit, num_to_string, parse_num, OpCode};
use crate::shared::changeset::text::CharCursor;
use crate::shared::error::ChangesetError;

/// Decoded changeset header plus raw ops and char bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub old_len: usize,
    pub new_len: usize,
    pub ops: String,
    pub char_bank: String,
}

impl Changeset {
    pub fn unpack(cs: &str) -> Result<Self, ChangesetError> {
        let bad_header = || ChangesetError::invalid(format!("not a changeset: '{}'", truncate(cs)));
        let rest = cs.strip_prefix("Z:").ok_or_else(bad_header)?;

        let old_end = rest.bytes().position(|b| !is_base36_digit(b)).ok_or_else(bad_header)?;
        let old_len = parse_num(&rest[..old_end]).map_err(|_| bad_header())?;
        let rest = &rest[old_end..];

        let sign = rest.as_bytes().first().copied().ok_or_else(bad_header)?;
        if sign != b'>' && sign != b'<' {
            return Err(bad_header());
        }
        let rest = &rest[1..];
        let diff_end = rest.bytes().position(|b| !is_base36_digit(b)).unwrap_or(rest.len());
        let diff = parse_num(&rest[..diff_end]).map_err(|_| bad_header())?;
        let rest = &rest[diff_end..];

        let new_len = if sign == b'>' {
            old_len + diff
        } else {
            old_len
                .checked_sub(diff)
                .ok_or_else(|| ChangesetError::invalid("negative new length"))?
        };

        let (ops, char_bank) = match rest.find('$') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };

        Ok(Self {
            old_len,
            new_len,
            ops: ops.to_string(),
            char_bank: char_bank.to_string(),
        })
    }

    pub fn identity(len: usize) -> Self {
        Self {
            old_len: len,
            new_len: len,
            ops: String::new(),
            char_bank: String::new(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty() && self.old_len == self.new_len
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pack(self.old_len, self.new_len, &self.ops, &self.char_bank))
    }
}

impl FromStr for Changeset {
    type Err = ChangesetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::unpack(s)
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(32).collect()
}

pub fn pack(old_len: usize, new_len: usize, ops: &str, char_bank: &str) -> String {
    let (sign, diff) = if new_len >= old_len {
        ('>', new_len - old_len)
    } else {
        ('<', old_len - new_len)
    };
    format!(
        "Z:{}{}{}{}${}",
        num_to_string(old_len),
        sign,
        num_to_string(diff),
        ops,
        char_bank
    )
}

pub fn unpack(cs: &str) -> Result<Changeset, ChangesetError> {
    Changeset::unpack(cs)
}

/// `Z:n>0$`
pub fn identity(len: usize) -> String {
    pack(len, len, "", "")
}

pub fn is_identity(cs: &str) -> bool {
    unpack(cs).map(|c| c.is_identity()).unwrap_or(false)
}

pub fn old_len(cs: &str) -> Result<usize, ChangesetError> {
    Ok(unpack(cs)?.old_len)
}

pub fn new_len(cs: &str) -> Result<usize, ChangesetError> {
    Ok(unpack(cs)?.new_len)
}

/// Full structural validation. A changeset passes only if it is internally
/// consistent and already in canonical form.
pub fn check_rep(cs: &str) -> Result<Changeset, ChangesetError> {
    let unpacked = Changeset::unpack(cs)?;
    let ops = deserialize_ops(&unpacked.ops)?;
    let mut bank = CharCursor::new(&unpacked.char_bank);
    let mut assem = SmartOpAssembler::new();
    let mut old_pos = 0usize;
    let mut calc_new_len = 0usize;

    for op in &ops {
        match op.opcode {
            OpCode::Keep => {
                old_pos += op.chars;
                calc_new_len += op.chars;
                if old_pos > unpacked.old_len {
                    return Err(ChangesetError::invalid("keep extends past end of text"));
                }
            }
            OpCode::Remove => {
                old_pos += op.chars;
                if old_pos > unpacked.old_len {
                    return Err(ChangesetError::invalid("remove extends past end of text"));
                }
            }
            OpCode::Insert => {
                let inserted = bank
                    .take(op.chars)
                    .map_err(|_| ChangesetError::invalid("char bank is too short"))?;
                let newlines = inserted.matches('\n').count();
                if newlines != op.lines {
                    return Err(ChangesetError::invalid(format!(
                        "insert covers {} newlines but claims {}",
                        newlines, op.lines
                    )));
                }
                if op.lines > 0 && !inserted.ends_with('\n') {
                    return Err(ChangesetError::invalid("multi-line insert does not end with a newline"));
                }
                calc_new_len += op.chars;
                if calc_new_len > unpacked.new_len {
                    return Err(ChangesetError::invalid("inserts exceed new length"));
                }
            }
            OpCode::Empty => {}
        }
        assem.append(op);
    }

    calc_new_len += unpacked.old_len - old_pos;
    if calc_new_len != unpacked.new_len {
        return Err(ChangesetError::invalid(format!(
            "new length {} does not match ops ({})",
            unpacked.new_len, calc_new_len
        )));
    }
    if !bank.is_done() {
        return Err(ChangesetError::invalid("char bank has unused characters"));
    }

    assem.end_document();
    let normalized = pack(unpacked.old_len, calc_new_len, &assem.to_string(), &unpacked.char_bank);
    if normalized != cs {
        return Err(ChangesetError::invalid("not in canonical form"));
    }
    Ok(unpacked)
}
