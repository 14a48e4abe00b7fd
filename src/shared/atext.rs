//! Attributed Text
//!
//! A pad's content: the text itself plus an attribution string, a run of
//! insert ops whose attributes describe each character. The text always
//! ends in a newline.

use serde::{Deserialize, Serialize};

use crate::shared::apool::AttributePool;
use crate::shared::changeset::apply::{apply_to_attribution, apply_to_text, make_attribution};
use crate::shared::changeset::attributes::decode_attrib_nums;
use crate::shared::changeset::op::{deserialize_ops, Op, OpCode};
use crate::shared::changeset::text::char_len;
use crate::shared::error::ChangesetError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AText {
    pub text: String,
    pub attribs: String,
}

impl AText {
    /// Unattributed text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let attribs = make_attribution(&text);
        Self { text, attribs }
    }

    pub fn with_attribs(text: impl Into<String>, attribs: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attribs: attribs.into(),
        }
    }

    /// Verifies the attribution covers the text exactly and only uses
    /// attributes present in `pool`.
    pub fn check(&self, pool: &AttributePool) -> Result<(), ChangesetError> {
        if !self.text.ends_with('\n') {
            return Err(ChangesetError::invalid("text does not end with a newline"));
        }
        let mut chars = 0;
        let mut lines = 0;
        for op in deserialize_ops(&self.attribs)? {
            if op.opcode != OpCode::Insert {
                return Err(ChangesetError::invalid(format!("attribution contains non-insert op {}", op)));
            }
            for num in decode_attrib_nums(&op.attribs)? {
                pool.require_attrib(num)?;
            }
            chars += op.chars;
            lines += op.lines;
        }
        let text_len = char_len(&self.text);
        if chars != text_len {
            return Err(ChangesetError::LengthMismatch {
                expected: text_len,
                actual: chars,
            });
        }
        let newlines = self.text.matches('\n').count();
        if lines != newlines {
            return Err(ChangesetError::invalid(format!(
                "attribution has {} lines but text has {}",
                lines, newlines
            )));
        }
        Ok(())
    }
}

impl Default for AText {
    fn default() -> Self {
        Self::new("\n")
    }
}

pub fn make_atext(text: &str) -> AText {
    AText::new(text)
}

pub fn apply_to_atext(cs: &str, atext: &AText, pool: &mut AttributePool) -> Result<AText, ChangesetError> {
    Ok(AText {
        text: apply_to_text(cs, &atext.text)?,
        attribs: apply_to_attribution(cs, &atext.attribs, pool)?,
    })
}

/// Attribution ops of `atext` without its final newline.
pub fn ops_from_atext(atext: &AText) -> Result<Vec<Op>, ChangesetError> {
    let mut ops = deserialize_ops(&atext.attribs)?;
    let Some(mut last) = ops.pop() else {
        return Ok(ops);
    };
    if last.lines <= 1 {
        last.lines = 0;
        last.chars = last.chars.saturating_sub(1);
    } else {
        let chars: Vec<char> = atext.text.chars().collect();
        // Length of the final line without its newline.
        let last_line_len = chars[..chars.len().saturating_sub(1)]
            .iter()
            .rev()
            .take_while(|c| **c != '\n')
            .count();
        last.lines -= 1;
        last.chars = last.chars.saturating_sub(last_line_len + 1);
        ops.push(last.clone());
        last.lines = 0;
        last.chars = last_line_len;
    }
    if last.chars > 0 {
        ops.push(last);
    }
    Ok(ops)
}
