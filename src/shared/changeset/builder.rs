/**
 * Changeset Builder
 *
 * Builds canonical changesets from keep/insert/remove steps:
 *
 * ```rust
 * use xfpad::shared::changeset::Builder;
 *
 * let mut builder = Builder::new(4);
 * builder.keep(3, 0, "").insert("456", "");
 * assert_eq!(builder.to_string(), "Z:4>3=3+3$456");
 * ```
 */

use crate::shared::changeset::assembler::SmartOpAssembler;
use crate::shared::changeset::codec::pack;
use crate::shared::changeset::op::{Op, OpCode};
use crate::shared::changeset::text::char_len;

/// Splits `text` into at most two ops so each op's line count is exact:
/// everything through the last newline, then the remainder.
pub fn ops_from_text(opcode: OpCode, text: &str, attribs: &str) -> Vec<Op> {
    match text.rfind('\n') {
        None => vec![Op::with_counts(opcode, char_len(text), 0, attribs)],
        Some(last_nl) => {
            let head = &text[..=last_nl];
            let tail = &text[last_nl + 1..];
            vec![
                Op::with_counts(opcode, char_len(head), head.matches('\n').count(), attribs),
                Op::with_counts(opcode, char_len(tail), 0, attribs),
            ]
        }
    }
}

pub struct Builder {
    old_len: usize,
    assem: SmartOpAssembler,
    char_bank: String,
}

impl Builder {
    pub fn new(old_len: usize) -> Self {
        Self {
            old_len,
            assem: SmartOpAssembler::new(),
            char_bank: String::new(),
        }
    }

    pub fn keep(&mut self, chars: usize, lines: usize, attribs: &str) -> &mut Self {
        self.assem.append(&Op::with_counts(OpCode::Keep, chars, lines, attribs));
        self
    }

    pub fn keep_text(&mut self, text: &str, attribs: &str) -> &mut Self {
        for op in ops_from_text(OpCode::Keep, text, attribs) {
            self.assem.append(&op);
        }
        self
    }

    pub fn insert(&mut self, text: &str, attribs: &str) -> &mut Self {
        for op in ops_from_text(OpCode::Insert, text, attribs) {
            self.assem.append(&op);
        }
        self.char_bank.push_str(text);
        self
    }

    pub fn remove(&mut self, chars: usize, lines: usize) -> &mut Self {
        self.assem.append(&Op::with_counts(OpCode::Remove, chars, lines, ""));
        self
    }

    pub fn to_string(&mut self) -> String {
        self.assem.end_document();
        let ops = self.assem.to_string();
        let new_len = (self.old_len as isize + self.assem.length_change()).max(0) as usize;
        pack(self.old_len, new_len, &ops, &self.char_bank)
    }
}
