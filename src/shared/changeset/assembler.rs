/**
 * Op Assemblers
 *
 * Assemblers turn a stream of ops into a canonical operation string:
 *
 * - `OpAssembler` concatenates ops as given
 * - `MergingOpAssembler` merges adjacent ops with equal opcode and
 *   attributes, and drops a trailing plain keep at end of document
 * - `SmartOpAssembler` additionally emits removes before inserts between
 *   keeps and tracks the net length change
 */

use crate::shared::changeset::op::{Op, OpCode};

/// Plain concatenation of ops
#[derive(Debug, Default, Clone)]
pub struct OpAssembler {
    buf: String,
}

impl OpAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, op: &Op) {
        self.buf.push_str(&op.to_string());
    }

    pub fn append_str(&mut self, ops: &str) {
        self.buf.push_str(ops);
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Merges adjacent compatible ops. Multi-line ops absorb following
/// single-line text only once another newline arrives, so a merged op with
/// `lines > 0` always ends in a newline.
#[derive(Debug, Default, Clone)]
pub struct MergingOpAssembler {
    assem: OpAssembler,
    buf_op: Op,
    // Chars after the last newline of a multi-line `buf_op`.
    buf_op_additional_chars_after_newline: usize,
}

impl MergingOpAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush(&mut self, is_end_document: bool) {
        if self.buf_op.is_empty() {
            return;
        }
        if is_end_document && self.buf_op.opcode == OpCode::Keep && self.buf_op.attribs.is_empty() {
            // Final plain keeps are implied.
        } else {
            self.assem.append(&self.buf_op);
            if self.buf_op_additional_chars_after_newline > 0 {
                let tail = Op::with_counts(
                    self.buf_op.opcode,
                    self.buf_op_additional_chars_after_newline,
                    0,
                    self.buf_op.attribs.clone(),
                );
                self.assem.append(&tail);
                self.buf_op_additional_chars_after_newline = 0;
            }
        }
        self.buf_op.opcode = OpCode::Empty;
    }

    pub fn append(&mut self, op: &Op) {
        if op.chars == 0 || op.is_empty() {
            return;
        }
        if self.buf_op.opcode == op.opcode && self.buf_op.attribs == op.attribs {
            if op.lines > 0 {
                self.buf_op.chars += self.buf_op_additional_chars_after_newline + op.chars;
                self.buf_op.lines += op.lines;
                self.buf_op_additional_chars_after_newline = 0;
            } else if self.buf_op.lines == 0 {
                self.buf_op.chars += op.chars;
            } else {
                self.buf_op_additional_chars_after_newline += op.chars;
            }
        } else {
            self.flush(false);
            self.buf_op = op.clone();
        }
    }

    pub fn end_document(&mut self) {
        self.flush(true);
    }

    pub fn to_string(&mut self) -> String {
        self.flush(false);
        self.assem.as_str().to_string()
    }

    pub fn clear(&mut self) {
        self.assem.clear();
        self.buf_op.clear();
        self.buf_op_additional_chars_after_newline = 0;
    }
}

/// Canonicalizing assembler used for every changeset the server emits
#[derive(Debug, Default, Clone)]
pub struct SmartOpAssembler {
    minus: MergingOpAssembler,
    plus: MergingOpAssembler,
    keep: MergingOpAssembler,
    assem: OpAssembler,
    last_opcode: OpCode,
    length_change: isize,
}

impl SmartOpAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_keeps(&mut self) {
        let keeps = self.keep.to_string();
        self.assem.append_str(&keeps);
        self.keep.clear();
    }

    fn flush_plus_minus(&mut self) {
        let minus = self.minus.to_string();
        self.assem.append_str(&minus);
        self.minus.clear();
        let plus = self.plus.to_string();
        self.assem.append_str(&plus);
        self.plus.clear();
    }

    pub fn append(&mut self, op: &Op) {
        if op.is_empty() || op.chars == 0 {
            return;
        }
        match op.opcode {
            OpCode::Remove => {
                if self.last_opcode == OpCode::Keep {
                    self.flush_keeps();
                }
                self.minus.append(op);
                self.length_change -= op.chars as isize;
            }
            OpCode::Insert => {
                if self.last_opcode == OpCode::Keep {
                    self.flush_keeps();
                }
                self.plus.append(op);
                self.length_change += op.chars as isize;
            }
            OpCode::Keep => {
                if self.last_opcode != OpCode::Keep {
                    self.flush_plus_minus();
                }
                self.keep.append(op);
            }
            OpCode::Empty => {}
        }
        self.last_opcode = op.opcode;
    }

    pub fn append_all<'a>(&mut self, ops: impl IntoIterator<Item = &'a Op>) {
        for op in ops {
            self.append(op);
        }
    }

    pub fn end_document(&mut self) {
        self.keep.end_document();
    }

    pub fn to_string(&mut self) -> String {
        self.flush_plus_minus();
        self.flush_keeps();
        self.assem.as_str().to_string()
    }

    pub fn clear(&mut self) {
        self.minus.clear();
        self.plus.clear();
        self.keep.clear();
        self.assem.clear();
        self.last_opcode = OpCode::Empty;
        self.length_change = 0;
    }

    pub fn length_change(&self) -> isize {
        self.length_change
    }
}
