/**
 * Changeset Operations
 *
 * A changeset body is a run of operations, each shaped
 * `(*N)*(|L)?[=+-]C` where every number is lowercase base-36:
 *
 * - `*N` - attribute markers referring to the owning pool
 * - `|L` - number of newlines covered by the operation
 * - `=` keep, `+` insert, `-` remove
 * - `C` - number of characters covered
 */

use std::fmt;

use crate::shared::error::ChangesetError;

/// Kind of an operation. `Empty` marks a consumed or absent op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpCode {
    #[default]
    Empty,
    Keep,
    Insert,
    Remove,
}

impl OpCode {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(Self::Keep),
            '+' => Some(Self::Insert),
            '-' => Some(Self::Remove),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::Keep => "=",
            Self::Insert => "+",
            Self::Remove => "-",
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::Empty
    }
}

/// One step of a changeset or one run of an attribution string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Op {
    pub opcode: OpCode,
    pub chars: usize,
    pub lines: usize,
    pub attribs: String,
}

impl Op {
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            ..Default::default()
        }
    }

    pub fn with_counts(opcode: OpCode, chars: usize, lines: usize, attribs: impl Into<String>) -> Self {
        Self {
            opcode,
            chars,
            lines,
            attribs: attribs.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.opcode.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.attribs)?;
        if self.lines > 0 {
            write!(f, "|{}", num_to_string(self.lines))?;
        }
        write!(f, "{}{}", self.opcode.as_str(), num_to_string(self.chars))
    }
}

/// Lowercase base-36 rendering.
pub fn num_to_string(mut n: usize) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[n % 36]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Parses lowercase base-36. Uppercase digits are rejected.
pub fn parse_num(s: &str) -> Result<usize, ChangesetError> {
    if s.is_empty() || !s.bytes().all(is_base36_digit) {
        return Err(ChangesetError::MalformedOp(format!("bad number '{}'", s)));
    }
    usize::from_str_radix(s, 36).map_err(|e| ChangesetError::MalformedOp(format!("bad number '{}': {}", s, e)))
}

pub(crate) fn is_base36_digit(b: u8) -> bool {
    b.is_ascii_digit() || b.is_ascii_lowercase()
}

/// Streaming parser over an operation string
pub struct OpIter<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> OpIter<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn take_digits(&mut self) -> &'a str {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        while self.pos < bytes.len() && is_base36_digit(bytes[self.pos]) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn parse_one(&mut self) -> Result<Op, ChangesetError> {
        let bytes = self.src.as_bytes();
        let attribs_start = self.pos;
        while self.pos < bytes.len() && bytes[self.pos] == b'*' {
            self.pos += 1;
            if self.take_digits().is_empty() {
                return Err(self.malformed());
            }
        }
        let attribs = &self.src[attribs_start..self.pos];

        let mut lines = 0;
        if self.pos < bytes.len() && bytes[self.pos] == b'|' {
            self.pos += 1;
            lines = parse_num(self.take_digits()).map_err(|_| self.malformed())?;
        }

        let opcode = bytes
            .get(self.pos)
            .and_then(|b| OpCode::from_char(*b as char))
            .ok_or_else(|| self.malformed())?;
        self.pos += 1;

        let chars = parse_num(self.take_digits()).map_err(|_| self.malformed())?;
        Ok(Op::with_counts(opcode, chars, lines, attribs))
    }

    fn malformed(&self) -> ChangesetError {
        let rest: String = self.src[self.pos.min(self.src.len())..].chars().take(16).collect();
        ChangesetError::MalformedOp(format!("unexpected input at {}: '{}'", self.pos, rest))
    }
}

impl Iterator for OpIter<'_> {
    type Item = Result<Op, ChangesetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.src.len() {
            return None;
        }
        let item = self.parse_one();
        if item.is_err() {
            // Stop after the first error.
            self.pos = self.src.len();
        }
        Some(item)
    }
}

/// Parses a whole operation string.
pub fn deserialize_ops(ops: &str) -> Result<Vec<Op>, ChangesetError> {
    OpIter::new(ops).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_base36() {
        assert_eq!(num_to_string(0), "0");
        assert_eq!(num_to_string(35), "z");
        assert_eq!(num_to_string(36), "10");
        assert_eq!(parse_num("z").unwrap(), 35);
        assert_eq!(parse_num("10").unwrap(), 36);
        assert!(parse_num("Z").is_err());
        assert!(parse_num("").is_err());
    }

    #[test]
    fn test_op_display() {
        assert_eq!(Op::with_counts(OpCode::Keep, 4, 2, "").to_string(), "|2=4");
        assert_eq!(Op::with_counts(OpCode::Insert, 3, 0, "*0*1").to_string(), "*0*1+3");
        assert_eq!(Op::with_counts(OpCode::Remove, 36, 0, "").to_string(), "-10");
    }

    #[test]
    fn test_deserialize_ops() {
        let ops = deserialize_ops("|2=m=b*0|1+1").unwrap();
        assert_eq!(
            ops,
            vec![
                Op::with_counts(OpCode::Keep, 22, 2, ""),
                Op::with_counts(OpCode::Keep, 11, 0, ""),
                Op::with_counts(OpCode::Insert, 1, 1, "*0"),
            ]
        );
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(deserialize_ops("=1x").is_err());
        assert!(deserialize_ops("*=1").is_err());
        assert!(deserialize_ops("=A").is_err());
        assert!(deserialize_ops("|=1").is_err());
        assert!(deserialize_ops("+").is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let src = "*0*a|3+1k=5-2";
        let rendered: String = deserialize_ops(src)
            .unwrap()
            .iter()
            .map(|op| op.to_string())
            .collect();
        assert_eq!(rendered, src);
    }
}
