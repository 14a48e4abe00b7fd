//! Character-indexed string helpers. Changeset lengths count characters,
//! so every slice of text or char bank goes through here.

use crate::shared::error::ChangesetError;

/// Number of characters in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`th character, or `None` past the end.
fn byte_offset(s: &str, n: usize) -> Option<usize> {
    if n == 0 {
        return Some(0);
    }
    match s.char_indices().nth(n) {
        Some((idx, _)) => Some(idx),
        None if char_len(s) == n => Some(s.len()),
        None => None,
    }
}

/// Substring by character positions. Out-of-range bounds are clamped.
pub fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let start_b = byte_offset(s, start).unwrap_or(s.len());
    let end_b = byte_offset(s, end).unwrap_or(s.len()).max(start_b);
    &s[start_b..end_b]
}

/// Forward-only cursor that hands out character runs
#[derive(Debug, Clone)]
pub struct CharCursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> CharCursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn end_of(&self, n: usize) -> Result<usize, ChangesetError> {
        let rest = &self.src[self.pos..];
        byte_offset(rest, n)
            .map(|off| self.pos + off)
            .ok_or_else(|| ChangesetError::invalid(format!("cannot take {} characters, only {} left", n, char_len(rest))))
    }

    pub fn take(&mut self, n: usize) -> Result<&'a str, ChangesetError> {
        let end = self.end_of(n)?;
        let taken = &self.src[self.pos..end];
        self.pos = end;
        Ok(taken)
    }

    pub fn peek(&self, n: usize) -> Result<&'a str, ChangesetError> {
        let end = self.end_of(n)?;
        Ok(&self.src[self.pos..end])
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ChangesetError> {
        self.take(n).map(|_| ())
    }

    pub fn remaining(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.src.len()
    }
}
