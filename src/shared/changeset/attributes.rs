/**
 * Attribute Strings
 *
 * An op's attribute string is a run of `*N` markers, each naming an
 * attribute in the pool. `AttributeMap` is the decoded, key-sorted view
 * used to combine two attribute strings.
 */

use std::collections::BTreeMap;

use crate::shared::apool::{Attribute, AttributePool};
use crate::shared::changeset::op::{is_base36_digit, num_to_string, parse_num};
use crate::shared::error::ChangesetError;

/// Decodes `*0*a` into `[0, 10]`.
pub fn decode_attrib_nums(attribs: &str) -> Result<Vec<usize>, ChangesetError> {
    if attribs.is_empty() {
        return Ok(Vec::new());
    }
    let rest = attribs
        .strip_prefix('*')
        .ok_or_else(|| ChangesetError::MalformedOp(format!("bad attribute string '{}'", attribs)))?;
    rest.split('*').map(parse_num).collect()
}

pub fn encode_attrib_nums(nums: impl IntoIterator<Item = usize>) -> String {
    nums.into_iter().map(|n| format!("*{}", num_to_string(n))).collect()
}

/// Key-sorted attribute set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: BTreeMap<String, String>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attribs_string(attribs: &str, pool: &AttributePool) -> Result<Self, ChangesetError> {
        let mut map = Self::new();
        map.update_from_string(attribs, pool, false)?;
        Ok(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Applies `attribs` on top of this map. With `empty_value_is_delete`,
    /// an empty value removes its key instead of being stored.
    pub fn update<'a>(
        &mut self,
        attribs: impl IntoIterator<Item = &'a Attribute>,
        empty_value_is_delete: bool,
    ) -> &mut Self {
        for attrib in attribs {
            if empty_value_is_delete && attrib.value.is_empty() {
                self.entries.remove(&attrib.key);
            } else {
                self.entries.insert(attrib.key.clone(), attrib.value.clone());
            }
        }
        self
    }

    pub fn update_from_string(
        &mut self,
        attribs: &str,
        pool: &AttributePool,
        empty_value_is_delete: bool,
    ) -> Result<&mut Self, ChangesetError> {
        let decoded = decode_attrib_nums(attribs)?
            .into_iter()
            .map(|n| pool.require_attrib(n).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.update(decoded.iter(), empty_value_is_delete))
    }

    /// Encodes the map, interning any attribute the pool lacks.
    pub fn to_attribs_string(&self, pool: &mut AttributePool) -> String {
        encode_attrib_nums(
            self.entries
                .iter()
                .map(|(k, v)| pool.put_attrib(Attribute::new(k.clone(), v.clone())))
                .collect::<Vec<_>>(),
        )
    }
}

/// Encodes attribute pairs for an op of the given kind. Inserts drop
/// empty-valued pairs; keeps retain them so they clear the key.
pub fn attribs_from_pairs(attribs: &[Attribute], is_insert: bool, pool: &mut AttributePool) -> String {
    let mut map = AttributeMap::new();
    map.update(attribs.iter(), is_insert);
    map.to_attribs_string(pool)
}

/// Combines two attribute strings as if `att2` were applied after `att1`.
pub fn compose_attributes(
    att1: &str,
    att2: &str,
    result_is_mutation: bool,
    pool: &mut AttributePool,
) -> Result<String, ChangesetError> {
    if att1.is_empty() && result_is_mutation {
        return Ok(att2.to_string());
    }
    if att2.is_empty() {
        return Ok(att1.to_string());
    }
    let mut map = AttributeMap::from_attribs_string(att1, pool)?;
    map.update_from_string(att2, pool, !result_is_mutation)?;
    Ok(map.to_attribs_string(pool))
}

/// Attributes of `att2` that still need applying after `att1` won. For a key
/// set on both sides the lexically earlier value wins.
pub fn follow_attributes(att1: &str, att2: &str, pool: &AttributePool) -> Result<String, ChangesetError> {
    if att2.is_empty() {
        return Ok(String::new());
    }
    if att1.is_empty() {
        return Ok(att2.to_string());
    }
    let mut remaining: Vec<Attribute> = decode_attrib_nums(att2)?
        .into_iter()
        .map(|n| pool.require_attrib(n).cloned())
        .collect::<Result<_, _>>()?;
    for num in decode_attrib_nums(att1)? {
        let theirs = pool.require_attrib(num)?;
        remaining.retain(|mine| !(mine.key == theirs.key && theirs.value <= mine.value));
    }
    let nums = remaining
        .iter()
        .map(|attrib| pool.attrib_num(attrib).ok_or_else(|| ChangesetError::invalid("attribute vanished from pool")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(encode_attrib_nums(nums))
}

/// True when the attribute string carries `attrib`.
pub fn has_attrib(attribs: &str, attrib: &Attribute, pool: &AttributePool) -> bool {
    let Some(num) = pool.attrib_num(attrib) else {
        return false;
    };
    decode_attrib_nums(attribs)
        .map(|nums| nums.contains(&num))
        .unwrap_or(false)
}

/// Rewrites every `*N` marker in a changeset's ops through `map_num`,
/// leaving the char bank untouched.
pub fn rewrite_attrib_markers(
    cs: &str,
    mut map_num: impl FnMut(usize) -> Result<usize, ChangesetError>,
) -> Result<String, ChangesetError> {
    let (ops, bank) = match cs.find('$') {
        Some(idx) => (&cs[..idx], &cs[idx..]),
        None => (cs, ""),
    };
    let bytes = ops.as_bytes();
    let mut out = String::with_capacity(cs.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'*' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && is_base36_digit(bytes[end]) {
                end += 1;
            }
            let num = parse_num(&ops[start..end])?;
            out.push('*');
            out.push_str(&num_to_string(map_num(num)?));
            i = end;
        } else {
            let ch_len = ops[i..].chars().next().map(char::len_utf8).unwrap_or(1);
            out.push_str(&ops[i..i + ch_len]);
            i += ch_len;
        }
    }
    out.push_str(bank);
    Ok(out)
}
