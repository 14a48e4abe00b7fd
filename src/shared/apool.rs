//! Attribute Pool
//!
//! Interns `(key, value)` attribute pairs to dense integer ids. Changesets and
//! attributed text refer to attributes only through `*N` markers, so every
//! pad carries its own pool and every wire message carries a pool for the
//! ids it mentions.
//!
//! # Wire Form
//!
//! ```json
//! {"numToAttrib": {"0": ["author", "a.x"], "1": ["bold", "true"]}, "nextNum": 2}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::shared::error::ChangesetError;

/// A single `(key, value)` pair. An empty value clears the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl From<(String, String)> for Attribute {
    fn from((key, value): (String, String)) -> Self {
        Self { key, value }
    }
}

impl From<Attribute> for (String, String) {
    fn from(attrib: Attribute) -> Self {
        (attrib.key, attrib.value)
    }
}

/// JSON shape of a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolJson {
    #[serde(default)]
    pub num_to_attrib: BTreeMap<usize, Attribute>,
    #[serde(default)]
    pub next_num: usize,
}

/// Per-pad attribute interner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PoolJson", into = "PoolJson")]
pub struct AttributePool {
    num_to_attrib: HashMap<usize, Attribute>,
    attrib_to_num: HashMap<Attribute, usize>,
    next_num: usize,
}

impl AttributePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `attrib`, interning it at `next_num` if absent.
    pub fn put_attrib(&mut self, attrib: Attribute) -> usize {
        if let Some(num) = self.attrib_to_num.get(&attrib) {
            return *num;
        }
        let num = self.next_num;
        self.next_num += 1;
        self.attrib_to_num.insert(attrib.clone(), num);
        self.num_to_attrib.insert(num, attrib);
        num
    }

    /// Lookup without interning (`putAttrib` with `dontAddIfAbsent`).
    pub fn attrib_num(&self, attrib: &Attribute) -> Option<usize> {
        self.attrib_to_num.get(attrib).copied()
    }

    pub fn get_attrib(&self, num: usize) -> Option<&Attribute> {
        self.num_to_attrib.get(&num)
    }

    /// Like [`get_attrib`](Self::get_attrib) but fails for unknown ids.
    pub fn require_attrib(&self, num: usize) -> Result<&Attribute, ChangesetError> {
        self.get_attrib(num).ok_or(ChangesetError::UnknownAttribute(num))
    }

    pub fn get_attrib_key(&self, num: usize) -> Option<&str> {
        self.get_attrib(num).map(|a| a.key.as_str())
    }

    pub fn get_attrib_value(&self, num: usize) -> Option<&str> {
        self.get_attrib(num).map(|a| a.value.as_str())
    }

    pub fn next_num(&self) -> usize {
        self.next_num
    }

    pub fn len(&self) -> usize {
        self.num_to_attrib.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_to_attrib.is_empty()
    }

    /// Visits attributes in id order.
    pub fn each_attrib(&self, mut f: impl FnMut(usize, &Attribute)) {
        for num in 0..self.next_num {
            if let Some(attrib) = self.num_to_attrib.get(&num) {
                f(num, attrib);
            }
        }
    }

    pub fn to_jsonable(&self) -> PoolJson {
        PoolJson {
            num_to_attrib: self
                .num_to_attrib
                .iter()
                .map(|(num, attrib)| (*num, attrib.clone()))
                .collect(),
            next_num: self.next_num,
        }
    }

    pub fn from_jsonable(json: PoolJson) -> Self {
        let mut pool = Self::new();
        for (num, attrib) in json.num_to_attrib {
            pool.attrib_to_num.insert(attrib.clone(), num);
            pool.num_to_attrib.insert(num, attrib);
            pool.next_num = pool.next_num.max(num + 1);
        }
        pool.next_num = pool.next_num.max(json.next_num);
        pool
    }

    /// Verifies that ids are dense and every key is non-empty.
    pub fn check(&self) -> Result<(), ChangesetError> {
        if self.num_to_attrib.len() != self.next_num {
            return Err(ChangesetError::invalid(format!(
                "pool has {} attributes but nextNum is {}",
                self.num_to_attrib.len(),
                self.next_num
            )));
        }
        for num in 0..self.next_num {
            let attrib = self.require_attrib(num)?;
            if attrib.key.is_empty() {
                return Err(ChangesetError::invalid(format!("attribute {} has an empty key", num)));
            }
            if self.attrib_to_num.get(attrib) != Some(&num) {
                return Err(ChangesetError::invalid(format!("attribute {} is not indexed", num)));
            }
        }
        Ok(())
    }
}

impl From<PoolJson> for AttributePool {
    fn from(json: PoolJson) -> Self {
        Self::from_jsonable(json)
    }
}

impl From<AttributePool> for PoolJson {
    fn from(pool: AttributePool) -> Self {
        pool.to_jsonable()
    }
}
