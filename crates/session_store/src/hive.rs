use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::paths::KeyPath;

/// A typed structured-store value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegValue {
    Sz(String),
    Dword(i32),
    /// Raw multi-string blob: NUL-terminated strings ending with an empty one.
    MultiSz(Vec<u8>),
}

impl RegValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Sz(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_dword(&self) -> Option<i32> {
        match self {
            Self::Dword(value) => Some(*value),
            _ => None,
        }
    }
}

/// One key of the structured-store tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HiveNode {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, RegValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, HiveNode>,
}

impl HiveNode {
    pub(crate) fn find(&self, path: &KeyPath) -> Option<&HiveNode> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    pub(crate) fn find_mut(&mut self, path: &KeyPath) -> Option<&mut HiveNode> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.children.get_mut(segment))
    }

    pub(crate) fn find_or_create(&mut self, path: &KeyPath) -> &mut HiveNode {
        path.segments().iter().fold(self, |node, segment| {
            node.children.entry(segment.clone()).or_default()
        })
    }

    /// Removes the key at `path` with everything under it.
    pub(crate) fn remove(&mut self, path: &KeyPath) -> bool {
        let Some((parent, last)) = path.split_last() else {
            return false;
        };
        self.find_mut(&parent)
            .map(|node| node.children.remove(last).is_some())
            .unwrap_or(false)
    }
}
