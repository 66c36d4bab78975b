//! Most-recently-used session list.
//!
//! Stored as one multi-string value under `<root>\Jumplist`: NUL-terminated
//! names, most recent first, closed by an empty string.

use tracing::{debug, warn};

use crate::error::RecentListError;
use crate::hive::RegValue;
use crate::paths::KeyPath;
use crate::registry::Registry;
use crate::settings::SettingsStore;

pub const RECENT_SESSIONS_VALUE: &str = "Recent sessions";

/// Encodes names as a multi-string blob.
#[must_use]
pub fn encode_list(entries: &[String]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(entries.iter().map(|entry| entry.len() + 1).sum::<usize>() + 1);
    for entry in entries {
        blob.extend_from_slice(entry.as_bytes());
        blob.push(0);
    }
    blob.push(0);
    if entries.is_empty() {
        blob.push(0);
    }
    blob
}

/// Decodes a multi-string blob; `None` when no double NUL closes it.
#[must_use]
pub fn decode_list(blob: &[u8]) -> Option<Vec<String>> {
    let end = blob.windows(2).position(|pair| pair == [0, 0])?;
    let body = &blob[..=end];
    Some(
        body.split(|&byte| byte == 0)
            .take_while(|entry| !entry.is_empty())
            .map(|entry| String::from_utf8_lossy(entry).into_owned())
            .collect(),
    )
}

fn read_list(registry: &dyn Registry, jumplist: &KeyPath) -> Result<Vec<String>, RecentListError> {
    match registry.query_value(jumplist, RECENT_SESSIONS_VALUE) {
        None => Ok(Vec::new()),
        Some(RegValue::MultiSz(blob)) => Ok(decode_list(&blob).unwrap_or_else(|| {
            debug!("recent sessions value is unterminated; starting empty");
            Vec::new()
        })),
        Some(_) => {
            debug!("recent sessions value has the wrong type; replacing it");
            registry
                .delete_value(jumplist, RECENT_SESSIONS_VALUE)
                .map_err(RecentListError::ValueRead)?;
            Ok(Vec::new())
        }
    }
}

/// Prepends `add`, drops `rem`, and keeps only entries that still `exist`.
///
/// With neither `add` nor `rem` the stored list is returned unchanged.
pub fn transform(
    registry: &dyn Registry,
    jumplist: &KeyPath,
    add: Option<&str>,
    rem: Option<&str>,
    exists: &dyn Fn(&str) -> bool,
) -> Result<Vec<String>, RecentListError> {
    registry
        .create_key(jumplist)
        .map_err(RecentListError::KeyOpenCreate)?;

    let current = read_list(registry, jumplist)?;
    if add.is_none() && rem.is_none() {
        return Ok(current);
    }

    let mut updated: Vec<String> = Vec::with_capacity(current.len() + 1);
    if let Some(add) = add {
        updated.push(add.to_string());
    }
    for entry in current {
        if rem == Some(entry.as_str()) || updated.contains(&entry) {
            continue;
        }
        if exists(&entry) {
            updated.push(entry);
        } else {
            debug!(session = %entry, "pruning stale recent session");
        }
    }

    registry
        .set_value(
            jumplist,
            RECENT_SESSIONS_VALUE,
            RegValue::MultiSz(encode_list(&updated)),
        )
        .map_err(RecentListError::ValueWrite)?;
    Ok(updated)
}

/// Recent-session operations bound to a [`SettingsStore`].
pub struct RecentList<'a> {
    store: &'a SettingsStore,
}

impl<'a> RecentList<'a> {
    #[must_use]
    pub fn new(store: &'a SettingsStore) -> Self {
        Self { store }
    }

    fn apply(&self, add: Option<&str>, rem: Option<&str>) -> Result<Vec<String>, RecentListError> {
        let exists = |name: &str| self.store.open_read(name).is_some();
        transform(
            self.store.registry(),
            &self.store.layout().jumplist,
            add,
            rem,
            &exists,
        )
    }

    /// Moves `name` to the front.
    pub fn add_entry(&self, name: &str) -> Result<(), RecentListError> {
        self.apply(Some(name), Some(name)).map(|_| ())
    }

    pub fn remove_entry(&self, name: &str) -> Result<(), RecentListError> {
        self.apply(None, Some(name)).map(|_| ())
    }

    /// Current list, most recent first. Empty on any failure.
    #[must_use]
    pub fn get_entries(&self) -> Vec<String> {
        self.apply(None, None).unwrap_or_else(|error| {
            warn!(%error, "recent sessions unavailable");
            Vec::new()
        })
    }
}

impl SettingsStore {
    #[must_use]
    pub fn recent(&self) -> RecentList<'_> {
        RecentList::new(self)
    }
}
