use std::fmt;
use std::path::{Path, PathBuf};

use crate::codec::{encode_fs, encode_store};
use crate::error::StoreError;

/// Session name used when the caller passes an empty name.
pub const DEFAULT_SESSION: &str = "Default Settings";

pub const SESSIONS_DIR: &str = "sessions";
pub const HOST_KEYS_DIR: &str = "sshhostkeys";
pub const SEED_FILE: &str = "putty.rnd";

/// Longest suffix kept for session and host key filenames.
pub const MAX_SUFFIX_LEN: usize = 15;

/// Longest single structured-store key segment, in bytes.
pub const MAX_KEY_SEGMENT_LEN: usize = 255;

/// Longest structured-store key path, separators included.
pub const MAX_KEY_PATH_LEN: usize = 1024;

#[must_use]
pub fn canonical_session_name(name: &str) -> &str {
    if name.is_empty() {
        DEFAULT_SESSION
    } else {
        name
    }
}

/// Filename of a session record: both escaping layers, then the suffix.
#[must_use]
pub fn session_file_name(session_name: &str, suffix: &str) -> String {
    let mut name = encode_fs(&encode_store(canonical_session_name(session_name)));
    name.push_str(suffix);
    name
}

/// Filename of a host key record. `lookup_name` is already store-encoded.
#[must_use]
pub fn host_key_file_name(lookup_name: &str, suffix: &str) -> String {
    let mut name = encode_fs(lookup_name);
    name.push_str(suffix);
    name
}

#[must_use]
pub fn clamp_suffix(suffix: &str) -> String {
    let mut end = suffix.len().min(MAX_SUFFIX_LEN);
    while !suffix.is_char_boundary(end) {
        end -= 1;
    }
    suffix[..end].to_string()
}

/// Where the file backend keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub sessions_dir: PathBuf,
    pub host_keys_dir: PathBuf,
    pub seed_file: PathBuf,
    pub session_suffix: String,
    pub key_suffix: String,
}

impl StorePaths {
    /// Default layout beside the program directory.
    #[must_use]
    pub fn under(program_dir: &Path) -> Self {
        Self {
            sessions_dir: program_dir.join(SESSIONS_DIR),
            host_keys_dir: program_dir.join(HOST_KEYS_DIR),
            seed_file: program_dir.join(SEED_FILE),
            session_suffix: String::new(),
            key_suffix: String::new(),
        }
    }

    #[must_use]
    pub fn with_suffixes(mut self, session_suffix: &str, key_suffix: &str) -> Self {
        self.session_suffix = clamp_suffix(session_suffix);
        self.key_suffix = clamp_suffix(key_suffix);
        self
    }

    #[must_use]
    pub fn session_file(&self, session_name: &str) -> PathBuf {
        self.sessions_dir
            .join(session_file_name(session_name, &self.session_suffix))
    }

    #[must_use]
    pub fn host_key_file(&self, lookup_name: &str) -> PathBuf {
        self.host_keys_dir
            .join(host_key_file_name(lookup_name, &self.key_suffix))
    }
}

/// Bounded list of structured-store key segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
    byte_len: usize,
}

impl KeyPath {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a `\`-separated path such as `Software\SimonTatham\PuTTY`.
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let mut key = Self::root();
        for segment in path.split('\\').filter(|segment| !segment.is_empty()) {
            key.push(segment)?;
        }
        Ok(key)
    }

    pub fn push(&mut self, segment: &str) -> Result<(), StoreError> {
        if segment.is_empty() || segment.contains('\\') {
            return Err(StoreError::InvalidKeySegment {
                segment: segment.to_string(),
            });
        }
        if segment.len() > MAX_KEY_SEGMENT_LEN {
            return Err(StoreError::KeySegmentTooLong {
                segment: segment.to_string(),
                len: segment.len(),
                max: MAX_KEY_SEGMENT_LEN,
            });
        }

        let separator = usize::from(!self.segments.is_empty());
        let byte_len = self.byte_len + separator + segment.len();
        if byte_len > MAX_KEY_PATH_LEN {
            return Err(StoreError::KeyPathTooLong {
                max: MAX_KEY_PATH_LEN,
            });
        }

        self.segments.push(segment.to_string());
        self.byte_len = byte_len;
        Ok(())
    }

    pub fn join(&self, segment: &str) -> Result<Self, StoreError> {
        let mut joined = self.clone();
        joined.push(segment)?;
        Ok(joined)
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Splits off the last segment.
    #[must_use]
    pub fn split_last(&self) -> Option<(Self, &str)> {
        let (last, rest) = self.segments.split_last()?;
        let parent = Self {
            segments: rest.to_vec(),
            byte_len: self.byte_len.saturating_sub(last.len() + usize::from(!rest.is_empty())),
        };
        Some((parent, last.as_str()))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("\\"))
    }
}
