//! Flat-file session records.
//!
//! A session file is a list of `ENC(key) "\" ENC(value) "\" "\n"` records,
//! where `ENC` is [`encode_store`]. Order carries no meaning; a truncated last
//! record is dropped.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::{decode_store_capped, encode_store, MAX_DECODED_LEN};
use crate::error::StoreError;
use crate::report::ErrorReporter;

/// Pending settings of one session, written out on [`RecordWriter::close`].
#[derive(Debug)]
pub struct RecordWriter {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    widest: usize,
}

impl RecordWriter {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
            widest: 0,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.widest = self.widest.max(key.len() + 1).max(value.len() + 1);
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn set_int(&mut self, key: &str, value: i32) {
        self.set_str(key, &value.to_string());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates the session directory if needed, truncates the target file and
    /// writes every record. Failures are reported and returned.
    pub fn close(self, reporter: &dyn ErrorReporter) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            if let Err(source) = fs::create_dir_all(dir) {
                reporter.report(
                    "Unable to create directory for storing sessions",
                    Some(&dir.display().to_string()),
                );
                return Err(StoreError::io("creating session directory", dir, source));
            }
        }

        let file = match File::create(&self.path) {
            Ok(file) => file,
            Err(source) => {
                reporter.report(
                    "Unable to open file for writing",
                    Some(&self.path.display().to_string()),
                );
                return Err(StoreError::io("opening session file", &self.path, source));
            }
        };

        let mut out = BufWriter::new(file);
        let mut line = String::with_capacity(3 * self.widest.max(16));
        for (key, value) in &self.entries {
            line.clear();
            push_record(&mut line, key, value);
            if let Err(source) = out.write_all(line.as_bytes()) {
                reporter.report("Unable to save settings", Some(key));
                return Err(StoreError::io("writing session file", &self.path, source));
            }
        }
        if let Err(source) = out.flush() {
            reporter.report("Unable to save settings", Some(&self.path.display().to_string()));
            return Err(StoreError::io("writing session file", &self.path, source));
        }

        debug!(path = %self.path.display(), records = self.entries.len(), "session saved");
        Ok(())
    }
}

fn push_record(out: &mut String, key: &str, value: &str) {
    out.push_str(&encode_store(key));
    out.push('\\');
    out.push_str(&encode_store(value));
    out.push_str("\\\n");
}

/// Serializes raw key/value pairs into the on-disk record format.
#[must_use]
pub fn serialize_records<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        push_record(&mut out, key, value);
    }
    out
}

/// Splits file contents into (encoded key, encoded value) pairs.
///
/// Accepts `\r\n` terminators. Stops at the first record that lacks either
/// `\` separator.
#[must_use]
pub fn parse_records(bytes: &[u8]) -> Vec<(String, String)> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(key_end) = find_separator(bytes, pos) else {
            break;
        };
        let value_start = key_end + 1;
        let Some(value_end) = find_separator(bytes, value_start) else {
            break;
        };

        records.push((
            String::from_utf8_lossy(&bytes[pos..key_end]).into_owned(),
            String::from_utf8_lossy(&bytes[value_start..value_end]).into_owned(),
        ));

        pos = value_end + 1;
        if bytes.get(pos) == Some(&b'\r') {
            pos += 1;
        }
        if bytes.get(pos) == Some(&b'\n') {
            pos += 1;
        }
    }

    records
}

fn find_separator(bytes: &[u8], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|&byte| byte == b'\\')
        .map(|offset| from + offset)
}

/// Optional leading whitespace and sign, then at least one digit. Trailing
/// text is ignored; out-of-range values are `None`.
fn parse_leading_int(value: &str) -> Option<i32> {
    let trimmed = value.trim_start();
    let unsigned = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
    let digits = unsigned
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    let sign_len = trimmed.len() - unsigned.len();
    trimmed[..sign_len + digits].parse().ok()
}

/// Loaded contents of one session file. Values are decoded on lookup.
#[derive(Debug, Clone, Default)]
pub struct RecordReader {
    records: Vec<(String, String)>,
}

impl RecordReader {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let bytes =
            fs::read(path).map_err(|source| StoreError::io("reading session file", path, source))?;
        Ok(Self::from_bytes(&bytes))
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            records: parse_records(bytes),
        }
    }

    /// Looks up `key` by its encoded form and decodes the stored value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        let encoded = encode_store(key);
        self.records
            .iter()
            .find(|(stored, _)| *stored == encoded)
            .map(|(_, value)| decode_store_capped(value, MAX_DECODED_LEN))
    }

    /// Reads the leading integer of the value, so `"42abc"` is 42. A value
    /// with no leading digits gives `default`.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get_str(key)
            .and_then(|value| parse_leading_int(&value))
            .unwrap_or(default)
    }

    /// Decoded key/value pairs in file order.
    pub fn entries(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.records.iter().map(|(key, value)| {
            (
                decode_store_capped(key, MAX_DECODED_LEN),
                decode_store_capped(value, MAX_DECODED_LEN),
            )
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
