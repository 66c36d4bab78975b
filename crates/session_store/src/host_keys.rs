//! Cached host keys, keyed by key type, port and host name.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::codec::encode_store;
use crate::error::StoreError;
use crate::hive::RegValue;
use crate::registry::Registry;
use crate::report::{Confirm, Confirmation, ErrorReporter};
use crate::settings::{Backend, SettingsStore};

/// Outcome of comparing a presented key with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyStatus {
    Match,
    Mismatch,
    Absent,
}

pub const MIGRATION_PROMPT: &str = "The host key is cached in the Windows registry. \
Do you want to move it to a file? \n\n\
Yes \t-> Move to file (and delete from registry)\n\
No \t-> Copy to file (and keep in registry)\n\
Cancel \t-> Do nothing and continue this session\n";

/// `"{keytype}@{port}:" + encode_store(hostname)`.
#[must_use]
pub fn host_key_name(hostname: &str, port: u16, keytype: &str) -> String {
    format!("{keytype}@{port}:{}", encode_store(hostname))
}

/// Reorders the digits of one old-format bignum into plain hex.
///
/// Old numbers are groups of four digits, least significant group first,
/// most significant digit first inside a group. The output is most
/// significant digit first with leading zeros removed, keeping at least one
/// digit. `None` unless `digits.len()` is a non-zero multiple of four.
#[must_use]
pub fn permute_legacy_digits(digits: &[u8]) -> Option<Vec<u8>> {
    if digits.is_empty() || digits.len() % 4 != 0 {
        return None;
    }

    let mut ndigits = digits.len();
    while ndigits > 1 && digits[(ndigits - 1) ^ 3] == b'0' {
        ndigits -= 1;
    }

    let mut out = vec![0; ndigits];
    for j in 0..ndigits {
        out[ndigits - 1 - j] = digits[j ^ 3];
    }
    Some(out)
}

/// Converts `"<bignum>/<bignum>"` into `"0x<hex>,0x<hex>"`.
///
/// `None` when the value does not have two well-formed numbers.
#[must_use]
pub fn transcode_legacy(old: &str) -> Option<String> {
    let (exponent, modulus) = old.split_once('/')?;
    let mut out = String::with_capacity(old.len() + 4);
    for (index, number) in [exponent, modulus].into_iter().enumerate() {
        if !number.is_ascii() {
            return None;
        }
        let digits = permute_legacy_digits(number.as_bytes())?;
        if index > 0 {
            out.push(',');
        }
        out.push_str("0x");
        out.push_str(&String::from_utf8_lossy(&digits));
    }
    Some(out)
}

fn compare(stored: &str, key: &str) -> HostKeyStatus {
    if stored == key {
        HostKeyStatus::Match
    } else {
        HostKeyStatus::Mismatch
    }
}

/// Host key verification and storage for one [`SettingsStore`].
pub struct HostKeyVault<'a> {
    store: &'a SettingsStore,
    confirm: &'a dyn Confirm,
}

impl<'a> HostKeyVault<'a> {
    #[must_use]
    pub fn new(store: &'a SettingsStore, confirm: &'a dyn Confirm) -> Self {
        Self { store, confirm }
    }

    fn registry(&self) -> &dyn Registry {
        self.store.registry()
    }

    fn reporter(&self) -> &dyn ErrorReporter {
        self.store.reporter()
    }

    pub fn verify(&self, hostname: &str, port: u16, keytype: &str, key: &str) -> HostKeyStatus {
        match self.store.backend() {
            Backend::Registry => self.verify_in_registry(hostname, port, keytype, key),
            Backend::File => self.verify_in_files(hostname, port, keytype, key),
        }
    }

    /// True when any key is cached for the triple, matching or not.
    #[must_use]
    pub fn has_key(&self, hostname: &str, port: u16, keytype: &str) -> bool {
        self.verify(hostname, port, keytype, "") != HostKeyStatus::Absent
    }

    /// Writes `key` to the active backend, replacing any cached key.
    pub fn store(&self, hostname: &str, port: u16, keytype: &str, key: &str) -> Result<(), StoreError> {
        let name = host_key_name(hostname, port, keytype);
        match self.store.backend() {
            Backend::Registry => {
                let host_keys = &self.store.layout().host_keys;
                self.registry().create_key(host_keys)?;
                self.registry()
                    .set_value(host_keys, &name, RegValue::Sz(key.to_string()))
            }
            Backend::File => {
                let path = self.store.paths().host_key_file(&name);
                self.write_key_file(&path, key, "Unable to create file")
            }
        }
    }

    fn verify_in_registry(
        &self,
        hostname: &str,
        port: u16,
        keytype: &str,
        key: &str,
    ) -> HostKeyStatus {
        let host_keys = &self.store.layout().host_keys;
        if !self.registry().key_exists(host_keys) {
            return HostKeyStatus::Absent;
        }

        let name = host_key_name(hostname, port, keytype);
        match self.registry().query_value(host_keys, &name) {
            Some(RegValue::Sz(stored)) => compare(&stored, key),
            Some(_) => HostKeyStatus::Absent,
            None if keytype == "rsa" => self.verify_legacy(&name, hostname, key),
            None => HostKeyStatus::Absent,
        }
    }

    /// Looks for an old-format RSA key stored under the bare host name.
    fn verify_legacy(&self, name: &str, hostname: &str, key: &str) -> HostKeyStatus {
        let host_keys = &self.store.layout().host_keys;
        let Some(RegValue::Sz(old)) = self.registry().query_value(host_keys, &encode_store(hostname))
        else {
            return HostKeyStatus::Absent;
        };

        let Some(transcoded) = transcode_legacy(&old) else {
            debug!(host = hostname, "legacy host key is malformed");
            return HostKeyStatus::Mismatch;
        };

        if transcoded == key {
            if let Err(error) =
                self.registry()
                    .set_value(host_keys, name, RegValue::Sz(transcoded.clone()))
            {
                warn!(%error, "failed to upgrade legacy host key");
            }
        }
        compare(&transcoded, key)
    }

    fn verify_in_files(&self, hostname: &str, port: u16, keytype: &str, key: &str) -> HostKeyStatus {
        let name = host_key_name(hostname, port, keytype);
        let path = self.store.paths().host_key_file(&name);

        match fs::read(&path) {
            Ok(stored) => {
                return if stored == key.as_bytes() {
                    HostKeyStatus::Match
                } else {
                    HostKeyStatus::Mismatch
                };
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                debug!(path = %path.display(), %error, "host key file unreadable; trying registry");
            }
        }

        let status = self.verify_in_registry(hostname, port, keytype, key);
        if status != HostKeyStatus::Match {
            return status;
        }

        self.offer_migration(&name, &path, key);
        HostKeyStatus::Match
    }

    /// Moves or copies a registry-only key into the file store on request.
    fn offer_migration(&self, name: &str, path: &Path, key: &str) {
        let mut answer = self.confirm.confirm(MIGRATION_PROMPT);
        if answer == Confirmation::Cancel {
            return;
        }

        if self
            .write_key_file(
                path,
                key,
                "Unable to create file (key won't be deleted from registry)",
            )
            .is_err()
        {
            answer = Confirmation::Decline;
        }

        if answer == Confirmation::Affirm {
            let host_keys = &self.store.layout().host_keys;
            match self.registry().delete_value(host_keys, name) {
                Ok(_) => debug!(name, "host key moved to file store"),
                Err(_) => self.reporter().report("Unable to delete registry value", Some(name)),
            }
        }
    }

    fn write_key_file(&self, path: &Path, key: &str, failure: &str) -> Result<(), StoreError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| {
                self.reporter()
                    .report(failure, Some(&dir.display().to_string()));
                StoreError::io("creating host key directory", dir, source)
            })?;
        }
        fs::write(path, key.as_bytes()).map_err(|source| {
            self.reporter()
                .report(failure, Some(&path.display().to_string()));
            StoreError::io("writing host key file", path, source)
        })
    }
}

impl SettingsStore {
    #[must_use]
    pub fn host_keys<'a>(&'a self, confirm: &'a dyn Confirm) -> HostKeyVault<'a> {
        HostKeyVault::new(self, confirm)
    }
}
