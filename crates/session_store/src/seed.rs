//! Locating the random seed file.
//!
//! Candidates are tried in priority order, separately for reading and
//! writing, so a seed read from an old location is written back to the best
//! location that accepts a create. Deleting visits every candidate.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::hive::RegValue;
use crate::settings::{Backend, SettingsStore};

pub const SEED_FILE_NAME: &str = "PUTTY.RND";

/// Root value naming a user-chosen seed file.
pub const RAND_SEED_VALUE: &str = "RandSeedFile";

/// Environment values longer than this are treated as unavailable.
pub const MAX_ENV_PATH: usize = 260;

const READ_CHUNK: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedIntent {
    Read,
    Write,
    Delete,
}

/// Platform lookups used to build the candidate list.
pub trait SeedEnvironment {
    fn local_data_dir(&self) -> Option<PathBuf>;
    fn roaming_data_dir(&self) -> Option<PathBuf>;
    fn var(&self, name: &str) -> Option<String>;
    fn system_dir(&self) -> Option<PathBuf>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnvironment;

impl SeedEnvironment for SystemEnvironment {
    fn local_data_dir(&self) -> Option<PathBuf> {
        dirs::data_local_dir()
    }

    fn roaming_data_dir(&self) -> Option<PathBuf> {
        dirs::data_dir()
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn system_dir(&self) -> Option<PathBuf> {
        self.var("SystemRoot")
            .or_else(|| self.var("windir"))
            .map(PathBuf::from)
    }
}

static SYSTEM_ENVIRONMENT: SystemEnvironment = SystemEnvironment;

/// An opened seed file and where it was found.
#[derive(Debug)]
pub struct SeedHandle {
    pub path: PathBuf,
    pub file: File,
}

pub struct SeedLocator<'a> {
    store: &'a SettingsStore,
    env: &'a dyn SeedEnvironment,
}

impl<'a> SeedLocator<'a> {
    #[must_use]
    pub fn new(store: &'a SettingsStore, env: &'a dyn SeedEnvironment) -> Self {
        Self { store, env }
    }

    /// Candidate paths, best first.
    #[must_use]
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(6);

        let root = &self.store.layout().root;
        if let Some(RegValue::Sz(path)) = self.store.registry().query_value(root, RAND_SEED_VALUE) {
            if !path.is_empty() {
                candidates.push(PathBuf::from(path));
            }
        }

        if let Some(dir) = self.env.local_data_dir() {
            candidates.push(dir.join(SEED_FILE_NAME));
        }
        if let Some(dir) = self.env.roaming_data_dir() {
            candidates.push(dir.join(SEED_FILE_NAME));
        }
        if let Some(home) = self.home_drive_path() {
            candidates.push(home.join(SEED_FILE_NAME));
        }
        if let Some(dir) = self
            .env
            .system_dir()
            .filter(|dir| dir.as_os_str().len() < MAX_ENV_PATH)
        {
            candidates.push(dir.join(SEED_FILE_NAME));
        }

        // The conf-file location only ever backs up the standard ones.
        if self.store.backend() == Backend::File {
            let seed_file = &self.store.paths().seed_file;
            if !candidates.contains(seed_file) {
                candidates.push(seed_file.clone());
            }
        }

        candidates
    }

    /// `%HOMEDRIVE%%HOMEPATH%`; the drive may be empty, the path may not.
    fn home_drive_path(&self) -> Option<PathBuf> {
        let drive = self.env.var("HOMEDRIVE").unwrap_or_default();
        let path = self.env.var("HOMEPATH")?;
        if path.is_empty() || path.len() >= MAX_ENV_PATH || drive.len() >= MAX_ENV_PATH {
            return None;
        }
        Some(PathBuf::from(format!("{drive}{path}")))
    }

    /// First candidate that opens for `intent`.
    ///
    /// [`SeedIntent::Delete`] removes the file from every candidate and
    /// always returns `None`.
    #[must_use]
    pub fn resolve(&self, intent: SeedIntent) -> Option<SeedHandle> {
        for path in self.candidates() {
            let opened = match intent {
                SeedIntent::Read => File::open(&path),
                SeedIntent::Write => File::create(&path),
                SeedIntent::Delete => {
                    self.delete_candidate(&path);
                    continue;
                }
            };
            match opened {
                Ok(file) => {
                    debug!(path = %path.display(), ?intent, "seed file located");
                    return Some(SeedHandle { path, file });
                }
                Err(error) => {
                    debug!(path = %path.display(), ?intent, %error, "seed candidate unavailable");
                }
            }
        }
        None
    }

    fn delete_candidate(&self, path: &std::path::Path) {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "seed file deleted"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(path = %path.display(), %error, "unable to delete seed file");
                self.store.reporter().report(
                    &format!("Unable to delete '{}': {error}", path.display()),
                    None,
                );
            }
        }
    }

    pub fn delete_everywhere(&self) {
        let _ = self.resolve(SeedIntent::Delete);
    }

    /// Feeds the seed to `consumer` in chunks. Returns whether a seed was found.
    pub fn read_random_seed(&self, mut consumer: impl FnMut(&[u8])) -> bool {
        let Some(mut handle) = self.resolve(SeedIntent::Read) else {
            return false;
        };
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match handle.file.read(&mut buf) {
                Ok(0) => break,
                Ok(len) => consumer(&buf[..len]),
                Err(error) => {
                    warn!(path = %handle.path.display(), %error, "seed read interrupted");
                    break;
                }
            }
        }
        true
    }

    /// Writes `data` to the best writable candidate.
    ///
    /// `Ok(None)` when no candidate accepted a create.
    pub fn write_random_seed(&self, data: &[u8]) -> Result<Option<PathBuf>, StoreError> {
        let Some(mut handle) = self.resolve(SeedIntent::Write) else {
            return Ok(None);
        };
        handle
            .file
            .write_all(data)
            .map_err(|source| StoreError::io("writing seed file", &handle.path, source))?;
        Ok(Some(handle.path))
    }
}

impl SettingsStore {
    #[must_use]
    pub fn seed(&self) -> SeedLocator<'_> {
        SeedLocator::new(self, &SYSTEM_ENVIRONMENT)
    }

    #[must_use]
    pub fn seed_with_env<'a>(&'a self, env: &'a dyn SeedEnvironment) -> SeedLocator<'a> {
        SeedLocator::new(self, env)
    }
}
