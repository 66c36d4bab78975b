use std::fs::{self, ReadDir};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{decode_store, encode_store};
use crate::error::StoreError;
use crate::hive::RegValue;
use crate::paths::{canonical_session_name, KeyPath, StorePaths, DEFAULT_SESSION};
use crate::recent;
use crate::record::{RecordReader, RecordWriter};
use crate::registry::Registry;
use crate::report::{ErrorReporter, LogReporter};
use crate::seed::SeedEnvironment;

/// Structured-store root used when none is configured.
pub const DEFAULT_REGISTRY_ROOT: &str = r"Software\SimonTatham\PuTTY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Registry,
    File,
}

/// A single setting as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Str(String),
    Int(i32),
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

/// Everything needed to build a [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: Backend,
    pub paths: StorePaths,
    pub registry_root: KeyPath,
}

impl StoreConfig {
    pub fn new(backend: Backend, paths: StorePaths) -> Result<Self, StoreError> {
        Ok(Self {
            backend,
            paths,
            registry_root: KeyPath::parse(DEFAULT_REGISTRY_ROOT)?,
        })
    }

    #[must_use]
    pub fn with_registry_root(mut self, registry_root: KeyPath) -> Self {
        self.registry_root = registry_root;
        self
    }
}

/// Fixed key paths below the structured-store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLayout {
    pub root: KeyPath,
    pub sessions: KeyPath,
    pub host_keys: KeyPath,
    pub jumplist: KeyPath,
}

impl RegistryLayout {
    pub fn new(root: KeyPath) -> Result<Self, StoreError> {
        Ok(Self {
            sessions: root.join("Sessions")?,
            host_keys: root.join("SshHostKeys")?,
            jumplist: root.join("Jumplist")?,
            root,
        })
    }

    pub fn session(&self, session_name: &str) -> Result<KeyPath, StoreError> {
        self.sessions
            .join(&encode_store(canonical_session_name(session_name)))
    }
}

/// An open structured-store key.
#[derive(Clone)]
pub struct RegistryKey {
    registry: Arc<dyn Registry>,
    path: KeyPath,
}

impl RegistryKey {
    #[must_use]
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    fn set(&self, key: &str, value: RegValue) {
        if let Err(error) = self.registry.set_value(&self.path, key, value) {
            warn!(key, %error, "failed to write registry setting");
        }
    }
}

impl std::fmt::Debug for RegistryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryKey").field("path", &self.path).finish()
    }
}

/// Write handle for one session.
#[derive(Debug)]
pub enum SettingsWriter {
    Registry(RegistryKey),
    File(RecordWriter),
}

impl SettingsWriter {
    pub fn set_str(&mut self, key: &str, value: &str) {
        match self {
            Self::Registry(handle) => handle.set(key, RegValue::Sz(value.to_string())),
            Self::File(writer) => writer.set_str(key, value),
        }
    }

    pub fn set_int(&mut self, key: &str, value: i32) {
        match self {
            Self::Registry(handle) => handle.set(key, RegValue::Dword(value)),
            Self::File(writer) => writer.set_int(key, value),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<SettingValue>) {
        match value.into() {
            SettingValue::Str(value) => self.set_str(key, &value),
            SettingValue::Int(value) => self.set_int(key, value),
        }
    }

    /// Flushes pending file records. Structured writes are already live.
    pub fn close(self, reporter: &dyn ErrorReporter) -> Result<(), StoreError> {
        match self {
            Self::Registry(_) => Ok(()),
            Self::File(writer) => writer.close(reporter),
        }
    }
}

/// Read handle for one session.
#[derive(Debug)]
pub enum SettingsReader {
    Registry(RegistryKey),
    File(RecordReader),
}

impl SettingsReader {
    /// A value of the wrong type reads as absent.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self {
            Self::Registry(handle) => match handle.registry.query_value(&handle.path, key) {
                Some(RegValue::Sz(value)) => Some(value),
                _ => None,
            },
            Self::File(reader) => reader.get_str(key),
        }
    }

    #[must_use]
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        match self {
            Self::Registry(handle) => handle
                .registry
                .query_value(&handle.path, key)
                .and_then(|value| value.as_dword())
                .unwrap_or(default),
            Self::File(reader) => reader.get_int(key, default),
        }
    }

    /// Every stored setting. File records carry no type, so they are all
    /// strings; structured values keep their type and skip multi-strings.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, SettingValue)> {
        match self {
            Self::Registry(handle) => handle
                .registry
                .values(&handle.path)
                .into_iter()
                .filter_map(|(name, value)| match value {
                    RegValue::Sz(value) => Some((name, SettingValue::Str(value))),
                    RegValue::Dword(value) => Some((name, SettingValue::Int(value))),
                    RegValue::MultiSz(_) => None,
                })
                .collect(),
            Self::File(reader) => reader
                .entries()
                .map(|(key, value)| (key, SettingValue::Str(value)))
                .collect(),
        }
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// Cursor over stored session names.
///
/// Yields the structured-store phase first, then the file directory phase.
/// Finishing is dropping the cursor.
#[derive(Debug)]
pub struct SessionNames {
    registry: std::vec::IntoIter<String>,
    directory: Option<DirectoryWalk>,
}

#[derive(Debug)]
struct DirectoryWalk {
    entries: ReadDir,
    suffix: String,
}

impl SessionNames {
    fn registry(names: Vec<String>) -> Self {
        Self {
            registry: names.into_iter(),
            directory: None,
        }
    }

    fn files(registry_names: Vec<String>, dir: &std::path::Path, suffix: &str) -> Self {
        let directory = match fs::read_dir(dir) {
            Ok(entries) => Some(DirectoryWalk {
                entries,
                suffix: suffix.to_string(),
            }),
            Err(error) => {
                debug!(dir = %dir.display(), %error, "session directory not readable");
                None
            }
        };
        Self {
            registry: registry_names.into_iter(),
            directory,
        }
    }
}

impl Iterator for SessionNames {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(name) = self.registry.next() {
            return Some(name);
        }

        let walk = self.directory.as_mut()?;
        for entry in walk.entries.by_ref() {
            let Ok(entry) = entry else {
                continue;
            };
            if entry.path().is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            let Some(stem) = file_name.strip_suffix(walk.suffix.as_str()) else {
                continue;
            };
            if stem.is_empty() {
                continue;
            }
            return Some(decode_store(stem));
        }

        self.directory = None;
        None
    }
}

/// Operations every backend provides.
pub trait SettingsBackend: Send + Sync {
    fn open_write(&self, session_name: &str) -> Result<SettingsWriter, StoreError>;

    /// `None` when the session does not exist or cannot be read.
    fn open_read(&self, session_name: &str) -> Option<SettingsReader>;

    fn delete(&self, session_name: &str) -> Result<(), StoreError>;

    fn enumerate(&self) -> SessionNames;
}

/// Sessions as keys under `<root>\Sessions`.
pub struct RegistrySettings {
    registry: Arc<dyn Registry>,
    layout: RegistryLayout,
}

impl RegistrySettings {
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, layout: RegistryLayout) -> Self {
        Self { registry, layout }
    }

    fn session_names(&self) -> Vec<String> {
        self.registry
            .subkeys(&self.layout.sessions)
            .iter()
            .map(|encoded| decode_store(encoded))
            .collect()
    }
}

impl SettingsBackend for RegistrySettings {
    fn open_write(&self, session_name: &str) -> Result<SettingsWriter, StoreError> {
        self.registry
            .create_key(&self.layout.sessions)
            .map_err(|_| StoreError::key_create(&self.layout.sessions))?;

        let encoded = encode_store(canonical_session_name(session_name));
        let failed = || StoreError::key_create(format!("{}\\{encoded}", self.layout.sessions));
        let path = self.layout.sessions.join(&encoded).map_err(|_| failed())?;
        self.registry.create_key(&path).map_err(|_| failed())?;

        Ok(SettingsWriter::Registry(RegistryKey {
            registry: Arc::clone(&self.registry),
            path,
        }))
    }

    fn open_read(&self, session_name: &str) -> Option<SettingsReader> {
        let path = self.layout.session(session_name).ok()?;
        if !self.registry.key_exists(&path) {
            return None;
        }
        Some(SettingsReader::Registry(RegistryKey {
            registry: Arc::clone(&self.registry),
            path,
        }))
    }

    fn delete(&self, session_name: &str) -> Result<(), StoreError> {
        if !self.registry.key_exists(&self.layout.sessions) {
            return Ok(());
        }
        let path = self.layout.session(session_name)?;
        self.registry.delete_key(&path)?;

        let exists = |name: &str| self.open_read(name).is_some();
        if let Err(error) = recent::transform(
            self.registry.as_ref(),
            &self.layout.jumplist,
            None,
            Some(session_name),
            &exists,
        ) {
            warn!(session = session_name, %error, "failed to drop deleted session from recent list");
        }
        Ok(())
    }

    fn enumerate(&self) -> SessionNames {
        SessionNames::registry(self.session_names())
    }
}

/// Sessions as one record file each under [`StorePaths::sessions_dir`].
///
/// `Default Settings` falls back to the structured store when no file exists.
pub struct FileSettings {
    paths: StorePaths,
    fallback: RegistrySettings,
    reporter: Arc<dyn ErrorReporter>,
}

impl FileSettings {
    #[must_use]
    pub fn new(
        paths: StorePaths,
        fallback: RegistrySettings,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            paths,
            fallback,
            reporter,
        }
    }

    #[must_use]
    pub fn session_path(&self, session_name: &str) -> PathBuf {
        self.paths.session_file(session_name)
    }
}

impl SettingsBackend for FileSettings {
    fn open_write(&self, session_name: &str) -> Result<SettingsWriter, StoreError> {
        Ok(SettingsWriter::File(RecordWriter::new(
            self.session_path(session_name),
        )))
    }

    fn open_read(&self, session_name: &str) -> Option<SettingsReader> {
        let session_name = canonical_session_name(session_name);
        let path = self.session_path(session_name);

        if session_name == DEFAULT_SESSION && !path.is_file() {
            debug!("default settings not in file store; reading structured store");
            return self.fallback.open_read(session_name);
        }

        match RecordReader::load(&path) {
            Ok(reader) => Some(SettingsReader::File(reader)),
            Err(error) if error.is_not_found() => {
                debug!(path = %path.display(), "session file not found");
                None
            }
            Err(error) => {
                self.reporter.report(
                    "Unable to read session from file",
                    Some(&path.display().to_string()),
                );
                warn!(%error, "session read failed");
                None
            }
        }
    }

    fn delete(&self, session_name: &str) -> Result<(), StoreError> {
        let path = self.session_path(session_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no session file to delete");
                Ok(())
            }
            Err(source) => {
                self.reporter
                    .report("Unable to delete settings.", Some(&path.display().to_string()));
                Err(StoreError::io("deleting session file", path, source))
            }
        }
    }

    fn enumerate(&self) -> SessionNames {
        // Only file sessions can be opened in this mode, so the structured
        // phase contributes nothing.
        SessionNames::files(
            Vec::new(),
            &self.paths.sessions_dir,
            &self.paths.session_suffix,
        )
    }
}

/// Backend-independent access to stored configuration.
pub struct SettingsStore {
    config: StoreConfig,
    layout: RegistryLayout,
    registry: Arc<dyn Registry>,
    reporter: Arc<dyn ErrorReporter>,
    backend: Box<dyn SettingsBackend>,
}

impl SettingsStore {
    pub fn new(config: StoreConfig, registry: Arc<dyn Registry>) -> Result<Self, StoreError> {
        Self::with_reporter(config, registry, Arc::new(LogReporter))
    }

    pub fn with_reporter(
        config: StoreConfig,
        registry: Arc<dyn Registry>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self, StoreError> {
        let layout = RegistryLayout::new(config.registry_root.clone())?;
        let registry_settings = RegistrySettings::new(Arc::clone(&registry), layout.clone());
        let backend: Box<dyn SettingsBackend> = match config.backend {
            Backend::Registry => Box::new(registry_settings),
            Backend::File => Box::new(FileSettings::new(
                config.paths.clone(),
                registry_settings,
                Arc::clone(&reporter),
            )),
        };

        Ok(Self {
            config,
            layout,
            registry,
            reporter,
            backend,
        })
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    #[must_use]
    pub fn paths(&self) -> &StorePaths {
        &self.config.paths
    }

    #[must_use]
    pub fn layout(&self) -> &RegistryLayout {
        &self.layout
    }

    #[must_use]
    pub fn registry(&self) -> &dyn Registry {
        self.registry.as_ref()
    }

    #[must_use]
    pub fn reporter(&self) -> &dyn ErrorReporter {
        self.reporter.as_ref()
    }

    /// Opens a session for writing. An empty name means `Default Settings`.
    pub fn open_write(&self, session_name: &str) -> Result<SettingsWriter, StoreError> {
        self.backend.open_write(session_name).inspect_err(|error| {
            self.reporter.report(&error.to_string(), None);
        })
    }

    pub fn close_write(&self, writer: SettingsWriter) -> Result<(), StoreError> {
        writer.close(self.reporter.as_ref())
    }

    #[must_use]
    pub fn open_read(&self, session_name: &str) -> Option<SettingsReader> {
        self.backend.open_read(session_name)
    }

    pub fn close_read(&self, reader: SettingsReader) {
        drop(reader);
    }

    pub fn delete(&self, session_name: &str) -> Result<(), StoreError> {
        self.backend.delete(session_name)
    }

    #[must_use]
    pub fn enumerate(&self) -> SessionNames {
        self.backend.enumerate()
    }

    /// Wipes the seed file everywhere and the whole structured-store root.
    pub fn cleanup_all(&self) -> Result<(), StoreError> {
        self.seed().delete_everywhere();
        self.remove_registry_root()
    }

    pub fn cleanup_all_with_env(&self, env: &dyn SeedEnvironment) -> Result<(), StoreError> {
        self.seed_with_env(env).delete_everywhere();
        self.remove_registry_root()
    }

    /// Removes the root key, then its parent when nothing else is left there.
    fn remove_registry_root(&self) -> Result<(), StoreError> {
        let root = &self.layout.root;
        self.registry.delete_key(root)?;
        if let Some((parent, _)) = root.split_last() {
            if !parent.is_root() && self.registry.subkeys(&parent).is_empty() {
                self.registry.delete_key(&parent)?;
            }
        }
        Ok(())
    }
}
