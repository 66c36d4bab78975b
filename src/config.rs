//! Configuration: the path conf file in the program directory plus
//! environment overrides.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use session_store::{
    clamp_suffix, Backend, ErrorReporter, JsonRegistry, LogReporter, SettingsStore, StoreConfig,
    StoreError, StorePaths,
};
use tracing::debug;

pub const CONF_FILE_NAME: &str = "termstore.conf";

/// Hive file used for the structured backend when `TERMSTORE_HIVE` is unset.
pub const HIVE_FILE_NAME: &str = "registry.json";

pub const DEFAULT_LOG_FILTER: &str = "termstore=info,session_store=info";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub backend: Option<Backend>,
    pub hive: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            backend: env_string_opt("TERMSTORE_BACKEND").and_then(|value| parse_backend(&value)),
            hive: env_string_opt("TERMSTORE_HIVE").map(PathBuf::from),
            home: env_string_opt("TERMSTORE_HOME").map(PathBuf::from),
            log_filter: env_string_opt("TERMSTORE_LOG"),
        }
    }

    /// `TERMSTORE_HOME`, else `<config dir>/termstore`, else the working directory.
    #[must_use]
    pub fn program_dir(&self) -> PathBuf {
        if let Some(home) = &self.home {
            return home.clone();
        }
        dirs::config_dir()
            .map(|dir| dir.join("termstore"))
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    #[must_use]
    pub fn hive_path(&self, program_dir: &Path) -> PathBuf {
        self.hive
            .clone()
            .unwrap_or_else(|| program_dir.join(HIVE_FILE_NAME))
    }

    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Accepts `file` or `registry`, ignoring case and surrounding whitespace.
#[must_use]
pub fn parse_backend(value: &str) -> Option<Backend> {
    match value.trim().to_ascii_lowercase().as_str() {
        "file" => Some(Backend::File),
        "registry" => Some(Backend::Registry),
        _ => None,
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

/// File-backend locations resolved from `termstore.conf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfig {
    pub program_dir: PathBuf,
    pub paths: StorePaths,
}

impl PathConfig {
    #[must_use]
    pub fn defaults(program_dir: &Path) -> Self {
        Self {
            program_dir: program_dir.to_path_buf(),
            paths: StorePaths::under(program_dir),
        }
    }

    /// Reads the conf file beside the program, reporting read failures
    /// through `tracing`.
    #[must_use]
    pub fn load(program_dir: &Path) -> Self {
        Self::load_with(program_dir, &LogReporter)
    }

    /// A missing conf file is silent. Any other read failure is reported and
    /// the defaults apply.
    #[must_use]
    pub fn load_with(program_dir: &Path, reporter: &dyn ErrorReporter) -> Self {
        let conf = program_dir.join(CONF_FILE_NAME);
        match fs::read(&conf) {
            Ok(bytes) => Self::parse(program_dir, &String::from_utf8_lossy(&bytes), |name| {
                env::var(name).ok()
            }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %conf.display(), "no conf file; using default paths");
                Self::defaults(program_dir)
            }
            Err(error) => {
                reporter.report(
                    "Unable to read configuration file, falling back to defaults",
                    Some(&error.to_string()),
                );
                Self::defaults(program_dir)
            }
        }
    }

    /// Applies `key=value` lines on top of the defaults. `lookup` resolves
    /// `%VAR%` references in path values.
    pub fn parse(program_dir: &Path, text: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::defaults(program_dir);

        for line in text.lines() {
            if line.starts_with(';') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim_end();

            match key.trim() {
                "sessions" => {
                    if let Some(path) = resolve_path(program_dir, value, &lookup) {
                        config.paths.sessions_dir = path;
                    }
                }
                "sshhostkeys" => {
                    if let Some(path) = resolve_path(program_dir, value, &lookup) {
                        config.paths.host_keys_dir = path;
                    }
                }
                "seedfile" => {
                    if let Some(path) = resolve_path(program_dir, value, &lookup) {
                        config.paths.seed_file = path;
                    }
                }
                "sessionsuffix" => config.paths.session_suffix = clamp_suffix(value),
                "keysuffix" => config.paths.key_suffix = clamp_suffix(value),
                other => debug!(key = other, "ignoring unknown conf key"),
            }
        }

        config
    }
}

fn resolve_path(
    program_dir: &Path,
    value: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    if value.is_empty() {
        return None;
    }
    Some(join_path(program_dir, &expand_env_vars(value, lookup)))
}

/// Replaces `%NAME%` with the variable's value. Unknown names and unpaired
/// `%` are left as written.
pub fn expand_env_vars(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(expanded) => {
                out.push_str(&expanded);
                rest = &after[end + 1..];
            }
            None => {
                out.push('%');
                out.push_str(name);
                rest = &after[end..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Joins a configured path onto the program directory.
///
/// A leading `/` or `\` is relative to the program directory, a drive
/// prefix such as `D:` is taken as-is, anything else is a relative path.
#[must_use]
pub fn join_path(program_dir: &Path, value: &str) -> PathBuf {
    if value.starts_with(['/', '\\']) {
        return program_dir.join(value.trim_start_matches(['/', '\\']));
    }
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return PathBuf::from(value);
    }
    program_dir.join(value)
}

/// Everything the binary needs to open a [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: EnvConfig,
    pub paths: PathConfig,
}

impl AppConfig {
    pub fn load(env: EnvConfig, reporter: &dyn ErrorReporter) -> Self {
        let program_dir = env.program_dir();
        let paths = PathConfig::load_with(&program_dir, reporter);
        Self { env, paths }
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.env.backend.unwrap_or(Backend::File)
    }

    #[must_use]
    pub fn hive_path(&self) -> PathBuf {
        self.env.hive_path(&self.paths.program_dir)
    }

    pub fn store_config(&self) -> Result<StoreConfig, StoreError> {
        StoreConfig::new(self.backend(), self.paths.paths.clone())
    }

    /// Opens the JSON hive and builds the store on top of it.
    pub fn open_store(&self, reporter: Arc<dyn ErrorReporter>) -> Result<SettingsStore, StoreError> {
        let registry = JsonRegistry::open(self.hive_path())?;
        debug!(hive = %registry.path().display(), backend = ?self.backend(), "opening store");
        SettingsStore::with_reporter(self.store_config()?, Arc::new(registry), reporter)
    }
}
