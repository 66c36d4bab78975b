//! Persistent configuration store for saved sessions, host keys, the recent
//! session list and the random seed file.
//!
//! Two interchangeable backends sit behind [`SettingsStore`]: a hierarchical
//! structured store ([`Registry`]) and a flat-file store with one record file
//! per session. The backend is fixed when the store is built.

mod codec;
mod composite;
mod error;
mod hive;
mod host_keys;
mod paths;
mod recent;
mod record;
mod registry;
mod report;
mod seed;
mod settings;

pub use codec::{
    decode_fs, decode_store, decode_store_bytes, decode_store_capped, encode_fs, encode_store,
    MAX_DECODED_LEN,
};
pub use composite::FontSpec;
pub use error::{RecentListError, StoreError};
pub use hive::{HiveNode, RegValue};
pub use host_keys::{
    host_key_name, permute_legacy_digits, transcode_legacy, HostKeyStatus, HostKeyVault,
    MIGRATION_PROMPT,
};
pub use paths::{
    canonical_session_name, clamp_suffix, host_key_file_name, session_file_name, KeyPath,
    StorePaths, DEFAULT_SESSION, MAX_KEY_PATH_LEN, MAX_KEY_SEGMENT_LEN, MAX_SUFFIX_LEN,
};
pub use recent::{decode_list, encode_list, RecentList, RECENT_SESSIONS_VALUE};
pub use record::{parse_records, serialize_records, RecordReader, RecordWriter};
pub use registry::{JsonRegistry, MemoryRegistry, Registry};
pub use report::{
    CollectingReporter, Confirm, Confirmation, ErrorReporter, FixedAnswer, LogReporter,
};
pub use seed::{
    SeedEnvironment, SeedHandle, SeedIntent, SeedLocator, SystemEnvironment, RAND_SEED_VALUE,
    SEED_FILE_NAME,
};
pub use settings::{
    Backend, FileSettings, RegistryKey, RegistryLayout, RegistrySettings, SessionNames,
    SettingValue, SettingsBackend, SettingsReader, SettingsStore, SettingsWriter, StoreConfig,
    DEFAULT_REGISTRY_ROOT,
};
