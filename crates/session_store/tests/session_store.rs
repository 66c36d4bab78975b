use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use session_store::{
    Backend, CollectingReporter, Confirmation, FixedAnswer, FontSpec, HostKeyStatus, JsonRegistry,
    KeyPath, MemoryRegistry, RegValue, Registry, SeedEnvironment, SeedIntent, SettingValue,
    SettingsStore, StoreConfig, StorePaths, RAND_SEED_VALUE, SEED_FILE_NAME,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    registry: Arc<MemoryRegistry>,
    reporter: Arc<CollectingReporter>,
    store: SettingsStore,
}

fn fixture(backend: Backend) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let root = dir.path().to_path_buf();
    let registry = Arc::new(MemoryRegistry::new());
    let reporter = Arc::new(CollectingReporter::new());
    let store = open_store(backend, &root, registry.clone(), reporter.clone());
    Fixture {
        _dir: dir,
        root,
        registry,
        reporter,
        store,
    }
}

fn open_store(
    backend: Backend,
    root: &Path,
    registry: Arc<dyn Registry>,
    reporter: Arc<CollectingReporter>,
) -> SettingsStore {
    let config = StoreConfig::new(backend, StorePaths::under(root)).expect("config should build");
    SettingsStore::with_reporter(config, registry, reporter).expect("store should open")
}

fn save_session(store: &SettingsStore, name: &str, entries: &[(&str, &str)]) {
    let mut writer = store.open_write(name).expect("session should open for writing");
    for (key, value) in entries {
        writer.set_str(key, value);
    }
    store.close_write(writer).expect("session should be saved");
}

fn sorted_sessions(store: &SettingsStore) -> Vec<String> {
    let mut names: Vec<String> = store.enumerate().collect();
    names.sort();
    names
}

fn host_keys_path() -> KeyPath {
    KeyPath::parse(r"Software\SimonTatham\PuTTY\SshHostKeys").expect("key path should parse")
}

#[test]
fn file_backend_round_trips_strings_and_ints() {
    let fx = fixture(Backend::File);

    let mut writer = fx.store.open_write("T1").expect("T1 should open");
    writer.set_str("k", "v");
    writer.set_int("n", 42);
    fx.store.close_write(writer).expect("T1 should be saved");

    let reader = fx.store.open_read("T1").expect("T1 should be readable");
    assert!(reader.is_file());
    assert_eq!(reader.get_str("k").as_deref(), Some("v"));
    assert_eq!(reader.get_int("n", -1), 42);
    assert_eq!(reader.get_str("missing"), None);
    assert_eq!(reader.get_int("missing", 7), 7);
    fx.store.close_read(reader);

    let on_disk = fs::read_to_string(fx.root.join("sessions").join("T1"))
        .expect("session file should exist");
    assert_eq!(on_disk, "k\\v\\\nn\\42\\\n");
}

#[test]
fn values_with_special_characters_survive_the_file_backend() {
    let fx = fixture(Backend::File);
    save_session(
        &fx.store,
        "web/prod: main",
        &[("Host Name", "user@example.com"), ("Path", r"C:\keys\id.ppk")],
    );

    let reader = fx
        .store
        .open_read("web/prod: main")
        .expect("session should be readable");
    assert_eq!(reader.get_str("Host Name").as_deref(), Some("user@example.com"));
    assert_eq!(reader.get_str("Path").as_deref(), Some(r"C:\keys\id.ppk"));
    assert_eq!(sorted_sessions(&fx.store), vec!["web/prod: main".to_string()]);
}

#[test]
fn rewriting_a_session_replaces_every_key() {
    let fx = fixture(Backend::File);
    save_session(&fx.store, "S", &[("a", "1"), ("b", "2")]);
    save_session(&fx.store, "S", &[("a", "3")]);

    let reader = fx.store.open_read("S").expect("S should be readable");
    assert_eq!(reader.get_str("a").as_deref(), Some("3"));
    assert_eq!(reader.get_str("b"), None);
}

#[test]
fn enumeration_lists_sessions_and_skips_strays() {
    let fx = fixture(Backend::File);
    for name in ["A", "B", "C"] {
        save_session(&fx.store, name, &[("k", name)]);
    }
    let sessions = fx.root.join("sessions");
    fs::write(sessions.join(".hidden"), "x\\y\\\n").expect("stray file should be written");
    fs::create_dir(sessions.join("nested")).expect("stray directory should be created");

    assert_eq!(sorted_sessions(&fx.store), vec!["A", "B", "C"]);
}

#[test]
fn enumeration_of_missing_directory_is_empty() {
    let fx = fixture(Backend::File);
    assert_eq!(fx.store.enumerate().count(), 0);
}

#[test]
fn session_suffix_is_appended_and_stripped() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let paths = StorePaths::under(dir.path()).with_suffixes(".session", ".hostkey");
    let config = StoreConfig::new(Backend::File, paths).expect("config should build");
    let store = SettingsStore::with_reporter(
        config,
        Arc::new(MemoryRegistry::new()),
        Arc::new(CollectingReporter::new()),
    )
    .expect("store should open");

    save_session(&store, "alpha", &[("k", "v")]);
    assert!(dir.path().join("sessions").join("alpha.session").is_file());

    fs::write(dir.path().join("sessions").join("notes.txt"), "ignored")
        .expect("unrelated file should be written");
    assert_eq!(sorted_sessions(&store), vec!["alpha"]);
}

#[test]
fn deleting_file_sessions_is_idempotent() {
    let fx = fixture(Backend::File);
    save_session(&fx.store, "gone", &[("k", "v")]);

    fx.store.delete("gone").expect("delete should succeed");
    assert!(fx.store.open_read("gone").is_none());
    fx.store.delete("gone").expect("second delete should succeed");
    fx.store.delete("never-existed").expect("missing delete should succeed");
    assert!(fx.reporter.reports().is_empty());
}

#[test]
fn default_settings_fall_back_to_the_structured_store_in_file_mode() {
    let fx = fixture(Backend::File);
    let registry_store = open_store(
        Backend::Registry,
        &fx.root,
        fx.registry.clone(),
        fx.reporter.clone(),
    );
    save_session(&registry_store, "", &[("k", "from-registry")]);

    let reader = fx.store.open_read("").expect("defaults should be readable");
    assert!(!reader.is_file());
    assert_eq!(reader.get_str("k").as_deref(), Some("from-registry"));

    save_session(&fx.store, "Default Settings", &[("k", "from-file")]);
    let reader = fx.store.open_read("").expect("defaults should be readable");
    assert!(reader.is_file());
    assert_eq!(reader.get_str("k").as_deref(), Some("from-file"));
}

#[test]
fn other_sessions_never_fall_back_in_file_mode() {
    let fx = fixture(Backend::File);
    let registry_store = open_store(
        Backend::Registry,
        &fx.root,
        fx.registry.clone(),
        fx.reporter.clone(),
    );
    save_session(&registry_store, "only-in-registry", &[("k", "v")]);

    assert!(fx.store.open_read("only-in-registry").is_none());
    assert_eq!(fx.store.enumerate().count(), 0);
}

#[test]
fn truncated_session_file_keeps_complete_records() {
    let fx = fixture(Backend::File);
    let sessions = fx.root.join("sessions");
    fs::create_dir_all(&sessions).expect("sessions dir should be created");
    fs::write(sessions.join("cut"), "a\\1\\\nb\\2\\\nc\\3").expect("file should be written");

    let reader = fx.store.open_read("cut").expect("truncated file should still open");
    assert_eq!(reader.get_str("a").as_deref(), Some("1"));
    assert_eq!(reader.get_int("b", 0), 2);
    assert_eq!(reader.get_str("c"), None);
}

#[test]
fn unwritable_session_directory_is_reported() {
    let fx = fixture(Backend::File);
    fs::write(fx.root.join("sessions"), "not a directory").expect("blocker should be written");

    let writer = fx.store.open_write("blocked").expect("write handle should open");
    let error = fx
        .store
        .close_write(writer)
        .expect_err("saving into a file path should fail");
    assert!(error.to_string().contains("sessions"));
    assert_eq!(
        fx.reporter.reports(),
        vec![format!(
            "Unable to create directory for storing sessions: {}",
            fx.root.join("sessions").display()
        )]
    );
}

#[test]
fn registry_backend_round_trips_and_types_values() {
    let fx = fixture(Backend::Registry);
    let mut writer = fx.store.open_write("T1").expect("T1 should open");
    writer.set("k", "v");
    writer.set("n", 42);
    fx.store.close_write(writer).expect("close should succeed");

    let reader = fx.store.open_read("T1").expect("T1 should be readable");
    assert!(!reader.is_file());
    assert_eq!(reader.get_str("k").as_deref(), Some("v"));
    assert_eq!(reader.get_int("n", -1), 42);
    assert_eq!(reader.get_str("n"), None);
    assert_eq!(reader.get_int("k", -1), -1);

    assert!(fx.store.open_read("nope").is_none());
    assert_eq!(sorted_sessions(&fx.store), vec!["T1"]);
}

#[test]
fn registry_session_names_are_encoded_once() {
    let fx = fixture(Backend::Registry);
    save_session(&fx.store, "my host", &[("k", "v")]);

    let sessions = KeyPath::parse(r"Software\SimonTatham\PuTTY\Sessions").expect("path should parse");
    assert_eq!(fx.registry.subkeys(&sessions), vec!["my%20host".to_string()]);
    assert_eq!(sorted_sessions(&fx.store), vec!["my host"]);
}

#[test]
fn registry_delete_drops_session_from_recent_list() {
    let fx = fixture(Backend::Registry);
    for name in ["X", "Y"] {
        save_session(&fx.store, name, &[("k", name)]);
    }
    let recent = fx.store.recent();
    recent.add_entry("X").expect("X should be added");
    recent.add_entry("Y").expect("Y should be added");
    assert_eq!(recent.get_entries(), vec!["Y", "X"]);

    fx.store.delete("Y").expect("delete should succeed");
    assert!(fx.store.open_read("Y").is_none());
    assert_eq!(recent.get_entries(), vec!["X"]);
}

#[test]
fn recent_list_orders_and_prunes_entries() {
    let fx = fixture(Backend::File);
    for name in ["X", "Y", "Z", "W"] {
        save_session(&fx.store, name, &[("k", name)]);
    }
    let recent = fx.store.recent();
    for name in ["Z", "Y", "X"] {
        recent.add_entry(name).expect("entry should be added");
    }
    assert_eq!(recent.get_entries(), vec!["X", "Y", "Z"]);

    recent.add_entry("Y").expect("Y should move to front");
    assert_eq!(recent.get_entries(), vec!["Y", "X", "Z"]);

    recent.remove_entry("X").expect("X should be removed");
    assert_eq!(recent.get_entries(), vec!["Y", "Z"]);

    fx.store.delete("Z").expect("Z should be deleted");
    assert_eq!(recent.get_entries(), vec!["Y", "Z"]);

    recent.add_entry("W").expect("W should be added");
    assert_eq!(recent.get_entries(), vec!["W", "Y"]);
}

#[test]
fn missing_sessions_are_pruned_on_the_next_update() {
    let fx = fixture(Backend::Registry);
    let recent = fx.store.recent();
    recent.add_entry("ghost").expect("add should still succeed");
    assert_eq!(recent.get_entries(), vec!["ghost"]);

    save_session(&fx.store, "real", &[("k", "v")]);
    recent.add_entry("real").expect("real should be added");
    assert_eq!(recent.get_entries(), vec!["real"]);
}

#[test]
fn registry_host_keys_match_mismatch_and_absent() {
    let fx = fixture(Backend::Registry);
    let confirm = FixedAnswer(Confirmation::Cancel);
    let vault = fx.store.host_keys(&confirm);

    assert_eq!(vault.verify("example.com", 22, "rsa2", "0x1"), HostKeyStatus::Absent);
    assert!(!vault.has_key("example.com", 22, "rsa2"));

    vault
        .store("example.com", 22, "rsa2", "0x1")
        .expect("key should be stored");
    assert_eq!(vault.verify("example.com", 22, "rsa2", "0x1"), HostKeyStatus::Match);
    assert_eq!(vault.verify("example.com", 22, "rsa2", "0x2"), HostKeyStatus::Mismatch);
    assert_eq!(vault.verify("example.com", 2222, "rsa2", "0x1"), HostKeyStatus::Absent);
    assert!(vault.has_key("example.com", 22, "rsa2"));
}

#[test]
fn legacy_rsa_key_is_transcoded_and_upgraded_on_match() {
    let fx = fixture(Backend::Registry);
    let host_keys = host_keys_path();
    fx.registry.create_key(&host_keys).expect("host key path should be created");
    fx.registry
        .set_value(&host_keys, "old.example", RegValue::Sz("0001/0002".to_string()))
        .expect("legacy value should be stored");

    let confirm = FixedAnswer(Confirmation::Cancel);
    let vault = fx.store.host_keys(&confirm);

    assert_eq!(vault.verify("old.example", 22, "rsa", "0x1,0x3"), HostKeyStatus::Mismatch);
    assert_eq!(fx.registry.query_value(&host_keys, "rsa@22:old.example"), None);

    assert_eq!(vault.verify("old.example", 22, "rsa", "0x1,0x2"), HostKeyStatus::Match);
    assert_eq!(
        fx.registry.query_value(&host_keys, "rsa@22:old.example"),
        Some(RegValue::Sz("0x1,0x2".to_string()))
    );
}

#[test]
fn legacy_lookup_only_applies_to_rsa() {
    let fx = fixture(Backend::Registry);
    let host_keys = host_keys_path();
    fx.registry.create_key(&host_keys).expect("host key path should be created");
    fx.registry
        .set_value(&host_keys, "old.example", RegValue::Sz("0001/0002".to_string()))
        .expect("legacy value should be stored");

    let confirm = FixedAnswer(Confirmation::Cancel);
    let vault = fx.store.host_keys(&confirm);
    assert_eq!(vault.verify("old.example", 22, "rsa2", "0x1,0x2"), HostKeyStatus::Absent);
}

#[test]
fn file_host_keys_are_checked_first() {
    let fx = fixture(Backend::File);
    let confirm = FixedAnswer(Confirmation::Affirm);
    let vault = fx.store.host_keys(&confirm);

    vault
        .store("example.com", 22, "ed25519", "AAAA")
        .expect("key file should be written");
    let file = fx.root.join("sshhostkeys").join("ed25519@22%3Aexample.com");
    assert_eq!(fs::read_to_string(&file).expect("key file should exist"), "AAAA");

    assert_eq!(vault.verify("example.com", 22, "ed25519", "AAAA"), HostKeyStatus::Match);
    assert_eq!(vault.verify("example.com", 22, "ed25519", "BBBB"), HostKeyStatus::Mismatch);
    assert_eq!(vault.verify("other.com", 22, "ed25519", "AAAA"), HostKeyStatus::Absent);
}

fn seed_registry_key(fx: &Fixture, key: &str) {
    let host_keys = host_keys_path();
    fx.registry.create_key(&host_keys).expect("host key path should be created");
    fx.registry
        .set_value(&host_keys, "rsa2@22:example.com", RegValue::Sz(key.to_string()))
        .expect("registry key should be stored");
}

fn key_file(fx: &Fixture) -> PathBuf {
    fx.root.join("sshhostkeys").join("rsa2@22%3Aexample.com")
}

#[test]
fn migration_affirm_moves_key_to_file() {
    let fx = fixture(Backend::File);
    seed_registry_key(&fx, "0xabc");

    let confirm = FixedAnswer(Confirmation::Affirm);
    let status = fx.store.host_keys(&confirm).verify("example.com", 22, "rsa2", "0xabc");

    assert_eq!(status, HostKeyStatus::Match);
    assert_eq!(fs::read_to_string(key_file(&fx)).expect("key file should exist"), "0xabc");
    assert_eq!(
        fx.registry.query_value(&host_keys_path(), "rsa2@22:example.com"),
        None
    );
}

#[test]
fn migration_decline_copies_key_to_file() {
    let fx = fixture(Backend::File);
    seed_registry_key(&fx, "0xabc");

    let confirm = FixedAnswer(Confirmation::Decline);
    let status = fx.store.host_keys(&confirm).verify("example.com", 22, "rsa2", "0xabc");

    assert_eq!(status, HostKeyStatus::Match);
    assert!(key_file(&fx).is_file());
    assert!(fx
        .registry
        .query_value(&host_keys_path(), "rsa2@22:example.com")
        .is_some());
}

#[test]
fn migration_cancel_leaves_everything_in_place() {
    let fx = fixture(Backend::File);
    seed_registry_key(&fx, "0xabc");

    let confirm = FixedAnswer(Confirmation::Cancel);
    let status = fx.store.host_keys(&confirm).verify("example.com", 22, "rsa2", "0xabc");

    assert_eq!(status, HostKeyStatus::Match);
    assert!(!key_file(&fx).exists());
    assert!(fx
        .registry
        .query_value(&host_keys_path(), "rsa2@22:example.com")
        .is_some());
}

#[test]
fn migration_is_not_offered_for_registry_mismatch() {
    let fx = fixture(Backend::File);
    seed_registry_key(&fx, "0xabc");

    let confirm = FixedAnswer(Confirmation::Affirm);
    let status = fx.store.host_keys(&confirm).verify("example.com", 22, "rsa2", "0xdef");

    assert_eq!(status, HostKeyStatus::Mismatch);
    assert!(!key_file(&fx).exists());
}

#[test]
fn failed_migration_write_keeps_registry_copy() {
    let fx = fixture(Backend::File);
    seed_registry_key(&fx, "0xabc");
    fs::write(fx.root.join("sshhostkeys"), "blocker").expect("blocker should be written");

    let confirm = FixedAnswer(Confirmation::Affirm);
    let status = fx.store.host_keys(&confirm).verify("example.com", 22, "rsa2", "0xabc");

    assert_eq!(status, HostKeyStatus::Match);
    assert!(fx
        .registry
        .query_value(&host_keys_path(), "rsa2@22:example.com")
        .is_some());
    let reports = fx.reporter.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].starts_with("Unable to create file (key won't be deleted from registry)"));
}

struct FakeEnvironment {
    local: PathBuf,
    roaming: PathBuf,
    system: PathBuf,
    vars: HashMap<&'static str, String>,
}

impl FakeEnvironment {
    fn under(root: &Path) -> Self {
        for name in ["local", "roaming", "home", "system"] {
            fs::create_dir_all(root.join(name)).expect("env dir should be created");
        }
        let home = root.join("home").display().to_string();
        Self {
            local: root.join("local"),
            roaming: root.join("roaming"),
            system: root.join("system"),
            vars: HashMap::from([("HOMEDRIVE", String::new()), ("HOMEPATH", home)]),
        }
    }
}

impl SeedEnvironment for FakeEnvironment {
    fn local_data_dir(&self) -> Option<PathBuf> {
        Some(self.local.clone())
    }

    fn roaming_data_dir(&self) -> Option<PathBuf> {
        Some(self.roaming.clone())
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn system_dir(&self) -> Option<PathBuf> {
        Some(self.system.clone())
    }
}

fn set_seed_override(fx: &Fixture, path: &Path) {
    let root = KeyPath::parse(r"Software\SimonTatham\PuTTY").expect("root should parse");
    fx.registry.create_key(&root).expect("root should be created");
    fx.registry
        .set_value(
            &root,
            RAND_SEED_VALUE,
            RegValue::Sz(path.display().to_string()),
        )
        .expect("override should be stored");
}

#[test]
fn seed_candidates_follow_priority_order() {
    let fx = fixture(Backend::Registry);
    let env = FakeEnvironment::under(&fx.root);
    let override_path = fx.root.join("custom.rnd");
    set_seed_override(&fx, &override_path);

    assert_eq!(
        fx.store.seed_with_env(&env).candidates(),
        vec![
            override_path,
            fx.root.join("local").join(SEED_FILE_NAME),
            fx.root.join("roaming").join(SEED_FILE_NAME),
            fx.root.join("home").join(SEED_FILE_NAME),
            fx.root.join("system").join(SEED_FILE_NAME),
        ]
    );
}

#[test]
fn file_mode_seed_path_is_tried_last() {
    let fx = fixture(Backend::File);
    let env = FakeEnvironment::under(&fx.root);
    let override_path = fx.root.join("custom.rnd");
    set_seed_override(&fx, &override_path);

    let candidates = fx.store.seed_with_env(&env).candidates();
    assert_eq!(candidates.len(), 6);
    assert_eq!(candidates.first(), Some(&override_path));
    assert_eq!(candidates.last(), Some(&fx.root.join("putty.rnd")));
}

#[test]
fn override_beats_conf_seed_file_in_file_mode() {
    let fx = fixture(Backend::File);
    let env = FakeEnvironment::under(&fx.root);
    let override_path = fx.root.join("custom.rnd");
    fs::write(&override_path, b"override").expect("override seed should be written");
    fs::write(fx.root.join("putty.rnd"), b"conf").expect("conf seed should be written");
    set_seed_override(&fx, &override_path);

    let handle = fx
        .store
        .seed_with_env(&env)
        .resolve(SeedIntent::Read)
        .expect("a seed should be found");
    assert_eq!(handle.path, override_path);
}

#[test]
fn configured_seed_override_wins_for_reading() {
    let fx = fixture(Backend::Registry);
    let env = FakeEnvironment::under(&fx.root);
    let override_path = fx.root.join("custom.rnd");
    fs::write(&override_path, b"override").expect("override seed should be written");
    fs::write(env.local.join(SEED_FILE_NAME), b"local").expect("local seed should be written");
    set_seed_override(&fx, &override_path);

    let seed = fx.store.seed_with_env(&env);
    let handle = seed.resolve(SeedIntent::Read).expect("a seed should be found");
    assert_eq!(handle.path, override_path);

    let mut collected = Vec::new();
    assert!(seed.read_random_seed(|chunk| collected.extend_from_slice(chunk)));
    assert_eq!(collected, b"override".to_vec());
}

#[test]
fn reading_without_any_seed_reports_nothing_found() {
    let fx = fixture(Backend::Registry);
    let env = FakeEnvironment::under(&fx.root);
    let seed = fx.store.seed_with_env(&env);

    assert!(seed.resolve(SeedIntent::Read).is_none());
    assert!(!seed.read_random_seed(|_| panic!("no data expected")));
}

#[test]
fn seed_write_skips_uncreatable_candidates() {
    let fx = fixture(Backend::Registry);
    let env = FakeEnvironment::under(&fx.root);
    set_seed_override(&fx, &fx.root.join("missing-dir").join("custom.rnd"));

    let written = fx
        .store
        .seed_with_env(&env)
        .write_random_seed(b"fresh")
        .expect("seed write should not fail");
    let local = env.local.join(SEED_FILE_NAME);
    assert_eq!(written, Some(local.clone()));
    assert_eq!(fs::read(local).expect("seed should be on disk"), b"fresh".to_vec());
}

#[test]
fn seed_delete_visits_every_candidate() {
    let fx = fixture(Backend::Registry);
    let env = FakeEnvironment::under(&fx.root);
    for dir in ["local", "home", "system"] {
        fs::write(fx.root.join(dir).join(SEED_FILE_NAME), b"seed").expect("seed should be written");
    }

    assert!(fx.store.seed_with_env(&env).resolve(SeedIntent::Delete).is_none());
    for dir in ["local", "roaming", "home", "system"] {
        assert!(!fx.root.join(dir).join(SEED_FILE_NAME).exists());
    }
    assert!(fx.reporter.reports().is_empty());
}

#[test]
fn seed_delete_reports_failures_and_keeps_going() {
    let fx = fixture(Backend::Registry);
    let env = FakeEnvironment::under(&fx.root);
    fs::create_dir(env.local.join(SEED_FILE_NAME)).expect("blocking dir should be created");
    for dir in ["home", "system"] {
        fs::write(fx.root.join(dir).join(SEED_FILE_NAME), b"seed").expect("seed should be written");
    }

    fx.store.seed_with_env(&env).delete_everywhere();

    let reports = fx.reporter.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].starts_with("Unable to delete"));
    assert!(env.local.join(SEED_FILE_NAME).is_dir());
    for dir in ["home", "system"] {
        assert!(!fx.root.join(dir).join(SEED_FILE_NAME).exists());
    }
}

#[test]
fn cleanup_removes_registry_tree_and_seeds() {
    let fx = fixture(Backend::Registry);
    let env = FakeEnvironment::under(&fx.root);
    save_session(&fx.store, "S", &[("k", "v")]);
    fx.store
        .host_keys(&FixedAnswer(Confirmation::Cancel))
        .store("example.com", 22, "rsa2", "0x1")
        .expect("key should be stored");
    fs::write(env.local.join(SEED_FILE_NAME), b"seed").expect("seed should be written");

    fx.store.cleanup_all_with_env(&env).expect("cleanup should succeed");

    let parent = KeyPath::parse(r"Software\SimonTatham").expect("path should parse");
    assert!(!fx.registry.key_exists(&parent));
    assert!(!env.local.join(SEED_FILE_NAME).exists());
    assert_eq!(fx.store.enumerate().count(), 0);
}

#[test]
fn cleanup_keeps_parent_with_other_products() {
    let fx = fixture(Backend::Registry);
    let env = FakeEnvironment::under(&fx.root);
    let sibling = KeyPath::parse(r"Software\SimonTatham\Other").expect("path should parse");
    fx.registry.create_key(&sibling).expect("sibling should be created");
    save_session(&fx.store, "S", &[("k", "v")]);

    fx.store.cleanup_all_with_env(&env).expect("cleanup should succeed");

    assert!(fx.registry.key_exists(&sibling));
    let root = KeyPath::parse(r"Software\SimonTatham\PuTTY").expect("path should parse");
    assert!(!fx.registry.key_exists(&root));
}

#[test]
fn fonts_need_every_part_to_read_back() {
    let fx = fixture(Backend::File);
    let font = FontSpec {
        name: "Courier New".to_string(),
        is_bold: true,
        charset: 0,
        height: 10,
    };
    let mut writer = fx.store.open_write("fonts").expect("session should open");
    writer.set_font("Font", &font);
    writer.set_str("Partial", "Consolas");
    writer.set_int("PartialIsBold", 0);
    writer.set_filename("LogFileName", Path::new("/var/log/putty.log"));
    fx.store.close_write(writer).expect("session should be saved");

    let reader = fx.store.open_read("fonts").expect("session should be readable");
    assert_eq!(reader.get_font("Font"), Some(font));
    assert_eq!(reader.get_font("Partial"), None);
    assert_eq!(
        reader.get_filename("LogFileName"),
        Some(PathBuf::from("/var/log/putty.log"))
    );
}

#[test]
fn json_hive_persists_sessions_between_opens() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let hive = dir.path().join("hive.json");

    {
        let registry = Arc::new(JsonRegistry::open(&hive).expect("empty hive should open"));
        let store = open_store(
            Backend::Registry,
            dir.path(),
            registry,
            Arc::new(CollectingReporter::new()),
        );
        save_session(&store, "persisted", &[("HostName", "example.com")]);
    }

    let registry = Arc::new(JsonRegistry::open(&hive).expect("hive should reopen"));
    let store = open_store(
        Backend::Registry,
        dir.path(),
        registry,
        Arc::new(CollectingReporter::new()),
    );
    let reader = store.open_read("persisted").expect("session should survive reopen");
    assert_eq!(reader.get_str("HostName").as_deref(), Some("example.com"));
}

#[test]
fn entries_list_every_setting_with_backend_types() {
    let file = fixture(Backend::File);
    let mut writer = file.store.open_write("S").expect("session should open");
    writer.set_str("Host Name", "h");
    writer.set_int("Port", 22);
    file.store.close_write(writer).expect("session should be saved");
    let reader = file.store.open_read("S").expect("session should be readable");
    assert_eq!(
        reader.entries(),
        vec![
            ("Host Name".to_string(), SettingValue::Str("h".to_string())),
            ("Port".to_string(), SettingValue::Str("22".to_string())),
        ]
    );

    let registry = fixture(Backend::Registry);
    let mut writer = registry.store.open_write("S").expect("session should open");
    writer.set_str("Host Name", "h");
    writer.set_int("Port", 22);
    registry.store.close_write(writer).expect("close should succeed");
    let reader = registry.store.open_read("S").expect("session should be readable");
    assert_eq!(
        reader.entries(),
        vec![
            ("Host Name".to_string(), SettingValue::Str("h".to_string())),
            ("Port".to_string(), SettingValue::Int(22)),
        ]
    );
}
