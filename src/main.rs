use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use session_store::{
    Backend, Confirm, Confirmation, FixedAnswer, HostKeyStatus, SettingValue, SettingsStore,
};
use termstore::config::{AppConfig, EnvConfig};
use termstore::console::{ConsoleReporter, PromptConfirm};
use termstore::logging;

#[derive(Parser)]
#[command(name = "termstore")]
#[command(about = "Inspect and edit saved terminal sessions, host keys and the seed file")]
struct Cli {
    /// Storage backend; overrides TERMSTORE_BACKEND
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendArg>,
    /// Program directory holding termstore.conf; overrides TERMSTORE_HOME
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    /// JSON hive used as the structured store; overrides TERMSTORE_HIVE
    #[arg(long, global = true)]
    hive: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    File,
    Registry,
}

impl From<BackendArg> for Backend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::File => Backend::File,
            BackendArg::Registry => Backend::Registry,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List saved sessions
    List,
    /// Print every setting of a session
    Show { session: String },
    /// Set one setting, keeping the others
    Set {
        session: String,
        key: String,
        value: String,
        /// Store the value as an integer
        #[arg(long)]
        int: bool,
    },
    /// Delete a saved session
    Delete { session: String },
    /// Recently used sessions
    #[command(subcommand)]
    Recent(RecentCommand),
    /// Cached host keys
    #[command(subcommand)]
    Hostkey(HostKeyCommand),
    /// Random seed file
    #[command(subcommand)]
    Seed(SeedCommand),
    /// Remove the seed file everywhere and the whole structured store
    Cleanup {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum RecentCommand {
    List,
    Add { session: String },
    Remove { session: String },
}

#[derive(Subcommand)]
enum HostKeyCommand {
    /// Compare a key with the cache; exits 0 on match, 1 on mismatch, 2 when absent
    Verify {
        host: String,
        port: u16,
        keytype: String,
        key: String,
        /// Answer to the offer to move a registry key into the file store
        #[arg(long, value_enum, default_value = "ask")]
        migrate: MigrateArg,
    },
    Store {
        host: String,
        port: u16,
        keytype: String,
        key: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MigrateArg {
    Ask,
    Move,
    Copy,
    Skip,
}

#[derive(Subcommand)]
enum SeedCommand {
    /// Print candidate locations, best first
    Where,
    /// Print the seed as hex
    Read,
    /// Store the contents of a file as the seed
    Write { input: PathBuf },
    /// Delete the seed from every location
    Delete,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut env = EnvConfig::from_env();
    if let Some(backend) = cli.backend {
        env.backend = Some(backend.into());
    }
    if cli.home.is_some() {
        env.home = cli.home.clone();
    }
    if cli.hive.is_some() {
        env.hive = cli.hive.clone();
    }

    if let Err(error) = logging::init(env.log_filter()) {
        eprintln!("termstore: logging disabled: {error}");
    }

    let reporter = Arc::new(ConsoleReporter);
    let config = AppConfig::load(env, reporter.as_ref());
    let store = config
        .open_store(reporter)
        .context("failed to open the settings store")?;

    run(&store, cli.command)
}

fn run(store: &SettingsStore, command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::List => {
            for name in store.enumerate() {
                println!("{name}");
            }
        }
        Commands::Show { session } => {
            let Some(reader) = store.open_read(&session) else {
                bail!("no saved session named '{session}'");
            };
            for (key, value) in reader.entries() {
                match value {
                    SettingValue::Str(value) => println!("{key}={value}"),
                    SettingValue::Int(value) => println!("{key}={value} (int)"),
                }
            }
            store.close_read(reader);
        }
        Commands::Set {
            session,
            key,
            value,
            int,
        } => {
            let value = if int {
                SettingValue::Int(
                    value
                        .trim()
                        .parse()
                        .with_context(|| format!("'{value}' is not an integer"))?,
                )
            } else {
                SettingValue::Str(value)
            };
            set_setting(store, &session, &key, value)?;
        }
        Commands::Delete { session } => {
            store
                .delete(&session)
                .with_context(|| format!("failed to delete '{session}'"))?;
        }
        Commands::Recent(command) => run_recent(store, command)?,
        Commands::Hostkey(command) => return run_host_key(store, command),
        Commands::Seed(command) => run_seed(store, command)?,
        Commands::Cleanup { yes } => {
            let answer = if yes {
                Confirmation::Affirm
            } else {
                PromptConfirm::stdio().confirm(
                    "This removes the seed file and every setting in the structured store. Continue?",
                )
            };
            if answer == Confirmation::Affirm {
                store.cleanup_all().context("cleanup failed")?;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Rewrites the session with one setting replaced.
fn set_setting(
    store: &SettingsStore,
    session: &str,
    key: &str,
    value: SettingValue,
) -> anyhow::Result<()> {
    let existing = store
        .open_read(session)
        .map(|reader| reader.entries())
        .unwrap_or_default();

    let mut writer = store
        .open_write(session)
        .with_context(|| format!("failed to open '{session}' for writing"))?;
    for (name, old) in existing {
        if name != key {
            writer.set(&name, old);
        }
    }
    writer.set(key, value);
    store
        .close_write(writer)
        .with_context(|| format!("failed to save '{session}'"))
}

fn run_recent(store: &SettingsStore, command: RecentCommand) -> anyhow::Result<()> {
    let recent = store.recent();
    match command {
        RecentCommand::List => {
            for name in recent.get_entries() {
                println!("{name}");
            }
        }
        RecentCommand::Add { session } => recent.add_entry(&session)?,
        RecentCommand::Remove { session } => recent.remove_entry(&session)?,
    }
    Ok(())
}

fn run_host_key(store: &SettingsStore, command: HostKeyCommand) -> anyhow::Result<ExitCode> {
    match command {
        HostKeyCommand::Verify {
            host,
            port,
            keytype,
            key,
            migrate,
        } => {
            let confirm: Box<dyn Confirm> = match migrate {
                MigrateArg::Ask => Box::new(PromptConfirm::stdio()),
                MigrateArg::Move => Box::new(FixedAnswer(Confirmation::Affirm)),
                MigrateArg::Copy => Box::new(FixedAnswer(Confirmation::Decline)),
                MigrateArg::Skip => Box::new(FixedAnswer(Confirmation::Cancel)),
            };
            let status = store
                .host_keys(confirm.as_ref())
                .verify(&host, port, &keytype, &key);
            let (label, code) = match status {
                HostKeyStatus::Match => ("match", 0),
                HostKeyStatus::Mismatch => ("mismatch", 1),
                HostKeyStatus::Absent => ("absent", 2),
            };
            println!("{label}");
            Ok(ExitCode::from(code))
        }
        HostKeyCommand::Store {
            host,
            port,
            keytype,
            key,
        } => {
            let confirm = FixedAnswer(Confirmation::Cancel);
            store
                .host_keys(&confirm)
                .store(&host, port, &keytype, &key)
                .with_context(|| format!("failed to store the {keytype} key for {host}:{port}"))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_seed(store: &SettingsStore, command: SeedCommand) -> anyhow::Result<()> {
    let seed = store.seed();
    match command {
        SeedCommand::Where => {
            for path in seed.candidates() {
                println!("{}", path.display());
            }
        }
        SeedCommand::Read => {
            let mut hex = String::new();
            let found = seed.read_random_seed(|chunk| {
                for byte in chunk {
                    hex.push_str(&format!("{byte:02x}"));
                }
            });
            if !found {
                bail!("no seed file found");
            }
            println!("{hex}");
        }
        SeedCommand::Write { input } => {
            let data =
                fs::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
            match seed.write_random_seed(&data)? {
                Some(path) => println!("{}", path.display()),
                None => bail!("no seed location accepted a write"),
            }
        }
        SeedCommand::Delete => seed.delete_everywhere(),
    }
    Ok(())
}
