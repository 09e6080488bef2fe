//! Command execution against the configured SQLite database.

use crate::{cli::Command, config::Config};
use corehub_core::{migrations, prelude::*, startup::DEFAULT_STACK_NAME};
use std::{io, path::Path};
use thiserror::Error as ThisError;
use tracing::{error, info, warn};

/// Exit code for failures outside the startup halt taxonomy.
pub const EXIT_BOOTSTRAP: u8 = 1;

///
/// AppError
///

#[derive(Debug, ThisError)]
pub enum AppError {
    #[error(transparent)]
    Halt(#[from] Halt),

    #[error("cannot write command output: {0}")]
    Output(#[from] io::Error),
}

impl AppError {
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Halt(halt) => halt.exit_code(),
            Self::Output(_) => EXIT_BOOTSTRAP,
        }
    }
}

/// Run `command`, writing any human-readable result to `out`.
pub fn execute(command: Command, config: &Config, out: &mut dyn io::Write) -> Result<(), AppError> {
    let history = declared_history()?;

    if command == Command::Heads {
        writeln!(out, "{} (head)", history.head())?;
        return Ok(());
    }

    let mut store = open_store(&config.database.path)?;
    match command {
        Command::Start => {
            let outcome = Startup::new(history)
                .with_policy(config.schema.unmanaged)
                .run(&mut store, config.seed.bpnl.as_deref())?;
            report(out, &outcome)?;
        }
        Command::Current => {
            let current = store
                .current_revision()
                .map_err(|err| store_halt("read version marker", &err))?;
            match current {
                Some(revision) if &revision == history.head() => {
                    writeln!(out, "{revision} (head)")?;
                }
                Some(revision) => writeln!(out, "{revision}")?,
                None => writeln!(out, "<none>")?,
            }
        }
        Command::Stamp => {
            stamp(&mut store, history.head())?;
            writeln!(out, "stamped {}", history.head())?;
        }
        Command::Heads => {}
    }

    store
        .close()
        .map_err(|err| store_halt("close database", &err))?;

    Ok(())
}

fn declared_history() -> Result<RevisionGraph, Halt> {
    migrations::declared().map_err(|err| {
        error!(error = %err, "declared migration history is invalid");
        Halt::new(
            HaltReason::UpgradeFailure,
            format!("declared migration history is invalid: {err}"),
        )
    })
}

fn open_store(path: &Path) -> Result<SqliteStore, Halt> {
    let opened = if path == Path::new(":memory:") {
        SqliteStore::open_in_memory()
    } else {
        SqliteStore::open(path)
    };

    opened.map_err(|err| store_halt("open database", &err))
}

fn stamp(store: &mut SqliteStore, head: &Revision) -> Result<(), Halt> {
    let current = store
        .current_revision()
        .map_err(|err| store_halt("read version marker", &err))?;

    match &current {
        Some(revision) if revision == head => {
            info!(current = %revision, head = %head, "already stamped at head");
            return Ok(());
        }
        Some(revision) => {
            warn!(current = %revision, head = %head, "replacing recorded revision");
        }
        None => {}
    }

    store
        .stamp(head)
        .map_err(|err| store_halt("stamp version marker", &err))?;
    info!(head = %head, "stamped version marker");

    Ok(())
}

fn report(out: &mut dyn io::Write, outcome: &StartupOutcome) -> io::Result<()> {
    let entity = outcome.seed.legal_entity.entity();
    let stack = outcome.seed.stack.entity();

    writeln!(
        out,
        "ready: legal entity {} ({}), stack {} ({DEFAULT_STACK_NAME}), {} insert(s)",
        entity.id,
        entity.bpnl,
        stack.id,
        outcome.seed.inserts()
    )
}

fn store_halt(action: &str, err: &InternalError) -> Halt {
    error!(error = %err.display_with_class(), "cannot {action}");

    Halt::new(HaltReason::StoreFailure, format!("cannot {action}: {err}"))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::PathBuf};

    fn config(path: impl Into<PathBuf>, bpnl: Option<&str>) -> Config {
        let mut config = Config::default();
        config.database.path = path.into();
        config.seed.bpnl = bpnl.map(str::to_string);
        config
    }

    fn run(command: Command, config: &Config) -> (Result<(), AppError>, String) {
        let mut out = Vec::new();
        let result = execute(command, config, &mut out);

        (result, String::from_utf8(out).unwrap())
    }

    ///
    /// TempDb
    ///

    struct TempDb(PathBuf);

    impl TempDb {
        fn new(name: &str) -> Self {
            let path =
                std::env::temp_dir().join(format!("corehub-{name}-{}.db", std::process::id()));
            let _ = fs::remove_file(&path);
            Self(path)
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn heads_prints_declared_head_without_opening_store() {
        let (result, out) = run(Command::Heads, &config("/nonexistent/dir/corehub.db", None));

        result.unwrap();
        assert_eq!(out, "0002_stack_owner_index (head)\n");
    }

    #[test]
    fn start_on_fresh_database_provisions_seed() {
        let (result, out) = run(Command::Start, &config(":memory:", Some("BPNL123")));

        result.unwrap();
        assert!(out.starts_with("ready: legal entity 1 (BPNL123), stack 1"));
        assert!(out.contains("2 insert(s)"));
    }

    #[test]
    fn start_without_business_key_exits_with_configuration_code() {
        let (result, _) = run(Command::Start, &config(":memory:", None));

        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), HaltReason::MissingConfiguration.exit_code());
    }

    #[test]
    fn restart_is_idempotent_on_disk() {
        let db = TempDb::new("restart");
        let config = config(&db.0, Some("BPNL123"));

        run(Command::Start, &config).0.unwrap();
        let (result, out) = run(Command::Start, &config);

        result.unwrap();
        assert!(out.contains("0 insert(s)"));

        let (result, out) = run(Command::Current, &config);
        result.unwrap();
        assert_eq!(out, "0002_stack_owner_index (head)\n");
    }

    #[test]
    fn current_on_fresh_database_reports_none() {
        let (result, out) = run(Command::Current, &config(":memory:", None));

        result.unwrap();
        assert_eq!(out, "<none>\n");
    }

    #[test]
    fn stamp_lets_an_unmanaged_database_start() {
        let db = TempDb::new("stamp");
        let config = config(&db.0, Some("BPNL123"));

        // Schema created by hand: tables present, no version table.
        let mut store = SqliteStore::open(&db.0).unwrap();
        migrations::declared()
            .unwrap()
            .upgrade_to_head(&mut store)
            .unwrap();
        store.close().unwrap();
        rusqlite::Connection::open(&db.0)
            .unwrap()
            .execute_batch(&format!("DROP TABLE {};", migrations::VERSION_TABLE))
            .unwrap();

        let err = run(Command::Start, &config).0.unwrap_err();
        assert_eq!(
            err.exit_code(),
            HaltReason::AmbiguousSchemaState.exit_code()
        );

        let (result, out) = run(Command::Stamp, &config);
        result.unwrap();
        assert_eq!(out, "stamped 0002_stack_owner_index\n");

        run(Command::Start, &config).0.unwrap();
    }
}
