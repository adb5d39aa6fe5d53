//! Migrate command implementation

use anyhow::{Context, Result};
use sf_migrate::{CancellationToken, MigrateOptions, MigrationOutcome};
use tokio::task::JoinHandle;

use crate::cli::{GlobalArgs, MigrateArgs};
use crate::commands::common::{load_project, parse_schema, ExitCode, EXIT_CANCELLED};

/// Execute the migrate command
pub async fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let schema = parse_schema(args.schema.as_deref())?;
    let migrator = project.build_migrator();
    let connector = project.connect(args.database.as_deref())?;

    let cancel = CancellationToken::new();
    let interrupt = watch_for_interrupt(cancel.clone());
    let options = MigrateOptions { schema, cancel };
    let result = migrator.migrate_with_options(connector, &options).await;
    interrupt.abort();

    match result {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(err) if err.is_cancelled() => {
            eprintln!("{err}");
            Err(ExitCode(EXIT_CANCELLED).into())
        }
        Err(err) => Err(err).context("Migration failed"),
    }
}

/// Cancel the run on Ctrl-C. The current migration finishes or rolls back;
/// no further migration starts.
fn watch_for_interrupt(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling after the current migration");
            cancel.cancel();
        }
    })
}

fn print_outcome(outcome: &MigrationOutcome) {
    if outcome.is_noop() {
        println!(
            "{} is up to date (version {})",
            outcome.database, outcome.to_version
        );
    } else {
        println!(
            "Migrated {} from version {} to {} ({} migration(s) applied)",
            outcome.database,
            outcome.from_version,
            outcome.to_version,
            outcome.applied.len()
        );
    }
}
