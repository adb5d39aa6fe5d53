//! Status command implementation

use anyhow::{Context, Result};
use sf_migrate::{MigrateOptions, MigrationStatus};

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::{load_project, parse_schema, print_table};

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let options = MigrateOptions {
        schema: parse_schema(args.schema.as_deref())?,
        ..MigrateOptions::default()
    };
    let migrator = project.build_migrator();
    let connector = project.connect(args.database.as_deref())?;

    let status = migrator
        .status_with_options(connector, &options)
        .await
        .context("Failed to read migration status")?;

    match args.output {
        OutputFormat::Table => print_status(&status),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
    }
    Ok(())
}

fn print_status(status: &MigrationStatus) {
    let pending = if status.pending.is_empty() {
        "-".to_string()
    } else {
        status
            .pending
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    print_table(
        &["DATABASE", "CURRENT", "LATEST", "PENDING"],
        &[vec![
            status.database.clone(),
            status.current_version.to_string(),
            status.latest_version.to_string(),
            pending,
        ]],
    );
}
