//! List command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use sf_migrate::Migration;

use crate::cli::{GlobalArgs, LsArgs, OutputFormat};
use crate::commands::common::{load_project, print_table};

/// Migration information for display
#[derive(Debug, Serialize)]
struct MigrationInfo {
    version: i64,
    transaction: bool,
    name: String,
}

impl MigrationInfo {
    fn from_migration(migration: &dyn Migration) -> Self {
        Self {
            version: migration.version(),
            transaction: !migration.disable_transaction(),
            name: migration.name().to_string(),
        }
    }
}

/// Execute the ls command
pub async fn execute(args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let migrator = project.build_migrator();
    let set = migrator.load().with_context(|| {
        format!(
            "Failed to load migrations from {}",
            project.migrations_dir().display()
        )
    })?;

    let migrations: Vec<MigrationInfo> = set
        .migrations()
        .iter()
        .map(|m| MigrationInfo::from_migration(m.as_ref()))
        .collect();

    match args.output {
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = migrations
                .iter()
                .map(|m| {
                    vec![
                        m.version.to_string(),
                        if m.transaction { "yes" } else { "no" }.to_string(),
                        m.name.clone(),
                    ]
                })
                .collect();
            print_table(&["VERSION", "TRANSACTION", "NAME"], &rows);
            println!();
            println!(
                "{} migration(s), latest version {}",
                set.len(),
                set.latest_version()
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&migrations)?),
    }
    Ok(())
}
