//! Command-line entry point: wires the CLI surface onto the core engines.

use clap::{Parser, Subcommand};
use colored::Colorize;
use schemamigrate::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

/// Interactive schema-migration authoring and SQL compiler for the SQLite dialect.
#[derive(Parser)]
#[command(name = "schemamigrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug) diagnostics.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Diff the schema file against migration history and author a new migration.
    Createmigration {
        schema_file: PathBuf,
        migrations_dir: PathBuf,
    },

    /// Validate a schema file, printing every structural error found.
    Validateschema {
        schema_file: PathBuf,

        /// Print the offending row beneath each error, with a caret indicator.
        #[arg(long)]
        show_context: bool,
    },

    /// Compile every migration lacking compiled SQL, then regenerate the combined bundle.
    Sqlmigration { migrations_dir: PathBuf },

    /// Run the crate's own scenario checks, as a convenience alongside `cargo test`.
    Runtests,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ok = match cli.command {
        Commands::Createmigration { schema_file, migrations_dir } => {
            create_migration(&schema_file, &migrations_dir)
        }
        Commands::Validateschema { schema_file, show_context } => {
            validate_schema_command(&schema_file, show_context)
        }
        Commands::Sqlmigration { migrations_dir } => sql_migration_command(&migrations_dir),
        Commands::Runtests => run_tests(),
    };

    if ok {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn read_schema_document(path: &Path) -> std::result::Result<Schema, String> {
    let contents = std::fs::read_to_string(path).map_err(|err| format!("Could not read schema file: {err}"))?;
    serde_json::from_str(&contents).map_err(|err| format!("Error reading JSON file: {err}"))
}

fn print_errors(errors: &[ValidationError], show_context: bool) {
    for error in errors {
        let mut error = error.clone();
        if show_context {
            error.toggle_context();
        }
        println!("{}", error.to_string().red());
    }
}

fn create_migration(schema_file: &Path, migrations_dir: &Path) -> bool {
    let mut new_schema = match read_schema_document(schema_file) {
        Ok(schema) => schema,
        Err(message) => {
            println!("{}", message.red());
            return false;
        }
    };

    if !migrations_dir.is_dir() {
        println!("{}", format!("Migrations directory not found: {}", migrations_dir.display()).red());
        return false;
    }

    new_schema.add_table(tracking_table());
    let errors = validate_schema(&new_schema);
    if !errors.is_empty() {
        println!("{}", "Failed to validate new schema. Fix the errors and try again.".red());
        print_errors(&errors, false);
        return false;
    }

    let existing_migrations = match schemamigrate::persistence::read_all_migrations(migrations_dir) {
        Ok(migrations) => migrations,
        Err(err) => {
            println!("{}", err.to_string().red());
            return false;
        }
    };

    let mut previous_schema = Schema::new(vec![]);
    for migration in &existing_migrations {
        let errors = apply(&mut previous_schema, migration);
        if !errors.is_empty() {
            println!("{}", format!("Failed to replay migration #{}.", migration.index).red());
            print_errors(&errors, true);
            return false;
        }
    }

    let next_index = existing_migrations.iter().map(|m| m.index).max().map_or(0, |m| m + 1);
    let oracle = TerminalOracle;
    let mut new_migration = diff_schema(&previous_schema, &new_schema, &oracle);
    new_migration.index = next_index;

    if new_migration.tables.is_empty() {
        println!("{}", "There are no changes to be made.".yellow());
        return true;
    }

    println!("{new_migration:#?}");
    if oracle.ask_yes_no("Save this migration?") {
        if let Err(err) = schemamigrate::persistence::write_migration(migrations_dir, &new_migration) {
            println!("{}", err.to_string().red());
            return false;
        }
        println!("{}", format!("Wrote migration #{next_index}.").green());
    } else {
        println!("{}", "Cancelled.".yellow());
    }

    true
}

fn validate_schema_command(schema_file: &Path, show_context: bool) -> bool {
    let mut schema = match read_schema_document(schema_file) {
        Ok(schema) => schema,
        Err(message) => {
            println!("{}", message.red());
            return false;
        }
    };
    schema.add_table(tracking_table());

    let errors = validate_schema(&schema);
    if errors.is_empty() {
        println!("{}", "No errors found!".green());
    } else {
        print_errors(&errors, show_context);
    }

    println!("{schema}");
    errors.is_empty()
}

fn sql_migration_command(migrations_dir: &Path) -> bool {
    let migrations = match schemamigrate::persistence::read_all_migrations(migrations_dir) {
        Ok(migrations) => migrations,
        Err(err) => {
            println!("{}", err.to_string().red());
            return false;
        }
    };

    let mut running_schema = Schema::new(vec![]);
    for migration in &migrations {
        if !schemamigrate::persistence::sql_migration_exists(migrations_dir, migration.index) {
            let compiled = compile(migration, &running_schema);
            debug!("compiled {} statements for migration #{}", compiled.sql_statements.len(), migration.index);
            if let Err(err) = schemamigrate::persistence::write_sql_migration(migrations_dir, &compiled) {
                println!("{}", err.to_string().red());
                return false;
            }
        }
        let errors = apply(&mut running_schema, migration);
        if !errors.is_empty() {
            println!("{}", format!("Migration #{} no longer validates against history.", migration.index).red());
            print_errors(&errors, true);
            return false;
        }
    }

    match schemamigrate::persistence::rewrite_combined_bundle(migrations_dir) {
        Ok(()) => {
            println!("{}", "Combined SQL bundle regenerated.".green());
            true
        }
        Err(err) => {
            println!("{}", err.to_string().red());
            false
        }
    }
}

fn run_tests() -> bool {
    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{} {name}", "ok".green());
            passed += 1;
        } else {
            println!("{} {name}", "FAIL".red());
            failed += 1;
        }
    };

    // Empty schema, two added tables: two CREATE TABLE statements in add order.
    let mut migration = SchemaMigration::new(0, None);
    let mut first = TableMigration::new(None, Some("FirstTable"));
    first.add_column_migration(ColumnMigration::new(None, Some(&Column::new("NewCol", "INTEGER"))));
    migration.add_table_migration(first);
    migration.add_table_migration(TableMigration::new(None, Some("SecondTable")));
    let compiled = compile(&migration, &Schema::new(vec![]));
    check("empty schema produces create-table statements in add order", compiled.sql_statements.len() == 2);

    // Removing a table emits a single DROP TABLE statement.
    let existing = Table::new("FirstTable");
    let pre_schema = Schema::new(vec![existing.clone()]);
    let mut migration = SchemaMigration::new(1, None);
    migration.add_table_migration(TableMigration::new(Some(&existing), None));
    let compiled = compile(&migration, &pre_schema);
    check(
        "remove migration emits a single drop statement",
        compiled.sql_statements == vec!["DROP TABLE FirstTable;".to_string()],
    );

    // Diffing then applying reaches an equivalent schema, with no rename prompts.
    let old = Schema::new(vec![Table::new("Old")]);
    let mut new_table = Table::new("Old");
    new_table.add_column(Column::new("x", "INTEGER"));
    let target = Schema::new(vec![new_table]);
    let oracle = ScriptedOracle::never_rename();
    let migration = diff_schema(&old, &target, &oracle);
    let mut applied = old.copy();
    apply(&mut applied, &migration);
    check("diff-then-apply reaches the target schema", applied.compare_equivalence(&target));

    println!("{passed} passed, {failed} failed");
    failed == 0
}
