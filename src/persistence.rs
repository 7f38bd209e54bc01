//! Persistence glue: reads/writes migration documents in a migrations
//! directory, indexes them, and assembles the regenerable combined bundle.

use crate::error::{MigrateError, Result};
use crate::migration::SchemaMigration;
use crate::sql::SqlMigration;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::warn;

static MIGRATION_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Migration_([1-9][0-9]*|0)\.json$").expect("static regex"));
static SQL_MIGRATION_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SQLMigration_([1-9][0-9]*|0)\.json$").expect("static regex"));

pub const SQL_MIGRATIONS_COMBINED_FILE: &str = "SQLMigration_Combined.json";

pub fn migration_filename(index: u64) -> String {
    format!("Migration_{index}.json")
}

pub fn sql_migration_filename(index: u64) -> String {
    format!("SQLMigration_{index}.json")
}

fn list_matching(dir: &Path, re: &Regex) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(MigrateError::MigrationsDirNotFound(dir.to_path_buf()));
    }
    let mut matches = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(name) = name.to_str() {
            if re.is_match(name) {
                matches.push(entry.path());
            }
        }
    }
    Ok(matches)
}

/// Reads every `Migration_<N>.json` in `dir`, sorted by numeric index
/// (not string order). A file that fails to parse is skipped with a
/// warning rather than aborting the whole scan.
pub fn read_all_migrations(dir: &Path) -> Result<Vec<SchemaMigration>> {
    let paths = list_matching(dir, &MIGRATION_FILE_RE)?;
    let mut migrations = Vec::new();
    for path in paths {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<SchemaMigration>(&contents) {
                Ok(migration) => migrations.push(migration),
                Err(err) => warn!("skipping unparseable migration file {}: {err}", path.display()),
            },
            Err(err) => warn!("skipping unreadable migration file {}: {err}", path.display()),
        }
    }
    migrations.sort_by_key(|m| m.index);
    Ok(migrations)
}

/// Reads every `SQLMigration_<N>.json` in `dir` as raw JSON values (used by
/// the combined-bundle assembly, which re-emits them verbatim), sorted by
/// numeric index.
pub fn read_all_sql_migrations(dir: &Path) -> Result<Vec<serde_json::Value>> {
    let paths = list_matching(dir, &SQL_MIGRATION_FILE_RE)?;
    let mut migrations = Vec::new();
    for path in paths {
        let contents = std::fs::read_to_string(&path)?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;
        migrations.push(value);
    }
    migrations.sort_by_key(|v| v.get("migrationIndex").and_then(serde_json::Value::as_u64).unwrap_or(0));
    Ok(migrations)
}

/// `max(existing) + 1`, or `0` if the directory has no migrations yet.
pub fn next_migration_index(dir: &Path) -> Result<u64> {
    let migrations = read_all_migrations(dir)?;
    Ok(migrations.iter().map(|m| m.index).max().map_or(0, |max| max + 1))
}

pub fn write_migration(dir: &Path, migration: &SchemaMigration) -> Result<()> {
    let path = dir.join(migration_filename(migration.index));
    let contents = serde_json::to_string_pretty(migration)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn write_sql_migration(dir: &Path, sql_migration: &SqlMigration) -> Result<()> {
    let path = dir.join(sql_migration_filename(sql_migration.migration_index));
    let contents = serde_json::to_string_pretty(sql_migration)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn sql_migration_exists(dir: &Path, index: u64) -> bool {
    dir.join(sql_migration_filename(index)).is_file()
}

/// Deletes the existing combined bundle (if any) and regenerates it from
/// every `SQLMigration_<N>.json` currently on disk. The bundle is never
/// authoritative — it is recomputed on every `sqlmigration` run.
pub fn rewrite_combined_bundle(dir: &Path) -> Result<()> {
    let combined_path = dir.join(SQL_MIGRATIONS_COMBINED_FILE);
    if combined_path.is_file() {
        std::fs::remove_file(&combined_path)?;
    }
    let migrations = read_all_sql_migrations(dir)?;
    let bundle = serde_json::json!({ "sql_migrations": migrations });
    std::fs::write(combined_path, serde_json::to_string_pretty(&bundle)?)?;
    Ok(())
}
