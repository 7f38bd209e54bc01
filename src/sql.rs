//! The SQL compiler: lowers a [`SchemaMigration`] into an ordered list of SQL
//! statements for the SQLite dialect, including the shadow-table dance for
//! complex table migrations.

use crate::migration::{ColumnMigration, SchemaMigration, TableMigration};
use crate::schema::{Migratable, Schema, Table};

pub const OLD_TABLE_PREFIX: &str = "PRE_MIGRATION_TABLE_";
pub const NEW_TABLE_PREFIX: &str = "NEW_CREATED_TABLE_";

/// One compiled migration: the statement list plus the index/name it was
/// compiled from, ready to be written as a `SQLMigration_<N>.json` document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SqlMigration {
    #[serde(rename = "migrationIndex")]
    pub migration_index: u64,
    #[serde(rename = "migrationName", skip_serializing_if = "Option::is_none", default)]
    pub migration_name: Option<String>,
    #[serde(rename = "sqlStatements")]
    pub sql_statements: Vec<String>,
}

/// Applies `migration`'s edits/adds/removes onto a copy of `old_table`
/// (`None` for a brand-new table) and returns the assembled post-migration
/// shape. Returns `None` for a remove migration — there is nothing to
/// assemble.
fn assemble_table_from_migration(old_table: Option<&Table>, migration: &TableMigration) -> Option<Table> {
    if migration.is_remove() {
        return None;
    }
    let mut new_table = match old_table {
        Some(t) => t.copy(),
        None => Table::new(migration.new_name.clone().expect("add migration has new_name")),
    };
    migration.run_edit_on_old_object(&mut new_table);
    migration.migrate_table(&mut new_table);
    Some(new_table)
}

fn write_create_table(table: &Table) -> String {
    let mut parts = Vec::new();
    for column in &table.columns {
        let mut text = format!("\n\t{} {}", column.name, column.datatype);
        for constraint in &column.constraints {
            text.push(' ');
            text.push_str(constraint);
        }
        parts.push(text);
    }
    for fkey in &table.foreign_keys {
        let mut text = format!(
            "\n\tFOREIGN KEY ({}) REFERENCES {}({})",
            fkey.local_name, fkey.table_name, fkey.foreign_name
        );
        if let Some(action) = &fkey.on_update {
            if !action.is_empty() {
                text.push_str(&format!(" ON UPDATE {action}"));
            }
        }
        if let Some(action) = &fkey.on_delete {
            if !action.is_empty() {
                text.push_str(&format!(" ON DELETE {action}"));
            }
        }
        parts.push(text);
    }
    format!("CREATE TABLE {} ({});", table.name, parts.join(","))
}

fn write_drop_table(name: &str) -> String {
    format!("DROP TABLE {name};")
}

fn write_rename_table(old_name: &str, new_name: &str) -> String {
    format!("ALTER TABLE {old_name} RENAME TO {new_name};")
}

/// Every column whose old key survives: an edit contributes `(old_key,
/// new_name)`, an untouched column contributes `(name, name)`. Added columns
/// are not transferred (no old data); removed columns are not transferred
/// (no new home).
fn transferrable_columns(old_table: &Table, column_migrations: &[ColumnMigration]) -> Vec<(String, String)> {
    let touched: std::collections::HashSet<&str> = column_migrations
        .iter()
        .filter_map(|m| m.old_key.as_deref())
        .collect();

    let mut pairs: Vec<(String, String)> = column_migrations
        .iter()
        .filter(|m| m.is_edit())
        .map(|m| {
            (
                m.old_key.clone().expect("edit has old_key"),
                m.new_data.as_ref().expect("edit has new_data").name.clone(),
            )
        })
        .collect();

    for column in &old_table.columns {
        if !touched.contains(column.name.as_str()) {
            pairs.push((column.name.clone(), column.name.clone()));
        }
    }

    pairs
}

/// The SQLite dance: create the new shape under a prefix, copy transferrable
/// data across, drop the old table, rename the new one into place.
fn compile_complex_migration(old_table: &Table, table_migration: &TableMigration) -> Vec<String> {
    let mut statements = Vec::new();

    let mut new_table = assemble_table_from_migration(Some(old_table), table_migration)
        .expect("complex migration is never a remove");
    new_table.name = format!("{NEW_TABLE_PREFIX}{}", new_table.name);
    statements.push(write_create_table(&new_table));

    let transferrable = transferrable_columns(old_table, &table_migration.column_migrations);
    if !transferrable.is_empty() {
        let new_names: Vec<&str> = transferrable.iter().map(|(_, n)| n.as_str()).collect();
        let old_names: Vec<&str> = transferrable.iter().map(|(o, _)| o.as_str()).collect();
        statements.push(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {};",
            new_table.name,
            new_names.join(","),
            old_names.join(","),
            old_table.name
        ));
    }

    statements.push(write_drop_table(&old_table.name));
    statements.push(write_rename_table(&new_table.name, &table_migration.new_name.clone().unwrap()));

    statements
}

#[derive(Default)]
struct GroupedMigrations<'a> {
    adds: Vec<&'a TableMigration>,
    removes: Vec<&'a TableMigration>,
    pure_renames: Vec<&'a TableMigration>,
    complex: Vec<&'a TableMigration>,
}

fn group_table_migrations(migration: &SchemaMigration) -> GroupedMigrations<'_> {
    let mut groups = GroupedMigrations::default();
    for tm in &migration.tables {
        if tm.is_add() {
            groups.adds.push(tm);
        } else if tm.is_remove() {
            groups.removes.push(tm);
        } else if tm.column_migrations.is_empty() && tm.foreign_key_migrations.is_empty() {
            groups.pure_renames.push(tm);
        } else {
            groups.complex.push(tm);
        }
    }
    groups
}

/// Compiles `migration` against `pre_schema` (the schema state immediately
/// before this migration is applied) into an ordered statement list. The
/// emission order across groups is contractual — see module docs.
pub fn compile(migration: &SchemaMigration, pre_schema: &Schema) -> SqlMigration {
    let groups = group_table_migrations(migration);
    let mut statements = Vec::new();

    for tm in &groups.pure_renames {
        let old = tm.old_key.as_ref().expect("pure rename has old_key");
        statements.push(write_rename_table(old, &format!("{OLD_TABLE_PREFIX}{old}")));
    }

    for tm in &groups.removes {
        let old = tm.old_key.as_ref().expect("remove has old_key");
        statements.push(write_drop_table(old));
    }

    for tm in &groups.pure_renames {
        let old = tm.old_key.as_ref().expect("pure rename has old_key");
        let new = tm.new_name.as_ref().expect("pure rename has new_name");
        statements.push(write_rename_table(&format!("{OLD_TABLE_PREFIX}{old}"), new));
    }

    for tm in &groups.complex {
        let old_key = tm.old_key.as_ref().expect("complex migration has old_key");
        let old_table = pre_schema
            .get_table(old_key)
            .expect("pre_schema must contain every complex migration's subject");
        statements.extend(compile_complex_migration(old_table, tm));
    }

    for tm in &groups.adds {
        let assembled = assemble_table_from_migration(None, tm).expect("add is never a remove");
        statements.push(write_create_table(&assembled));
    }

    SqlMigration {
        migration_index: migration.index,
        migration_name: migration.name.clone(),
        sql_statements: statements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{ColumnMigration, FKeyMigration};
    use crate::schema::{Column, ForeignKey};

    #[test]
    fn empty_schema_two_table_add_in_order() {
        let mut migration = SchemaMigration::new(0, None);

        let mut first = TableMigration::new(None, Some("FirstTable"));
        first.add_column_migration(ColumnMigration::new(
            None,
            Some(&Column::new("NewCol", "INTEGER").with_constraints(vec!["NOT NULL".into(), "DEFAULT 1".into()])),
        ));
        first.add_column_migration(ColumnMigration::new(None, Some(&Column::new("SecondCol", "INTEGER"))));
        first.add_fkey_migration(FKeyMigration::new(
            None,
            Some(
                &ForeignKey::new("NewCol", "SecondTable", "ID")
                    .on_update("CASCADE")
                    .on_delete("CASCADE"),
            ),
        ));
        migration.add_table_migration(first);

        let mut second = TableMigration::new(None, Some("SecondTable"));
        second.add_column_migration(ColumnMigration::new(
            None,
            Some(&Column::new("ID", "INTEGER").with_constraints(vec!["PRIMARY KEY AUTOINCREMENT".into()])),
        ));
        migration.add_table_migration(second);

        let compiled = compile(&migration, &Schema::new(vec![]));
        assert_eq!(compiled.sql_statements.len(), 2);
        assert!(compiled.sql_statements[0].starts_with("CREATE TABLE FirstTable"));
        assert!(compiled.sql_statements[1].starts_with("CREATE TABLE SecondTable"));
    }

    #[test]
    fn pure_rename_uses_two_stage_prefix_dance() {
        let mut first = Table::new("FirstTable");
        first.add_column(Column::new("NewCol", "INTEGER"));
        first.add_column(Column::new("SecondCol", "INTEGER"));
        let pre_schema = Schema::new(vec![first.clone()]);

        let mut migration = SchemaMigration::new(0, None);
        migration.add_table_migration(TableMigration::new(Some(&first), Some("REALFirstTable")));

        let compiled = compile(&migration, &pre_schema);
        assert_eq!(
            compiled.sql_statements,
            vec![
                "ALTER TABLE FirstTable RENAME TO PRE_MIGRATION_TABLE_FirstTable;".to_string(),
                "ALTER TABLE PRE_MIGRATION_TABLE_FirstTable RENAME TO REALFirstTable;".to_string(),
            ]
        );
    }

    #[test]
    fn remove_table_emits_single_drop() {
        let first = Table::new("FirstTable");
        let pre_schema = Schema::new(vec![first.clone(), Table::new("Other")]);

        let mut migration = SchemaMigration::new(0, None);
        migration.add_table_migration(TableMigration::new(Some(&first), None));

        let compiled = compile(&migration, &pre_schema);
        assert_eq!(compiled.sql_statements, vec!["DROP TABLE FirstTable;".to_string()]);
    }

    #[test]
    fn complex_migration_renames_to_final_name() {
        let mut first = Table::new("FirstTable");
        first.add_column(Column::new("NewCol", "INTEGER"));
        first.add_column(Column::new("SecondCol", "INTEGER"));
        let pre_schema = Schema::new(vec![first.clone()]);

        let mut tm = TableMigration::new(Some(&first), Some("FirstTable"));
        tm.add_column_migration(ColumnMigration::new(
            None,
            Some(&Column::new("ThirdColumn", "VARCHAR(255)").with_constraints(vec![
                "NOT NULL".into(),
                "DEFAULT 'TestValue'".into(),
            ])),
        ));
        let mut migration = SchemaMigration::new(0, None);
        migration.add_table_migration(tm);

        let compiled = compile(&migration, &pre_schema);
        assert_eq!(compiled.sql_statements.len(), 4);
        assert!(compiled.sql_statements[0].starts_with("CREATE TABLE NEW_CREATED_TABLE_FirstTable"));
        assert!(compiled.sql_statements[1].starts_with("INSERT INTO NEW_CREATED_TABLE_FirstTable"));
        assert!(compiled.sql_statements[1].contains("NewCol"));
        assert!(compiled.sql_statements[1].contains("SecondCol"));
        assert_eq!(compiled.sql_statements[2], "DROP TABLE FirstTable;");
        assert_eq!(
            compiled.sql_statements[3],
            "ALTER TABLE NEW_CREATED_TABLE_FirstTable RENAME TO FirstTable;"
        );
    }

    #[test]
    fn transferrable_columns_skip_added_and_removed() {
        let mut old_table = Table::new("T");
        old_table.add_column(Column::new("keep", "INTEGER"));
        old_table.add_column(Column::new("drop_me", "INTEGER"));
        old_table.add_column(Column::new("rename_me", "INTEGER"));

        let migrations = vec![
            ColumnMigration::new(None, Some(&Column::new("added", "TEXT"))),
            ColumnMigration::new(Some(&Column::new("drop_me", "INTEGER")), None),
            ColumnMigration::new(
                Some(&Column::new("rename_me", "INTEGER")),
                Some(&Column::new("renamed", "INTEGER")),
            ),
        ];

        let pairs = transferrable_columns(&old_table, &migrations);
        assert!(pairs.contains(&("keep".to_string(), "keep".to_string())));
        assert!(pairs.contains(&("rename_me".to_string(), "renamed".to_string())));
        assert!(!pairs.iter().any(|(o, _)| o == "drop_me"));
        assert!(!pairs.iter().any(|(_, n)| n == "added"));
    }

    #[test]
    fn sql_migration_document_uses_camelcase_keys() {
        let migration = SchemaMigration::new(3, Some("seed".to_string()));
        let compiled = compile(&migration, &Schema::new(vec![]));
        let doc = serde_json::to_value(&compiled).unwrap();
        assert_eq!(doc["migrationIndex"], 3);
        assert_eq!(doc["migrationName"], "seed");
        assert!(doc.get("sqlStatements").is_some());
    }
}
