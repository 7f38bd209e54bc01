//! Migration records: immutable descriptions of an add/remove/edit per entity,
//! composing up into a [`SchemaMigration`].
//!
//! A migration is an **add** iff `old_key` is absent, a **remove** iff the new
//! value is absent, otherwise an **edit**. These three predicates are mutually
//! exclusive and total for every migration kind below.

use crate::schema::{Column, ForeignKey, Migratable, Table};
use serde::{Deserialize, Serialize};

/// A migration over [`Column`]s.
///
/// `old_snapshot` exists purely for human-readable diff output; it is never
/// serialized (see the `#[serde(skip)]`) and callers must not rely on it
/// surviving a round trip through the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMigration {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub old_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_data: Option<Column>,
    #[serde(skip)]
    pub old_snapshot: Option<Column>,
}

impl ColumnMigration {
    pub fn new(old: Option<&Column>, new: Option<&Column>) -> Self {
        Self {
            old_key: old.map(Migratable::key),
            new_data: new.map(Migratable::copy),
            old_snapshot: old.map(Migratable::copy),
        }
    }

    pub fn is_add(&self) -> bool {
        self.old_key.is_none()
    }

    pub fn is_remove(&self) -> bool {
        self.new_data.is_none()
    }

    pub fn is_edit(&self) -> bool {
        !self.is_add() && !self.is_remove()
    }

    /// Overwrites `subject`'s fields from `new_data`, matching
    /// `run_edit_on_old_object`: name, datatype, and a copy of the
    /// constraint list.
    pub fn run_edit_on_old_object(&self, subject: &mut Column) {
        if let Some(new_data) = &self.new_data {
            subject.name = new_data.name.clone();
            subject.datatype = new_data.datatype.clone();
            subject.constraints = new_data.constraints.clone();
        }
    }
}

/// A migration over [`ForeignKey`]s. Shape mirrors [`ColumnMigration`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FKeyMigration {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub old_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_data: Option<ForeignKey>,
    #[serde(skip)]
    pub old_snapshot: Option<ForeignKey>,
}

impl FKeyMigration {
    pub fn new(old: Option<&ForeignKey>, new: Option<&ForeignKey>) -> Self {
        Self {
            old_key: old.map(Migratable::key),
            new_data: new.map(Migratable::copy),
            old_snapshot: old.map(Migratable::copy),
        }
    }

    pub fn is_add(&self) -> bool {
        self.old_key.is_none()
    }

    pub fn is_remove(&self) -> bool {
        self.new_data.is_none()
    }

    pub fn is_edit(&self) -> bool {
        !self.is_add() && !self.is_remove()
    }

    pub fn run_edit_on_old_object(&self, subject: &mut ForeignKey) {
        if let Some(new_data) = &self.new_data {
            subject.local_name = new_data.local_name.clone();
            subject.table_name = new_data.table_name.clone();
            subject.foreign_name = new_data.foreign_name.clone();
            subject.on_update = new_data.on_update.clone();
            subject.on_delete = new_data.on_delete.clone();
        }
    }
}

/// A migration over [`Table`]s, with owned lists of child column/foreign-key
/// migrations. `new_name` is the table's name after the edit (or its name at
/// creation, for an add) — absent only for a remove.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMigration {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub old_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_name: Option<String>,
    #[serde(rename = "column_migrations", default)]
    pub column_migrations: Vec<ColumnMigration>,
    #[serde(rename = "foreign_key_migrations", default)]
    pub foreign_key_migrations: Vec<FKeyMigration>,
    #[serde(skip)]
    pub old_snapshot: Option<Table>,
}

impl TableMigration {
    pub fn new(old: Option<&Table>, new_name: Option<&str>) -> Self {
        Self {
            old_key: old.map(Migratable::key),
            new_name: new_name.map(str::to_string),
            column_migrations: Vec::new(),
            foreign_key_migrations: Vec::new(),
            old_snapshot: old.map(Migratable::copy),
        }
    }

    pub fn is_add(&self) -> bool {
        self.old_key.is_none()
    }

    pub fn is_remove(&self) -> bool {
        self.new_name.is_none()
    }

    pub fn is_edit(&self) -> bool {
        !self.is_add() && !self.is_remove()
    }

    pub fn add_column_migration(&mut self, migration: ColumnMigration) {
        self.column_migrations.push(migration);
    }

    pub fn add_fkey_migration(&mut self, migration: FKeyMigration) {
        self.foreign_key_migrations.push(migration);
    }

    /// Sets `subject.name` from `new_name`; renaming in place is a side
    /// effect of the assignment, not a separate step.
    pub fn run_edit_on_old_object(&self, subject: &mut Table) {
        if let Some(new_name) = &self.new_name {
            subject.name = new_name.clone();
        }
    }

    /// The apply-engine recursion into this table's children: snapshot
    /// column/foreign-key keys before any mutation, then apply each child
    /// migration against that frozen index.
    pub fn migrate_table(&self, table: &mut Table) {
        let old_column_keys: std::collections::HashSet<String> =
            table.columns.iter().map(Migratable::key).collect();

        for col_migration in &self.column_migrations {
            if col_migration.is_add() {
                if let Some(new_data) = &col_migration.new_data {
                    table.add_column(new_data.copy());
                }
            } else if col_migration.is_remove() {
                if let Some(old_key) = &col_migration.old_key {
                    if old_column_keys.contains(old_key) {
                        table.remove_column(old_key);
                    }
                }
            } else if let Some(old_key) = &col_migration.old_key {
                if old_column_keys.contains(old_key) {
                    if let Some(subject) = table.get_column_mut(old_key) {
                        col_migration.run_edit_on_old_object(subject);
                    }
                }
            }
        }

        let old_fkey_keys: std::collections::HashSet<String> =
            table.foreign_keys.iter().map(Migratable::key).collect();

        for fkey_migration in &self.foreign_key_migrations {
            if fkey_migration.is_add() {
                if let Some(new_data) = &fkey_migration.new_data {
                    table.add_foreign_key(new_data.copy());
                }
            } else if fkey_migration.is_remove() {
                if let Some(old_key) = &fkey_migration.old_key {
                    if old_fkey_keys.contains(old_key) {
                        table.remove_foreign_key(old_key);
                    }
                }
            } else if let Some(old_key) = &fkey_migration.old_key {
                if old_fkey_keys.contains(old_key) {
                    if let Some(subject) = table
                        .foreign_keys
                        .iter_mut()
                        .find(|f| &f.key() == old_key)
                    {
                        fkey_migration.run_edit_on_old_object(subject);
                    }
                }
            }
        }
    }
}

/// The top-level migration record: a numbered, optionally named list of
/// table migrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMigration {
    pub index: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub tables: Vec<TableMigration>,
}

impl SchemaMigration {
    pub fn new(index: u64, name: Option<String>) -> Self {
        Self {
            index,
            name,
            tables: Vec::new(),
        }
    }

    pub fn add_table_migration(&mut self, migration: TableMigration) {
        self.tables.push(migration);
    }
}
