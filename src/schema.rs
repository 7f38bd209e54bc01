//! The shared data model: [`Schema`], [`Table`], [`Column`], and [`ForeignKey`].
//!
//! All four entity kinds implement [`Migratable`], which gives the diff and
//! apply engines a uniform way to compare and copy them without knowing which
//! concrete kind they're holding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shared capability implemented by every entity the diff/apply engines touch.
///
/// `compare_contents` ignores identity; `compare_equivalence` folds in `key()`
/// as well. `copy` is a deep copy — there is no shared ownership between the
/// original and the copy.
pub trait Migratable: Sized {
    fn key(&self) -> String;
    fn compare_contents(&self, other: &Self) -> bool;
    fn copy(&self) -> Self;

    fn compare_equivalence(&self, other: &Self) -> bool {
        self.compare_contents(other) && self.key() == other.key()
    }
}

/// Builds a `key -> &T` index, matching `IMigratable.create_object_dict`.
pub fn object_dict<T: Migratable>(objects: &[T]) -> std::collections::HashMap<String, &T> {
    objects.iter().map(|o| (o.key(), o)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datatype: datatype.into(),
            constraints: Vec::new(),
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }
}

impl Migratable for Column {
    fn key(&self) -> String {
        self.name.clone()
    }

    /// Order-sensitive by design: two columns with the same constraints in a
    /// different order are NOT equivalent (duplicates are already forbidden
    /// by validation).
    fn compare_contents(&self, other: &Self) -> bool {
        self.datatype == other.datatype && self.constraints == other.constraints
    }

    fn copy(&self) -> Self {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    #[serde(rename = "local_name")]
    pub local_name: String,
    #[serde(rename = "table_name")]
    pub table_name: String,
    #[serde(rename = "foreign_name")]
    pub foreign_name: String,
    #[serde(rename = "on_update", skip_serializing_if = "Option::is_none", default)]
    pub on_update: Option<String>,
    #[serde(rename = "on_delete", skip_serializing_if = "Option::is_none", default)]
    pub on_delete: Option<String>,
}

impl ForeignKey {
    pub fn new(
        local_name: impl Into<String>,
        table_name: impl Into<String>,
        foreign_name: impl Into<String>,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            table_name: table_name.into(),
            foreign_name: foreign_name.into(),
            on_update: None,
            on_delete: None,
        }
    }

    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.on_update = Some(action.into());
        self
    }

    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = Some(action.into());
        self
    }

    /// Resolves this key's three referents by name lookup against `schema`.
    /// Returns `None` if the local column, foreign table, or foreign column
    /// can't be found. Never cached — callers re-resolve after any mutation
    /// that could invalidate a name.
    pub fn resolve<'a>(
        &self,
        owning_table: &'a Table,
        schema: &'a Schema,
    ) -> Option<(&'a Column, &'a Table, &'a Column)> {
        let local_col = owning_table.get_column(&self.local_name)?;
        let foreign_table = schema.get_table(&self.table_name)?;
        let foreign_col = foreign_table.get_column(&self.foreign_name)?;
        Some((local_col, foreign_table, foreign_col))
    }
}

impl Migratable for ForeignKey {
    fn key(&self) -> String {
        format!("{}->{}.{}", self.local_name, self.table_name, self.foreign_name)
    }

    /// Only the actions are content; the identity fields are part of the key,
    /// not the content — two foreign keys with equal keys and equal actions
    /// are fully equivalent.
    fn compare_contents(&self, other: &Self) -> bool {
        self.on_update == other.on_update && self.on_delete == other.on_delete
    }

    fn copy(&self) -> Self {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(rename = "foreign_keys", default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
    }

    pub fn add_foreign_key(&mut self, fkey: ForeignKey) {
        self.foreign_keys.push(fkey);
    }

    pub fn remove_foreign_key(&mut self, key: &str) {
        self.foreign_keys.retain(|f| f.key() != key);
    }
}

/// Sorts by key and compares pairwise; used for both columns and foreign
/// keys when comparing table contents, since neither list's authoring order
/// is part of table identity.
fn compare_sorted_by_key<T: Migratable>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted: Vec<&T> = a.iter().collect();
    let mut b_sorted: Vec<&T> = b.iter().collect();
    a_sorted.sort_by_key(|x| x.key());
    b_sorted.sort_by_key(|x| x.key());
    a_sorted
        .iter()
        .zip(b_sorted.iter())
        .all(|(x, y)| x.compare_equivalence(y))
}

impl Migratable for Table {
    fn key(&self) -> String {
        self.name.clone()
    }

    /// Content comparison sorts columns and foreign keys by key and checks
    /// pairwise equivalence; table name (identity) is not part of content.
    fn compare_contents(&self, other: &Self) -> bool {
        compare_sorted_by_key(&self.columns, &other.columns)
            && compare_sorted_by_key(&self.foreign_keys, &other.foreign_keys)
    }

    fn copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            columns: self.columns.iter().map(Migratable::copy).collect(),
            foreign_keys: self.foreign_keys.iter().map(Migratable::copy).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn add_table(&mut self, table: Table) {
        self.tables.push(table);
    }

    /// Removes the table named `name`. Returns whether a table was actually
    /// removed, so callers can decide whether a missing subject is fatal.
    pub fn remove_table(&mut self, name: &str) -> bool {
        let before = self.tables.len();
        self.tables.retain(|t| t.name != name);
        self.tables.len() != before
    }

    pub fn copy(&self) -> Self {
        Self {
            tables: self.tables.iter().map(Migratable::copy).collect(),
        }
    }

    /// Equivalence of two whole schemas: same length, sorted by table name,
    /// pairwise equivalent.
    pub fn compare_equivalence(&self, other: &Self) -> bool {
        compare_sorted_by_key(&self.tables, &other.tables)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.datatype)?;
        for constraint in &self.constraints {
            write!(f, " {constraint}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FOREIGN KEY ({}) REFERENCES {}({})", self.local_name, self.table_name, self.foreign_name)?;
        if let Some(action) = &self.on_update {
            write!(f, " ON UPDATE {action}")?;
        }
        if let Some(action) = &self.on_delete {
            write!(f, " ON DELETE {action}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table: {}", self.name)?;
        for column in &self.columns {
            writeln!(f, "  {column}")?;
        }
        for fkey in &self.foreign_keys {
            writeln!(f, "  {fkey}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in &self.tables {
            writeln!(f, "{table}")?;
        }
        Ok(())
    }
}

/// The bookkeeping table implicitly appended to every schema before
/// validation. Never authored directly by a user schema document.
pub fn tracking_table() -> Table {
    Table {
        name: "MIGRATIONS_TRACKING_AUTOGEN".to_string(),
        columns: vec![
            Column::new("ID", "INTEGER")
                .with_constraints(vec!["PRIMARY KEY AUTOINCREMENT".to_string(), "DEFAULT 0".to_string()]),
            Column::new("Version", "VARCHAR(255)").with_constraints(vec!["NOT NULL".to_string()]),
            Column::new("Name", "VARCHAR(255)").with_constraints(vec!["NULL".to_string()]),
        ],
        foreign_keys: Vec::new(),
    }
}
