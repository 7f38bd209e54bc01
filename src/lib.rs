//! A schema-migration authoring tool for the SQLite dialect.
//!
//! Three tightly coupled subsystems do the real work: the [`diff`] engine
//! turns two schema snapshots into a migration plan (with interactive rename
//! disambiguation via a [`diff::Oracle`]); the [`apply`] engine replays a
//! migration record onto an in-memory [`schema::Schema`]; and the [`sql`]
//! compiler lowers a migration record into the ordered SQL statements that
//! evolve a live database, including the shadow-table dance for non-trivial
//! table changes.

pub mod apply;
pub mod diff;
pub mod error;
pub mod migration;
pub mod oracle;
pub mod persistence;
pub mod schema;
pub mod sql;
pub mod validate;

pub mod prelude {
    pub use crate::apply::apply;
    pub use crate::diff::{diff_schema, Oracle, ScriptedOracle};
    pub use crate::error::{MigrateError, Result};
    pub use crate::migration::{ColumnMigration, FKeyMigration, SchemaMigration, TableMigration};
    pub use crate::oracle::TerminalOracle;
    pub use crate::schema::{tracking_table, Column, ForeignKey, Migratable, Schema, Table};
    pub use crate::sql::{compile, SqlMigration};
    pub use crate::validate::{validate_schema, ErrorKind, ValidationError};
}
