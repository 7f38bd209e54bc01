//! The apply engine: replays a [`SchemaMigration`] onto an in-memory [`Schema`].
//!
//! Keys are snapshotted before any mutation within a record, so migrations
//! within that record are order-independent as long as keys are unique in
//! the source schema.

use crate::migration::SchemaMigration;
use crate::schema::{Migratable, Schema, Table};
use crate::validate::{validate_schema, ValidationError};
use tracing::warn;

/// Replays `migration` onto `schema` in place and returns the validation
/// errors of the resulting schema.
pub fn apply(schema: &mut Schema, migration: &SchemaMigration) -> Vec<ValidationError> {
    let old_tables: std::collections::HashMap<String, Table> = schema
        .tables
        .iter()
        .map(|t| (t.key(), t.copy()))
        .collect();

    for table_migration in &migration.tables {
        if table_migration.is_add() {
            let name = table_migration
                .new_name
                .clone()
                .expect("add migration always carries new_name");
            schema.add_table(Table::new(name));
        } else if table_migration.is_remove() {
            let old_key = table_migration
                .old_key
                .as_ref()
                .expect("remove migration always carries old_key");
            if !schema.remove_table(old_key) {
                warn!("tried removing a nonexistent table: {old_key}");
            }
        } else if let Some(old_key) = &table_migration.old_key {
            if old_tables.contains_key(old_key) {
                if let Some(subject) = schema.get_table_mut(old_key) {
                    table_migration.run_edit_on_old_object(subject);
                }
            }
        }

        if !table_migration.is_remove() {
            if let Some(target_name) = &table_migration.new_name {
                if let Some(subject) = schema.get_table_mut(target_name) {
                    table_migration.migrate_table(subject);
                }
            }
        }
    }

    reresolve_foreign_keys(schema);
    validate_schema(schema)
}

/// Re-resolution here is a no-op over the data itself (foreign keys carry no
/// cached pointers, see [`crate::schema::ForeignKey::resolve`]) but walking
/// every table's foreign keys against the post-migration table set is how
/// the validator's `UNKNOWN_NAME_REFERENCED` check gets a fresh view.
fn reresolve_foreign_keys(schema: &Schema) {
    for table in &schema.tables {
        for fkey in &table.foreign_keys {
            let _ = fkey.resolve(table, schema);
        }
    }
}
