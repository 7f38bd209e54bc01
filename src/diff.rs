//! The diff engine: compares two schema snapshots and emits a [`SchemaMigration`],
//! consulting an [`Oracle`] to disambiguate renames from adds/removes.
//!
//! The core algorithm (`diff_entities`) is written once, generically over any
//! [`Migratable`] entity kind, and reused for tables, columns, and foreign
//! keys, through a single polymorphic diff routine shared by all three kinds.

use crate::schema::{object_dict, Column, ForeignKey, Migratable, Schema};
use std::collections::HashSet;

/// The capability the diff engine consults to resolve ambiguity. A real
/// implementation backs the CLI; a scripted implementation drives tests.
pub trait Oracle {
    fn ask_yes_no(&self, prompt: &str) -> bool;
    fn ask_text(&self, prompt: &str) -> String;
}

#[derive(Debug, Clone)]
enum Change<T> {
    Add(T),
    Remove(T),
    Edit(T, T),
}

/// Repeats `ask_text` until the answer names a real old key. There is no
/// escape hatch: a blank or unrecognized answer just asks again.
fn prompt_for_old_key<T: Migratable + Clone>(
    oracle: &dyn Oracle,
    old_entities: &[T],
    kind_label: &str,
) -> T {
    loop {
        let answer = oracle.ask_text(&format!("Which existing {kind_label} is this?"));
        if let Some(found) = old_entities.iter().find(|o| o.key() == answer) {
            return found.clone();
        }
    }
}

/// The generic change-set + removal-set diff algorithm, shared by tables,
/// columns, and foreign keys.
///
/// `allow_rename_prompts` disables every rename-confirmation path when
/// false — used for foreign keys, which are identified structurally rather
/// than by a standalone name.
fn diff_entities<T: Migratable + Clone>(
    old_entities: &[T],
    new_entities: &[T],
    oracle: &dyn Oracle,
    kind_label: &str,
    allow_rename_prompts: bool,
) -> Vec<Change<T>> {
    let old_by_key = object_dict(old_entities);
    let mut changes = Vec::new();
    let mut consumed_old_keys: HashSet<String> = HashSet::new();

    for new in new_entities {
        if old_entities.is_empty() {
            changes.push(Change::Add(new.clone()));
            continue;
        }

        if let Some(old) = old_by_key.get(&new.key()) {
            if new.compare_equivalence(old) {
                continue;
            }

            if oracle.ask_yes_no(&format!("Is {} '{}' ALTERING '{}'?", kind_label, new.key(), old.key())) {
                changes.push(Change::Edit((*old).clone(), new.clone()));
                consumed_old_keys.insert(old.key());
            } else if allow_rename_prompts
                && old_entities.len() > 1
                && oracle.ask_yes_no(&format!("Is {} '{}' RENAMING another {}?", kind_label, new.key(), kind_label))
            {
                let chosen = prompt_for_old_key(oracle, old_entities, kind_label);
                consumed_old_keys.insert(chosen.key());
                changes.push(Change::Edit(chosen, new.clone()));
            } else {
                changes.push(Change::Add(new.clone()));
            }
            continue;
        }

        // Key not found among old entities.
        let content_match = if allow_rename_prompts {
            old_entities.iter().find(|old| new.compare_contents(old))
        } else {
            None
        };

        let mut emitted = false;
        if let Some(old) = content_match {
            if oracle.ask_yes_no(&format!("Is {} '{}' RENAMING '{}'?", kind_label, new.key(), old.key())) {
                consumed_old_keys.insert(old.key());
                changes.push(Change::Edit(old.clone(), new.clone()));
                emitted = true;
            }
        }

        if !emitted {
            if allow_rename_prompts
                && !old_entities.is_empty()
                && oracle.ask_yes_no(&format!("Is {} '{}' RENAMING one?", kind_label, new.key()))
            {
                let chosen = prompt_for_old_key(oracle, old_entities, kind_label);
                consumed_old_keys.insert(chosen.key());
                changes.push(Change::Edit(chosen, new.clone()));
            } else {
                changes.push(Change::Add(new.clone()));
            }
        }
    }

    let new_keys: HashSet<String> = new_entities.iter().map(Migratable::key).collect();
    for old in old_entities {
        let key = old.key();
        if !new_keys.contains(&key) && !consumed_old_keys.contains(&key) {
            changes.push(Change::Remove(old.clone()));
        }
    }

    changes
}

fn diff_columns(old: &[Column], new: &[Column], oracle: &dyn Oracle) -> Vec<crate::migration::ColumnMigration> {
    diff_entities(old, new, oracle, "Column", true)
        .into_iter()
        .map(|change| match change {
            Change::Add(n) => crate::migration::ColumnMigration::new(None, Some(&n)),
            Change::Remove(o) => crate::migration::ColumnMigration::new(Some(&o), None),
            Change::Edit(o, n) => crate::migration::ColumnMigration::new(Some(&o), Some(&n)),
        })
        .collect()
}

fn diff_foreign_keys(
    old: &[ForeignKey],
    new: &[ForeignKey],
    oracle: &dyn Oracle,
) -> Vec<crate::migration::FKeyMigration> {
    diff_entities(old, new, oracle, "ForeignKey", false)
        .into_iter()
        .map(|change| match change {
            Change::Add(n) => crate::migration::FKeyMigration::new(None, Some(&n)),
            Change::Remove(o) => crate::migration::FKeyMigration::new(Some(&o), None),
            Change::Edit(o, n) => crate::migration::FKeyMigration::new(Some(&o), Some(&n)),
        })
        .collect()
}

/// Diffs two schemas into a [`SchemaMigration`] (with `index`/`name` left for
/// the caller to assign once persisted). Recurses into column and
/// foreign-key diffing for every table-level add/edit, after emitting the
/// table's own outer migration record.
pub fn diff_schema(old: &Schema, new: &Schema, oracle: &dyn Oracle) -> crate::migration::SchemaMigration {
    let mut migration = crate::migration::SchemaMigration::new(0, None);

    for change in diff_entities(&old.tables, &new.tables, oracle, "Table", true) {
        let mut table_migration = match &change {
            Change::Add(new_table) => crate::migration::TableMigration::new(None, Some(&new_table.name)),
            Change::Remove(old_table) => crate::migration::TableMigration::new(Some(old_table), None),
            Change::Edit(old_table, new_table) => {
                crate::migration::TableMigration::new(Some(old_table), Some(&new_table.name))
            }
        };

        if let Change::Remove(_) = change {
            migration.add_table_migration(table_migration);
            continue;
        }

        let empty: Vec<Column> = Vec::new();
        let empty_fk: Vec<ForeignKey> = Vec::new();
        let (old_columns, new_columns, old_fkeys, new_fkeys): (&[Column], &[Column], &[ForeignKey], &[ForeignKey]) =
            match &change {
                Change::Add(new_table) => (&empty, &new_table.columns, &empty_fk, &new_table.foreign_keys),
                Change::Edit(old_table, new_table) => (
                    &old_table.columns,
                    &new_table.columns,
                    &old_table.foreign_keys,
                    &new_table.foreign_keys,
                ),
                Change::Remove(_) => unreachable!("handled above"),
            };

        for col_migration in diff_columns(old_columns, new_columns, oracle) {
            table_migration.add_column_migration(col_migration);
        }
        for fkey_migration in diff_foreign_keys(old_fkeys, new_fkeys, oracle) {
            table_migration.add_fkey_migration(fkey_migration);
        }

        migration.add_table_migration(table_migration);
    }

    migration
}

/// A scripted oracle for tests: returns queued yes/no and text answers in
/// order, panicking (with a clear message) if it runs out — a test that
/// exhausts its script has a scenario mismatch.
#[derive(Default)]
pub struct ScriptedOracle {
    yes_no: std::cell::RefCell<std::collections::VecDeque<bool>>,
    text: std::cell::RefCell<std::collections::VecDeque<String>>,
}

impl ScriptedOracle {
    pub fn new(yes_no: Vec<bool>, text: Vec<String>) -> Self {
        Self {
            yes_no: std::cell::RefCell::new(yes_no.into()),
            text: std::cell::RefCell::new(text.into()),
        }
    }

    /// An oracle that always declines rename suggestions and would panic on
    /// `ask_text` — convenient for scenarios with no ambiguity at all.
    pub fn never_rename() -> Self {
        Self::new(vec![false; 64], Vec::new())
    }
}

impl Oracle for ScriptedOracle {
    fn ask_yes_no(&self, _prompt: &str) -> bool {
        self.yes_no
            .borrow_mut()
            .pop_front()
            .expect("scripted oracle ran out of yes/no answers")
    }

    fn ask_text(&self, _prompt: &str) -> String {
        self.text
            .borrow_mut()
            .pop_front()
            .expect("scripted oracle ran out of text answers")
    }
}
