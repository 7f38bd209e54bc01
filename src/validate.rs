//! Structural validation: turns a [`Schema`] into a list of [`ValidationError`]s.
//!
//! Nothing here raises on the first problem — every rule runs and the caller
//! gets the full list, so a schema author sees everything wrong at once.

use crate::schema::{Column, ForeignKey, Migratable, Schema, Table};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingRequiredValue,
    Duplicate,
    UnknownNameReferenced,
    InvalidValue,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingRequiredValue => "MISSING REQUIRED VALUE",
            Self::Duplicate => "DUPLICATE",
            Self::UnknownNameReferenced => "UNKNOWN REFERENCE",
            Self::InvalidValue => "INVALID VALUE",
        };
        write!(f, "{text}")
    }
}

/// A single structural problem. `context` is a multi-line rendering of the
/// offending table with a caret under the offending row; it's attached but
/// suppressed from display until [`ValidationError::toggle_context`] is called.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub message: String,
    context: String,
    context_enabled: bool,
}

impl ValidationError {
    fn new(kind: ErrorKind, message: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: context.into(),
            context_enabled: false,
        }
    }

    pub fn toggle_context(&mut self) {
        self.context_enabled = !self.context_enabled;
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if self.context_enabled {
            write!(f, "\n{}", self.context)?;
        }
        Ok(())
    }
}

/// Renders a table with a caret line inserted after the offending row.
/// `column`/`foreign_key` select which row gets the caret; if both are
/// `None`, the caret goes under the table's own header line.
fn render_table_context(table: &Table, column: Option<&str>, foreign_key: Option<&str>) -> String {
    let mut lines = vec![format!("Table: {}", table.name)];
    if column.is_none() && foreign_key.is_none() {
        lines.push("^".repeat(lines[0].len()));
    }
    for col in &table.columns {
        let text = format!("  Column: {} {}", col.name, col.datatype);
        let is_target = column == Some(col.name.as_str());
        lines.push(text.clone());
        if is_target {
            lines.push(format!("  {}", "^".repeat(text.trim_start().len())));
        }
    }
    for fk in &table.foreign_keys {
        let key = format!("{}->{}.{}", fk.local_name, fk.table_name, fk.foreign_name);
        let text = format!("  ForeignKey: {key}");
        let is_target = foreign_key == Some(key.as_str());
        lines.push(text.clone());
        if is_target {
            lines.push(format!("  {}", "^".repeat(text.trim_start().len())));
        }
    }
    lines.join("\n")
}

static DATATYPE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r".*INT", "INTEGER"),
        (r"CHARACTER(\(\d+\))?", "TEXT"),
        (r"VARCHAR(\(\d+\))?", "TEXT"),
        (r"VARYING", "TEXT"),
        (r"NCHAR(\(\d+\))?", "TEXT"),
        (r"NATIVE CHARACTER(\(\d+\))?", "TEXT"),
        (r"NVARCHAR(\(\d+\))?", "TEXT"),
        (r"TEXT", "TEXT"),
        (r"CLOB", "TEXT"),
        (r"BLOB", "BLOB"),
        (r"REAL", "REAL"),
        (r"DOUBLE", "REAL"),
        (r"DOUBLE PRECISION", "REAL"),
        (r"FLOAT", "REAL"),
        (r"NUMERIC", "NUMERIC"),
        (r"DECIMAL(\(\d+,\d+\))?", "NUMERIC"),
        (r"BOOLEAN", "NUMERIC"),
        (r"DATE", "NUMERIC"),
        (r"DATETIME", "NUMERIC"),
    ]
    .into_iter()
    .map(|(pattern, bucket)| (Regex::new(pattern).expect("static datatype pattern"), bucket))
    .collect()
});

static CONSTRAINT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"PRIMARY KEY(\s+.*)?",
        r"(?:NOT)?\s*NULL",
        r"DEFAULT\s+.*",
        r"UNIQUE",
        r"CHECK\s+.*",
        r"COLLATE(\s+.*)?",
        r"GENERATED ALWAYS AS\s+.*",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("static constraint pattern"))
    .collect()
});

static FKEY_ACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"SET\s+(NULL|DEFAULT)", r"CASCADE", r"RESTRICT", r"NO\s+ACTION"]
        .into_iter()
        .map(|pattern| Regex::new(pattern).expect("static fkey action pattern"))
        .collect()
});

/// Case-insensitive, anchored at the start of the string but not required
/// to consume all of it.
fn matches_any(patterns: &[Regex], input: &str) -> bool {
    let upper = input.to_uppercase();
    patterns.iter().any(|re| {
        re.find(&upper)
            .is_some_and(|found| found.start() == 0)
    })
}

pub fn datatype_is_valid(datatype: &str) -> bool {
    let upper = datatype.to_uppercase();
    DATATYPE_PATTERNS
        .iter()
        .any(|(re, _)| re.find(&upper).is_some_and(|found| found.start() == 0))
}

pub fn constraint_is_valid(constraint: &str) -> bool {
    matches_any(&CONSTRAINT_PATTERNS, constraint)
}

pub fn fkey_action_is_valid(action: &str) -> bool {
    matches_any(&FKEY_ACTION_PATTERNS, action)
}

fn validate_column(table: &Table, column: &Column) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let ctx = || render_table_context(table, Some(&column.name), None);

    if column.name.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::MissingRequiredValue,
            format!("Column in table '{}' has no name.", table.name),
            ctx(),
        ));
    }
    if column.datatype.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::MissingRequiredValue,
            format!("Column '{}' has no datatype.", column.name),
            ctx(),
        ));
    } else if !datatype_is_valid(&column.datatype) {
        errors.push(ValidationError::new(
            ErrorKind::InvalidValue,
            format!("Column '{}' has an unrecognized datatype '{}'.", column.name, column.datatype),
            ctx(),
        ));
    }

    for constraint in &column.constraints {
        if !constraint_is_valid(constraint) {
            errors.push(ValidationError::new(
                ErrorKind::InvalidValue,
                format!("Column '{}' has an unrecognized constraint '{constraint}'.", column.name),
                ctx(),
            ));
        }
        if column.constraints.iter().filter(|c| *c == constraint).count() > 1 {
            errors.push(ValidationError::new(
                ErrorKind::Duplicate,
                format!("Column '{}' has a duplicated constraint '{constraint}'.", column.name),
                ctx(),
            ));
        }
    }

    errors
}

fn validate_foreign_key(table: &Table, fkey: &ForeignKey, schema: &Schema) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let key = fkey.key();
    let ctx = || render_table_context(table, None, Some(&key));

    if fkey.local_name.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::MissingRequiredValue,
            format!("Foreign key in table '{}' has no local column name.", table.name),
            ctx(),
        ));
    }
    if fkey.table_name.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::MissingRequiredValue,
            format!("Foreign key '{key}' has no foreign table name."),
            ctx(),
        ));
    }
    if fkey.foreign_name.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::MissingRequiredValue,
            format!("Foreign key '{key}' has no foreign column name."),
            ctx(),
        ));
    }

    if let Some(action) = &fkey.on_update {
        if !fkey_action_is_valid(action) {
            errors.push(ValidationError::new(
                ErrorKind::InvalidValue,
                format!("Foreign key '{key}' has an unrecognized on_update action '{action}'."),
                ctx(),
            ));
        }
    }
    if let Some(action) = &fkey.on_delete {
        if !fkey_action_is_valid(action) {
            errors.push(ValidationError::new(
                ErrorKind::InvalidValue,
                format!("Foreign key '{key}' has an unrecognized on_delete action '{action}'."),
                ctx(),
            ));
        }
    }

    if fkey.resolve(table, schema).is_none() {
        errors.push(ValidationError::new(
            ErrorKind::UnknownNameReferenced,
            format!("Foreign key '{key}' does not resolve to an existing table/column."),
            ctx(),
        ));
    }

    errors
}

fn validate_table(table: &Table, schema: &Schema) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let header_ctx = || render_table_context(table, None, None);

    if table.name.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::MissingRequiredValue,
            "A table has no name.".to_string(),
            header_ctx(),
        ));
    }
    if table.columns.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::MissingRequiredValue,
            format!("Table '{}' has no columns.", table.name),
            header_ctx(),
        ));
    }

    let mut seen_columns = std::collections::HashSet::new();
    for column in &table.columns {
        if !seen_columns.insert(column.name.clone()) {
            errors.push(ValidationError::new(
                ErrorKind::Duplicate,
                format!("Table '{}' has a duplicated column name '{}'.", table.name, column.name),
                header_ctx(),
            ));
        }
        errors.extend(validate_column(table, column));
    }

    let mut seen_fkeys = std::collections::HashSet::new();
    for fkey in &table.foreign_keys {
        if !seen_fkeys.insert(fkey.key()) {
            errors.push(ValidationError::new(
                ErrorKind::Duplicate,
                format!("Table '{}' has a duplicated foreign key '{}'.", table.name, fkey.key()),
                header_ctx(),
            ));
        }
        errors.extend(validate_foreign_key(table, fkey, schema));
    }

    errors
}

/// Runs every rule and returns the concatenation of all errors found.
pub fn validate_schema(schema: &Schema) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if schema.tables.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::MissingRequiredValue,
            "Schema has no tables.".to_string(),
            String::new(),
        ));
    }

    let mut seen_tables = std::collections::HashSet::new();
    for table in &schema.tables {
        if !seen_tables.insert(table.name.clone()) {
            errors.push(ValidationError::new(
                ErrorKind::Duplicate,
                format!("Schema has a duplicated table name '{}'.", table.name),
                String::new(),
            ));
        }
        errors.extend(validate_table(table, schema));
    }

    errors
}
