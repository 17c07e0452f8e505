//! Relational schema, generated from the type registry.

use sqlx::SqlitePool;
use taleweaver_domain::{ScalarKind, TypeDescriptor, REGISTRY};

use crate::infrastructure::ports::RepoError;

const BASE_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS identifiers (
        prefix TEXT NOT NULL,
        numeric INTEGER NOT NULL,
        owner INTEGER NOT NULL,
        PRIMARY KEY (prefix, numeric, owner)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS id_counters (
        prefix TEXT NOT NULL,
        owner INTEGER NOT NULL,
        last_numeric INTEGER NOT NULL,
        PRIMARY KEY (prefix, owner)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS child_ownership (
        owner INTEGER NOT NULL,
        parent_prefix TEXT NOT NULL,
        parent_numeric INTEGER NOT NULL,
        field TEXT NOT NULL,
        position INTEGER NOT NULL,
        child_prefix TEXT NOT NULL,
        child_numeric INTEGER NOT NULL,
        PRIMARY KEY (owner, child_prefix, child_numeric)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_child_ownership_parent
        ON child_ownership (owner, parent_prefix, parent_numeric, field, position)
    "#,
];

fn column_type(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Text => "TEXT NOT NULL",
        ScalarKind::OptionalText => "TEXT",
        ScalarKind::Integer | ScalarKind::Bool => "INTEGER NOT NULL",
        ScalarKind::Real => "REAL NOT NULL",
        ScalarKind::TextList => "TEXT NOT NULL",
    }
}

/// DDL for one registered type: its row table, map tables and link tables.
pub fn type_statements(descriptor: &TypeDescriptor) -> Vec<String> {
    let mut statements = Vec::new();

    let mut columns = vec![
        "owner INTEGER NOT NULL".to_string(),
        "numeric INTEGER NOT NULL".to_string(),
    ];
    columns.extend(
        descriptor
            .scalars
            .iter()
            .map(|f| format!("{} {}", f.name, column_type(f.kind))),
    );
    columns.push("PRIMARY KEY (owner, numeric)".to_string());
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        descriptor.table,
        columns.join(", ")
    ));

    for field in descriptor.maps {
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (owner INTEGER NOT NULL, numeric INTEGER NOT NULL, \
             key TEXT NOT NULL, value TEXT NOT NULL, PRIMARY KEY (owner, numeric, key))",
            descriptor.map_table(field)
        ));
    }

    for field in descriptor.links {
        let table = descriptor.link_table(field);
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {table} (owner INTEGER NOT NULL, \
             source_numeric INTEGER NOT NULL, target_numeric INTEGER NOT NULL, \
             PRIMARY KEY (owner, source_numeric, target_numeric))"
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_target ON {table} (owner, target_numeric)"
        ));
    }

    statements
}

pub fn schema_statements() -> Vec<String> {
    BASE_TABLES
        .iter()
        .map(|s| s.to_string())
        .chain(REGISTRY.iter().flat_map(|d| type_statements(d)))
        .collect()
}

/// Create every table that does not exist yet. Safe to run on every open.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), RepoError> {
    for statement in schema_statements() {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|e| RepoError::transaction("ensure_schema", e))?;
    }
    Ok(())
}
