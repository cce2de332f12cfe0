//! DDL for the entity tables: schema, tables with keys and foreign keys, then indexes.
//! Tables are created in dependency order so foreign keys can be declared inline.

use crate::error::DaoError;
use crate::schema::{self, Column, EntitySchema, Index};
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;

fn column_def(c: &Column) -> String {
    let mut def = format!("{} {}", quoted(c.name), c.sql_type.ddl());
    if !c.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(d) = c.default {
        def.push_str(" DEFAULT ");
        def.push_str(d);
    }
    def
}

/// CREATE TABLE for one entity, with primary and foreign keys.
pub fn create_table(db_schema: &str, s: &EntitySchema) -> String {
    let mut defs: Vec<String> = s.columns.iter().map(column_def).collect();
    let pk: Vec<String> = s.primary_key.iter().map(|c| quoted(c)).collect();
    defs.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    for fk in s.foreign_keys {
        defs.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            quoted(&format!("{}_{}_fkey", s.table, fk.column)),
            quoted(fk.column),
            qualified_table(db_schema, fk.ref_table),
            quoted(fk.ref_column),
            fk.on_delete.sql()
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(db_schema, s.table),
        defs.join(",\n  ")
    )
}

fn create_index(db_schema: &str, s: &EntitySchema, idx: &Index) -> String {
    let cols: Vec<String> = idx.columns.iter().map(|c| quoted(c)).collect();
    let unique = if idx.unique { "UNIQUE " } else { "" };
    let where_clause = idx.where_clause.map(|w| format!(" WHERE {w}")).unwrap_or_default();
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({}){}",
        unique,
        quoted(idx.name),
        qualified_table(db_schema, s.table),
        cols.join(", "),
        where_clause
    )
}

/// Every statement needed to create the model in `db_schema`, in execution order.
pub fn statements(db_schema: &str) -> Vec<String> {
    let tables = schema::all();
    let mut out = vec![format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(db_schema))];
    out.extend(tables.iter().map(|s| create_table(db_schema, s)));
    for s in &tables {
        out.extend(s.indexes.iter().map(|idx| create_index(db_schema, s, idx)));
    }
    out
}

/// Creates missing tables and indexes. Idempotent; runs in one transaction.
pub async fn apply_migrations(pool: &PgPool, db_schema: &str) -> Result<(), DaoError> {
    let stmts = statements(db_schema);
    let mut tx = pool.begin().await?;
    for stmt in &stmts {
        tracing::debug!(sql = %stmt, "migrate");
        sqlx::query(stmt).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!(schema = db_schema, statements = stmts.len(), "schema migrated");
    Ok(())
}
