//! Static table descriptors: columns, keys, indexes and foreign keys of every entity.

use serde_json::Value;

/// Column storage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Uuid,
    Bool,
    Int,
    BigInt,
    BigSerial,
    Float,
    Timestamp,
    Jsonb,
}

impl SqlType {
    /// Type used in CREATE TABLE.
    pub fn ddl(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Uuid => "UUID",
            SqlType::Bool => "BOOLEAN",
            SqlType::Int => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::BigSerial => "BIGSERIAL",
            SqlType::Float => "DOUBLE PRECISION",
            SqlType::Timestamp => "TIMESTAMPTZ",
            SqlType::Jsonb => "JSONB",
        }
    }

    /// Type used in parameter casts (`$1::cast`).
    pub fn cast(self) -> &'static str {
        match self {
            SqlType::Text => "text",
            SqlType::Uuid => "uuid",
            SqlType::Bool => "boolean",
            SqlType::Int => "int4",
            SqlType::BigInt | SqlType::BigSerial => "int8",
            SqlType::Float => "float8",
            SqlType::Timestamp => "timestamptz",
            SqlType::Jsonb => "jsonb",
        }
    }
}

/// Checks a value before it is written.
pub type ValueCheck = fn(&Value) -> Result<(), String>;

#[derive(Clone, Copy, Debug)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
    /// SQL expression used as the column default.
    pub default: Option<&'static str>,
    /// Set on create only; updates reject it.
    pub immutable: bool,
    pub check: Option<ValueCheck>,
    /// Stored as TEXT and encrypted when a data-encryption key is installed.
    pub sealed: bool,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Column {
            name,
            sql_type,
            nullable: false,
            default: None,
            immutable: false,
            check: None,
            sealed: false,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn default_expr(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    pub const fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub const fn check(mut self, f: ValueCheck) -> Self {
        self.check = Some(f);
        self
    }

    pub const fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    /// Whether the database fills the value when the insert omits it.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.sql_type == SqlType::BigSerial
    }

    /// Non-null without default: a create must supply it.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default()
    }

    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err("must not be null".into());
        }
        match self.check {
            Some(f) => f(value),
            None => Ok(()),
        }
    }

    // Identity-generated and creation-stamp columns are never rewritten.
    pub fn is_updatable(&self) -> bool {
        !self.immutable && self.sql_type != SqlType::BigSerial
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Index {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
    /// Partial index predicate, raw SQL over unqualified columns.
    pub where_clause: Option<&'static str>,
}

impl Index {
    pub const fn new(name: &'static str, columns: &'static [&'static str]) -> Self {
        Index {
            name,
            columns,
            unique: false,
            where_clause: None,
        }
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn partial(mut self, where_clause: &'static str) -> Self {
        self.where_clause = Some(where_clause);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    Restrict,
    SetNull,
    NoAction,
}

impl OnDelete {
    pub fn sql(self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
            OnDelete::NoAction => "NO ACTION",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ForeignKey {
    pub column: &'static str,
    pub ref_table: &'static str,
    pub ref_column: &'static str,
    pub on_delete: OnDelete,
}

impl ForeignKey {
    pub const fn new(
        column: &'static str,
        ref_table: &'static str,
        ref_column: &'static str,
        on_delete: OnDelete,
    ) -> Self {
        ForeignKey {
            column,
            ref_table,
            ref_column,
            on_delete,
        }
    }
}

#[derive(Debug)]
pub struct EntitySchema {
    /// Label used in errors, e.g. "project".
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [Column],
    pub primary_key: &'static [&'static str],
    pub indexes: &'static [Index],
    pub foreign_keys: &'static [ForeignKey],
}

impl EntitySchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn is_primary(&self, name: &str) -> bool {
        self.primary_key.contains(&name)
    }

    /// Cast name for a column; unknown columns are bound as text.
    pub fn cast_of(&self, name: &str) -> SqlType {
        self.column(name).map(|c| c.sql_type).unwrap_or(SqlType::Text)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

/// Every table, ordered so that referenced tables come first.
pub fn all() -> Vec<&'static EntitySchema> {
    use crate::model::*;
    vec![
        &role::SCHEMA,
        &project::SCHEMA,
        &subject::SCHEMA,
        &subject_role_relationship::SCHEMA,
        &token::SCHEMA,
        &environment::SCHEMA,
        &connector::SCHEMA,
        &environment_connector_relationship::SCHEMA,
        &catalog::SCHEMA,
        &module::SCHEMA,
        &module_version::SCHEMA,
        &resource_definition_matching_rule::SCHEMA,
        &application::SCHEMA,
        &application_module_relationship::SCHEMA,
        &application_instance::SCHEMA,
        &application_revision::SCHEMA,
        &application_resource::SCHEMA,
        &perspective::SCHEMA,
        &allocation_cost::SCHEMA,
        &cluster_cost::SCHEMA,
        &setting::SCHEMA,
    ]
}

/// Value checks shared by entity descriptors.
pub mod checks {
    use regex::Regex;
    use serde_json::Value;
    use std::sync::LazyLock;

    static DNS_LABEL: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").ok());

    pub fn not_empty(v: &Value) -> Result<(), String> {
        match v.as_str() {
            Some(s) if s.trim().is_empty() => Err("must not be empty".into()),
            _ => Ok(()),
        }
    }

    /// Lower-case RFC 1123 label, at most 63 characters.
    pub fn dns_label(v: &Value) -> Result<(), String> {
        let Some(s) = v.as_str() else {
            return Err("must be a string".into());
        };
        if s.len() > 63 {
            return Err("must be no more than 63 characters".into());
        }
        if !DNS_LABEL.as_ref().is_some_and(|re| re.is_match(s)) {
            return Err("must consist of lower case alphanumeric characters or '-', \
                        and must start and end with an alphanumeric character"
                .into());
        }
        Ok(())
    }

    pub fn non_negative(v: &Value) -> Result<(), String> {
        match v.as_f64() {
            Some(n) if n < 0.0 => Err("must not be negative".into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn schemas_are_ordered_by_dependency() {
        let mut seen = HashSet::new();
        for s in all() {
            for fk in s.foreign_keys {
                assert!(
                    fk.ref_table == s.table || seen.contains(fk.ref_table),
                    "{} references {} before it is declared",
                    s.table,
                    fk.ref_table
                );
            }
            seen.insert(s.table);
        }
    }

    #[test]
    fn every_key_and_index_column_exists() {
        for s in all() {
            for pk in s.primary_key {
                assert!(s.has_column(pk), "{}: primary key {}", s.table, pk);
            }
            for idx in s.indexes {
                for c in idx.columns {
                    assert!(s.has_column(c), "{}: index {} column {}", s.table, idx.name, c);
                }
            }
            for fk in s.foreign_keys {
                assert!(s.has_column(fk.column), "{}: fk column {}", s.table, fk.column);
            }
        }
    }

    #[test]
    fn dns_label_check() {
        assert!(checks::dns_label(&json!("my-app-1")).is_ok());
        assert!(checks::dns_label(&json!("My-App")).is_err());
        assert!(checks::dns_label(&json!("-app")).is_err());
        assert!(checks::dns_label(&json!("a".repeat(64))).is_err());
        assert!(checks::dns_label(&json!(1)).is_err());
    }

    #[test]
    fn required_columns_have_no_default() {
        let c = Column::new("name", SqlType::Text);
        assert!(c.is_required());
        assert!(!Column::new("labels", SqlType::Jsonb).default_expr("'{}'").is_required());
        assert!(!Column::new("id", SqlType::BigSerial).is_required());
        assert!(!Column::new("description", SqlType::Text).nullable().is_required());
    }

    #[test]
    fn null_is_rejected_for_non_nullable_columns() {
        let c = Column::new("name", SqlType::Text).check(checks::not_empty);
        assert!(c.validate(&Value::Null).is_err());
        assert!(c.validate(&json!(" ")).is_err());
        assert!(c.validate(&json!("x")).is_ok());
    }
}
