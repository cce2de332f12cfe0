//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from entity descriptors.
//!
//! Identifiers come from static descriptors only and are always quoted; values are
//! always parameters. The main table is aliased `t0`.

use crate::predicate::{render_where, Expr, Scope};
use crate::schema::{EntitySchema, SqlType};
use crate::sql::params::PgBindValue;
use serde_json::{Map, Value};

pub(crate) const MAIN_ALIAS: &str = "t0";

/// PostgreSQL limit on bind parameters per statement.
pub const MAX_PARAMS: usize = 65535;

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
    aliases: usize,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf::default()
    }

    /// Binds `v` for a column of type `ty` and returns its placeholder, e.g. `$3::uuid`.
    pub fn push_param(&mut self, v: &Value, ty: SqlType) -> String {
        self.params.push(PgBindValue::for_column(v, ty));
        format!("${}::{}", self.params.len(), ty.cast())
    }

    /// Fresh alias for a subquery table: t1, t2, ...
    pub(crate) fn next_alias(&mut self) -> String {
        self.aliases += 1;
        format!("t{}", self.aliases)
    }
}

fn column_list(entity: &EntitySchema, alias: &str) -> String {
    entity
        .columns
        .iter()
        .map(|c| format!("{}.{}", alias, quoted(c.name)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read side of a query: table, predicates, ordering and paging.
pub(crate) struct Select<'a> {
    pub db_schema: &'a str,
    pub entity: &'static EntitySchema,
    pub preds: &'a [Expr],
    /// (column, descending)
    pub order: &'a [(&'static str, bool)],
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
    pub for_update: bool,
}

impl Select<'_> {
    fn scope(&self) -> Scope<'_> {
        Scope {
            db_schema: self.db_schema,
            entity: self.entity,
            alias: Some(MAIN_ALIAS),
        }
    }

    fn from(&self) -> String {
        format!(
            "{} AS {}",
            qualified_table(self.db_schema, self.entity.table),
            MAIN_ALIAS
        )
    }

    fn tail(&self) -> String {
        let mut sql = String::new();
        let mut order: Vec<String> = self
            .order
            .iter()
            .map(|(c, desc)| {
                format!("{}.{}{}", MAIN_ALIAS, quoted(c), if *desc { " DESC" } else { "" })
            })
            .collect();
        // Paging without an order is made stable on the primary key.
        if order.is_empty() && (self.limit.is_some() || self.offset.is_some()) {
            order = self
                .entity
                .primary_key
                .iter()
                .map(|c| format!("{}.{}", MAIN_ALIAS, quoted(c)))
                .collect();
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = self.offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }
        if self.for_update {
            sql.push_str(" FOR UPDATE");
        }
        sql
    }
}

/// SELECT of the given columns (all entity columns when `None`).
pub(crate) fn select(s: &Select<'_>, columns: Option<&[&str]>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = match columns {
        Some(cs) => cs
            .iter()
            .map(|c| format!("{}.{}", MAIN_ALIAS, quoted(c)))
            .collect::<Vec<_>>()
            .join(", "),
        None => column_list(s.entity, MAIN_ALIAS),
    };
    let where_clause = render_where(s.preds, &s.scope(), &mut q);
    q.sql = format!(
        "SELECT {}{} FROM {}{}{}",
        if s.distinct { "DISTINCT " } else { "" },
        cols,
        s.from(),
        where_clause,
        s.tail()
    );
    q
}

/// COUNT(*) of the selection. DISTINCT and paging are honoured through a subquery.
pub(crate) fn count(s: &Select<'_>) -> QueryBuf {
    if s.distinct || s.limit.is_some() || s.offset.is_some() {
        let inner = Select { for_update: false, ..*s };
        let mut q = select(&inner, None);
        q.sql = format!("SELECT COUNT(*) FROM ({}) AS sub", q.sql);
        return q;
    }
    let mut q = QueryBuf::new();
    let where_clause = render_where(s.preds, &s.scope(), &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", s.from(), where_clause);
    q
}

pub(crate) fn exists(s: &Select<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = render_where(s.preds, &s.scope(), &mut q);
    q.sql = format!("SELECT EXISTS (SELECT 1 FROM {}{})", s.from(), where_clause);
    q
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggFn {
    Count,
    Sum,
    Mean,
    Min,
    Max,
}

impl AggFn {
    fn sql(self) -> &'static str {
        match self {
            AggFn::Count => "COUNT",
            AggFn::Sum => "SUM",
            AggFn::Mean => "AVG",
            AggFn::Min => "MIN",
            AggFn::Max => "MAX",
        }
    }

    fn default_alias(self) -> &'static str {
        match self {
            AggFn::Count => "count",
            AggFn::Sum => "sum",
            AggFn::Mean => "mean",
            AggFn::Min => "min",
            AggFn::Max => "max",
        }
    }
}

/// An aggregate over a column (or over rows, for COUNT without column).
#[derive(Clone, Debug)]
pub struct Aggregate {
    pub func: AggFn,
    pub column: Option<String>,
    pub alias: String,
}

impl Aggregate {
    pub fn count() -> Self {
        Aggregate {
            func: AggFn::Count,
            column: None,
            alias: AggFn::Count.default_alias().to_string(),
        }
    }

    fn of(func: AggFn, column: &str) -> Self {
        Aggregate {
            func,
            column: Some(column.to_string()),
            alias: func.default_alias().to_string(),
        }
    }

    pub fn sum(column: &str) -> Self {
        Self::of(AggFn::Sum, column)
    }

    pub fn mean(column: &str) -> Self {
        Self::of(AggFn::Mean, column)
    }

    pub fn min(column: &str) -> Self {
        Self::of(AggFn::Min, column)
    }

    pub fn max(column: &str) -> Self {
        Self::of(AggFn::Max, column)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

/// SELECT group columns and aggregates, grouped by `group_by`.
/// Columns must have been checked against the entity already.
pub(crate) fn aggregate(s: &Select<'_>, group_by: &[&str], aggs: &[Aggregate]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let groups: Vec<String> = group_by
        .iter()
        .map(|c| format!("{}.{}", MAIN_ALIAS, quoted(c)))
        .collect();
    let mut cols = groups.clone();
    for a in aggs {
        let arg = match &a.column {
            Some(c) => format!("{}.{}", MAIN_ALIAS, quoted(c)),
            None => "*".to_string(),
        };
        // SUM and AVG of integers yield NUMERIC, which is read back as float8.
        let cast = if matches!(a.func, AggFn::Sum | AggFn::Mean) { "::float8" } else { "" };
        cols.push(format!("{}({}){} AS {}", a.func.sql(), arg, cast, quoted(&a.alias)));
    }
    let where_clause = render_where(s.preds, &s.scope(), &mut q);
    let group_clause = if groups.is_empty() {
        String::new()
    } else {
        format!(" GROUP BY {}", groups.join(", "))
    };
    // Ordering and paging of aggregates only make sense on the group columns.
    let mut paging = String::new();
    if s.limit.is_some() || s.offset.is_some() {
        if !groups.is_empty() {
            paging.push_str(&format!(" ORDER BY {}", groups.join(", ")));
        }
        if let Some(n) = s.limit {
            paging.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = s.offset {
            paging.push_str(&format!(" OFFSET {}", n));
        }
    }
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        cols.join(", "),
        s.from(),
        where_clause,
        group_clause,
        paging
    );
    q
}

/// What to do when an insert hits a unique conflict.
#[derive(Clone, Debug)]
pub enum ConflictAction {
    DoNothing,
    /// Overwrite every inserted column except the conflict target and immutable columns.
    UpdateNewValues,
    /// Overwrite only these columns with the proposed values.
    UpdateColumns(Vec<&'static str>),
    /// Keep the stored row but still return it.
    Ignore,
}

#[derive(Clone, Debug)]
pub struct OnConflict {
    pub columns: Vec<&'static str>,
    /// Inference predicate for partial unique indexes, rendered over unqualified columns.
    pub(crate) where_clause: Option<Expr>,
    pub action: ConflictAction,
}

impl OnConflict {
    fn render(
        &self,
        entity: &'static EntitySchema,
        db_schema: &str,
        inserted: &[&'static str],
        q: &mut QueryBuf,
    ) -> String {
        let mut sql = String::from(" ON CONFLICT");
        if !self.columns.is_empty() {
            let cols: Vec<String> = self.columns.iter().map(|c| quoted(c)).collect();
            sql.push_str(&format!(" ({})", cols.join(", ")));
        }
        if let Some(w) = &self.where_clause {
            let scope = Scope {
                db_schema,
                entity,
                alias: None,
            };
            sql.push_str(&format!(" WHERE {}", w.render(&scope, q)));
        }
        let mut sets = match &self.action {
            ConflictAction::DoNothing => {
                sql.push_str(" DO NOTHING");
                return sql;
            }
            ConflictAction::Ignore => {
                let target = if self.columns.is_empty() {
                    entity.primary_key
                } else {
                    &self.columns[..]
                };
                target
                    .iter()
                    .map(|c| format!("{} = {}.{}", quoted(c), MAIN_ALIAS, quoted(c)))
                    .collect()
            }
            ConflictAction::UpdateNewValues => set_excluded(inserted.iter().copied().filter(|c| {
                !self.columns.contains(c)
                    && !entity.is_primary(c)
                    && *c != "update_time"
                    && entity.column(c).map(|col| col.is_updatable()).unwrap_or(false)
            })),
            ConflictAction::UpdateColumns(cols) => {
                set_excluded(cols.iter().copied().filter(|c| *c != "update_time"))
            }
        };
        if !matches!(self.action, ConflictAction::Ignore) && entity.has_column("update_time") {
            sets.push(format!("{} = NOW()", quoted("update_time")));
        }
        if sets.is_empty() {
            sql.push_str(" DO NOTHING");
        } else {
            sql.push_str(&format!(" DO UPDATE SET {}", sets.join(", ")));
        }
        sql
    }
}

fn set_excluded(cols: impl Iterator<Item = &'static str>) -> Vec<String> {
    cols.map(|c| format!("{} = EXCLUDED.{}", quoted(c), quoted(c)))
        .collect()
}

/// Columns written by an insert: identity columns are left to the database.
pub(crate) fn insert_columns(entity: &EntitySchema) -> Vec<&'static str> {
    entity
        .columns
        .iter()
        .filter(|c| c.sql_type != SqlType::BigSerial)
        .map(|c| c.name)
        .collect()
}

/// Rows per INSERT so the statement stays under the parameter limit.
pub(crate) fn rows_per_insert(entity: &EntitySchema) -> usize {
    let cols = insert_columns(entity).len().max(1);
    (MAX_PARAMS / cols).max(1)
}

/// Multi-row INSERT. Absent or null values of defaulted columns render `DEFAULT`.
pub(crate) fn insert(
    db_schema: &str,
    entity: &'static EntitySchema,
    rows: &[Map<String, Value>],
    conflict: Option<&OnConflict>,
    returning: bool,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = insert_columns(entity);
    let mut inserted: Vec<&'static str> = Vec::new();
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut phs = Vec::with_capacity(cols.len());
        for &name in &cols {
            let Some(c) = entity.column(name) else { continue };
            let v = row.get(name).unwrap_or(&Value::Null);
            if v.is_null() && c.has_default() {
                phs.push("DEFAULT".to_string());
                continue;
            }
            if !inserted.contains(&name) {
                inserted.push(name);
            }
            if v.is_null() {
                phs.push(format!("NULL::{}", c.sql_type.cast()));
            } else {
                phs.push(q.push_param(v, c.sql_type));
            }
        }
        tuples.push(format!("({})", phs.join(", ")));
    }
    let quoted_cols: Vec<String> = cols.iter().map(|c| quoted(c)).collect();
    let mut sql = format!(
        "INSERT INTO {} AS {} ({}) VALUES {}",
        qualified_table(db_schema, entity.table),
        MAIN_ALIAS,
        quoted_cols.join(", "),
        tuples.join(", ")
    );
    if let Some(oc) = conflict {
        sql.push_str(&oc.render(entity, db_schema, &inserted, &mut q));
    }
    if returning {
        sql.push_str(&format!(" RETURNING {}", column_list(entity, MAIN_ALIAS)));
    }
    q.sql = sql;
    q
}

/// Right-hand side of one SET item.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SetOp {
    Value(Value),
    Null,
    /// `col = col + v`
    Add(Value),
    /// `col = col || v` on JSONB arrays/objects
    Append(Value),
}

/// UPDATE ... SET ... WHERE, bumping `update_time` when the table has it.
/// Returns `None` when there is nothing to set.
pub(crate) fn update(
    db_schema: &str,
    entity: &'static EntitySchema,
    sets: &[(&'static str, SetOp)],
    preds: &[Expr],
    returning: bool,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut parts = Vec::with_capacity(sets.len() + 1);
    for (name, op) in sets {
        if *name == "update_time" {
            continue;
        }
        let ty = entity.cast_of(name);
        let col = quoted(name);
        let rhs = match op {
            SetOp::Value(v) => q.push_param(v, ty),
            SetOp::Null => "NULL".to_string(),
            SetOp::Add(v) => {
                format!("COALESCE({}.{}, 0) + {}", MAIN_ALIAS, col, q.push_param(v, ty))
            }
            SetOp::Append(v) => {
                format!("{}.{} || {}", MAIN_ALIAS, col, q.push_param(v, SqlType::Jsonb))
            }
        };
        parts.push(format!("{} = {}", col, rhs));
    }
    if entity.has_column("update_time") {
        parts.push(format!("{} = NOW()", quoted("update_time")));
    }
    // Nothing to change: a no-op assignment keeps the statement valid.
    if parts.is_empty() {
        let key = quoted(entity.primary_key[0]);
        parts.push(format!("{} = {}.{}", key, MAIN_ALIAS, key));
    }
    let scope = Scope {
        db_schema,
        entity,
        alias: Some(MAIN_ALIAS),
    };
    let where_clause = render_where(preds, &scope, &mut q);
    let mut sql = format!(
        "UPDATE {} AS {} SET {}{}",
        qualified_table(db_schema, entity.table),
        MAIN_ALIAS,
        parts.join(", "),
        where_clause
    );
    if returning {
        sql.push_str(&format!(" RETURNING {}", column_list(entity, MAIN_ALIAS)));
    }
    q.sql = sql;
    q
}

pub(crate) fn delete(db_schema: &str, entity: &'static EntitySchema, preds: &[Expr]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let scope = Scope {
        db_schema,
        entity,
        alias: Some(MAIN_ALIAS),
    };
    let where_clause = render_where(preds, &scope, &mut q);
    q.sql = format!(
        "DELETE FROM {} AS {}{}",
        qualified_table(db_schema, entity.table),
        MAIN_ALIAS,
        where_clause
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        allocation_cost, application_module_relationship, project,
        resource_definition_matching_rule,
    };
    use crate::predicate::CmpOp;
    use serde_json::json;

    fn plain(entity: &'static EntitySchema) -> Select<'static> {
        Select {
            db_schema: "public",
            entity,
            preds: &[],
            order: &[],
            limit: None,
            offset: None,
            distinct: false,
            for_update: false,
        }
    }

    #[test]
    fn quoted_escapes_double_quotes() {
        assert_eq!(quoted("order"), "\"order\"");
        assert_eq!(quoted("a\"b"), "\"a\"\"b\"");
        assert_eq!(qualified_table("walrus", "projects"), "\"walrus\".\"projects\"");
    }

    #[test]
    fn paging_without_order_sorts_by_primary_key() {
        let s = Select {
            limit: Some(10),
            offset: Some(20),
            ..plain(&project::SCHEMA)
        };
        let q = select(&s, Some(&["id"]));
        assert_eq!(
            q.sql,
            r#"SELECT t0."id" FROM "public"."projects" AS t0 ORDER BY t0."id" LIMIT 10 OFFSET 20"#
        );
    }

    #[test]
    fn select_with_predicates_and_order() {
        let preds = [Expr::Cmp {
            column: "name",
            op: CmpOp::Eq,
            value: json!("dev"),
        }];
        let order = [("create_time", true)];
        let s = Select {
            preds: &preds,
            order: &order,
            for_update: true,
            ..plain(&project::SCHEMA)
        };
        let q = select(&s, Some(&["id", "name"]));
        assert_eq!(
            q.sql,
            r#"SELECT t0."id", t0."name" FROM "public"."projects" AS t0 WHERE t0."name" = $1::text ORDER BY t0."create_time" DESC FOR UPDATE"#
        );
        assert_eq!(q.params, vec![PgBindValue::String("dev".into())]);
    }

    #[test]
    fn reserved_word_columns_are_quoted() {
        let q = select(&plain(&resource_definition_matching_rule::SCHEMA), None);
        assert!(q.sql.contains(r#"t0."order""#), "{}", q.sql);
    }

    #[test]
    fn distinct_count_uses_subquery() {
        let s = Select {
            distinct: true,
            ..plain(&project::SCHEMA)
        };
        let q = count(&s);
        assert!(q.sql.starts_with("SELECT COUNT(*) FROM (SELECT DISTINCT "), "{}", q.sql);
        assert!(q.sql.ends_with(") AS sub"));
        assert_eq!(
            count(&plain(&project::SCHEMA)).sql,
            r#"SELECT COUNT(*) FROM "public"."projects" AS t0"#
        );
    }

    #[test]
    fn aggregate_groups_and_aliases() {
        let q = aggregate(
            &plain(&allocation_cost::SCHEMA),
            &["namespace"],
            &[Aggregate::count(), Aggregate::sum("total_cost").alias("cost")],
        );
        assert_eq!(
            q.sql,
            r#"SELECT t0."namespace", COUNT(*) AS "count", SUM(t0."total_cost")::float8 AS "cost" FROM "public"."allocation_costs" AS t0 GROUP BY t0."namespace""#
        );
    }

    #[test]
    fn insert_uses_default_for_missing_defaulted_values() {
        let mut row = Map::new();
        row.insert("id".into(), json!("6f1f1a4e-0000-4000-8000-000000000001"));
        row.insert("name".into(), json!("p1"));
        row.insert("description".into(), Value::Null);
        let q = insert("public", &project::SCHEMA, &[row], None, false);
        assert!(q.sql.starts_with(r#"INSERT INTO "public"."projects" AS t0 ("#), "{}", q.sql);
        assert!(q.sql.contains("$1::uuid"), "{}", q.sql);
        assert!(q.sql.contains("$2::text"), "{}", q.sql);
        assert!(q.sql.contains("NULL::text"), "{}", q.sql);
        assert!(q.sql.contains("DEFAULT"), "{}", q.sql);
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn identity_columns_are_never_inserted() {
        let cols = insert_columns(&allocation_cost::SCHEMA);
        assert!(!cols.contains(&"id"));
        assert!(rows_per_insert(&allocation_cost::SCHEMA) * cols.len() <= MAX_PARAMS);
    }

    #[test]
    fn upsert_update_columns_bumps_update_time() {
        let mut row = Map::new();
        row.insert("application_id".into(), json!("6f1f1a4e-0000-4000-8000-000000000001"));
        row.insert("module_id".into(), json!("webservice"));
        row.insert("name".into(), json!("web"));
        row.insert("version".into(), json!("0.1.0"));
        let oc = OnConflict {
            columns: vec!["application_id", "module_id", "name"],
            where_clause: None,
            action: ConflictAction::UpdateColumns(vec!["version", "attributes"]),
        };
        let q = insert("public", &application_module_relationship::SCHEMA, &[row], Some(&oc), true);
        assert!(
            q.sql.contains(
                r#" ON CONFLICT ("application_id", "module_id", "name") DO UPDATE SET "version" = EXCLUDED."version", "attributes" = EXCLUDED."attributes", "update_time" = NOW()"#
            ),
            "{}",
            q.sql
        );
        assert!(q.sql.contains(" RETURNING t0."), "{}", q.sql);
    }

    #[test]
    fn upsert_with_partial_index_predicate_is_unqualified() {
        let mut row = Map::new();
        row.insert("name".into(), json!("p"));
        let oc = OnConflict {
            columns: vec!["name"],
            where_clause: Some(Expr::Null {
                column: "description",
                negated: false,
            }),
            action: ConflictAction::DoNothing,
        };
        let q = insert("public", &project::SCHEMA, &[row], Some(&oc), false);
        assert!(
            q.sql.ends_with(r#" ON CONFLICT ("name") WHERE "description" IS NULL DO NOTHING"#),
            "{}",
            q.sql
        );
    }

    #[test]
    fn update_sets_values_and_update_time() {
        let preds = [Expr::Cmp {
            column: "id",
            op: CmpOp::Eq,
            value: json!("6f1f1a4e-0000-4000-8000-000000000001"),
        }];
        let q = update(
            "public",
            &project::SCHEMA,
            &[
                ("description", SetOp::Value(json!("d"))),
                ("labels", SetOp::Append(json!({"a": "b"}))),
            ],
            &preds,
            true,
        );
        assert!(
            q.sql.starts_with(
                r#"UPDATE "public"."projects" AS t0 SET "description" = $1::text, "labels" = t0."labels" || $2::jsonb, "update_time" = NOW() WHERE t0."id" = $3::uuid RETURNING "#
            ),
            "{}",
            q.sql
        );
    }

    #[test]
    fn update_without_sets_still_bumps_update_time() {
        let preds = [Expr::Cmp {
            column: "id",
            op: CmpOp::Eq,
            value: json!("6f1f1a4e-0000-4000-8000-000000000001"),
        }];
        let q = update("public", &project::SCHEMA, &[], &preds, false);
        assert_eq!(
            q.sql,
            r#"UPDATE "public"."projects" AS t0 SET "update_time" = NOW() WHERE t0."id" = $1::uuid"#
        );

        let q = update("public", &allocation_cost::SCHEMA, &[], &[], false);
        assert_eq!(q.sql, r#"UPDATE "public"."allocation_costs" AS t0 SET "id" = t0."id""#);
    }

    #[test]
    fn delete_renders_predicates() {
        let preds = [Expr::In {
            column: "name",
            values: vec![json!("a"), json!("b")],
            negated: false,
        }];
        let q = delete("public", &project::SCHEMA, &preds);
        assert_eq!(
            q.sql,
            r#"DELETE FROM "public"."projects" AS t0 WHERE t0."name" IN ($1::text, $2::text)"#
        );
    }
}
