//! Typed predicates and orders over an untyped expression tree.
//!
//! Every value is bound as a parameter and cast to the type of the column it is
//! compared with. Subqueries get their own table alias so self-referencing edges
//! (e.g. resource compositions) resolve against the right row.

use crate::entity::{Edge, Entity};
use crate::schema::{EntitySchema, SqlType};
use crate::sql::{qualified_table, quoted, QueryBuf};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    fn sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Neq => "<>",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Expr {
    Cmp {
        column: &'static str,
        op: CmpOp,
        value: Value,
    },
    In {
        column: &'static str,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        column: &'static str,
        negated: bool,
    },
    Like {
        column: &'static str,
        pattern: String,
        case_insensitive: bool,
    },
    EqualFold {
        column: &'static str,
        value: String,
    },
    JsonContains {
        column: &'static str,
        value: Value,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// Some row of `related` has `to` equal to the outer row's `from`.
    Exists {
        related: &'static EntitySchema,
        from: &'static str,
        to: &'static str,
        preds: Vec<Expr>,
    },
    /// The outer row's `column` is among `source.source_column` of the rows `source` selects.
    InSubquery {
        column: &'static str,
        source: Box<SubSelect>,
        source_column: &'static str,
    },
}

/// A nested SELECT with its own ordering and paging.
#[derive(Clone, Debug)]
pub(crate) struct SubSelect {
    pub entity: &'static EntitySchema,
    pub preds: Vec<Expr>,
    /// (column, descending)
    pub order: Vec<(&'static str, bool)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SubSelect {
    fn paging(&self, alias: &str) -> String {
        let col = |c: &str| format!("{}.{}", alias, quoted(c));
        let mut order: Vec<String> = self
            .order
            .iter()
            .map(|(c, desc)| format!("{}{}", col(c), if *desc { " DESC" } else { "" }))
            .collect();
        if order.is_empty() && (self.limit.is_some() || self.offset.is_some()) {
            order = self.entity.primary_key.iter().map(|c| col(c)).collect();
        }
        let mut sql = String::new();
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
        sql
    }
}

/// Where an expression is rendered: the table it refers to and its alias, if any.
pub(crate) struct Scope<'a> {
    pub db_schema: &'a str,
    pub entity: &'static EntitySchema,
    pub alias: Option<&'a str>,
}

impl Scope<'_> {
    fn col(&self, name: &str) -> String {
        match self.alias {
            Some(a) => format!("{}.{}", a, quoted(name)),
            None => quoted(name),
        }
    }

    fn ty(&self, name: &str) -> SqlType {
        self.entity.cast_of(name)
    }
}

impl Expr {
    pub(crate) fn render(&self, scope: &Scope<'_>, q: &mut QueryBuf) -> String {
        match self {
            Expr::Cmp { column, op, value } => {
                let ph = q.push_param(value, scope.ty(column));
                format!("{} {} {}", scope.col(column), op.sql(), ph)
            }
            Expr::In { column, values, negated } => {
                if values.is_empty() {
                    return if *negated { "TRUE".into() } else { "FALSE".into() };
                }
                let ty = scope.ty(column);
                let phs: Vec<String> = values.iter().map(|v| q.push_param(v, ty)).collect();
                format!(
                    "{} {}IN ({})",
                    scope.col(column),
                    if *negated { "NOT " } else { "" },
                    phs.join(", ")
                )
            }
            Expr::Null { column, negated } => format!(
                "{} IS {}NULL",
                scope.col(column),
                if *negated { "NOT " } else { "" }
            ),
            Expr::Like {
                column,
                pattern,
                case_insensitive,
            } => {
                let ph = q.push_param(&Value::String(pattern.clone()), SqlType::Text);
                format!(
                    "{} {} {}",
                    scope.col(column),
                    if *case_insensitive { "ILIKE" } else { "LIKE" },
                    ph
                )
            }
            Expr::EqualFold { column, value } => {
                let ph = q.push_param(&Value::String(value.clone()), SqlType::Text);
                format!("lower({}) = lower({})", scope.col(column), ph)
            }
            Expr::JsonContains { column, value } => {
                let ph = q.push_param(value, SqlType::Jsonb);
                format!("{} @> {}", scope.col(column), ph)
            }
            Expr::And(items) => join(items, " AND ", "TRUE", scope, q),
            Expr::Or(items) => join(items, " OR ", "FALSE", scope, q),
            Expr::Not(inner) => format!("NOT ({})", inner.render(scope, q)),
            Expr::Exists {
                related,
                from,
                to,
                preds,
            } => {
                let alias = q.next_alias();
                let inner = Scope {
                    db_schema: scope.db_schema,
                    entity: related,
                    alias: Some(&alias),
                };
                let mut conds = vec![format!("{} = {}", inner.col(to), scope.col(from))];
                conds.extend(preds.iter().map(|p| p.render(&inner, q)));
                format!(
                    "EXISTS (SELECT 1 FROM {} AS {} WHERE {})",
                    qualified_table(scope.db_schema, related.table),
                    alias,
                    conds.join(" AND ")
                )
            }
            Expr::InSubquery {
                column,
                source,
                source_column,
            } => {
                let alias = q.next_alias();
                let inner = Scope {
                    db_schema: scope.db_schema,
                    entity: source.entity,
                    alias: Some(&alias),
                };
                let where_clause = render_where(&source.preds, &inner, q);
                format!(
                    "{} IN (SELECT {} FROM {} AS {}{}{})",
                    scope.col(column),
                    inner.col(source_column),
                    qualified_table(scope.db_schema, source.entity.table),
                    alias,
                    where_clause,
                    source.paging(&alias)
                )
            }
        }
    }
}

fn join(items: &[Expr], sep: &str, empty: &str, scope: &Scope<'_>, q: &mut QueryBuf) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = items.iter().map(|p| format!("({})", p.render(scope, q))).collect();
    parts.join(sep)
}

/// ` WHERE a AND b`, or an empty string without predicates.
pub(crate) fn render_where(preds: &[Expr], scope: &Scope<'_>, q: &mut QueryBuf) -> String {
    if preds.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = preds.iter().map(|p| p.render(scope, q)).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

/// Escapes LIKE wildcards so the value matches literally.
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A filter on rows of `E`.
pub struct Predicate<E> {
    pub(crate) expr: Expr,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Predicate::from_expr(self.expr.clone())
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.expr).finish()
    }
}

impl<E> Predicate<E> {
    pub(crate) fn from_expr(expr: Expr) -> Self {
        Predicate {
            expr,
            _entity: PhantomData,
        }
    }

    pub fn and(preds: impl IntoIterator<Item = Predicate<E>>) -> Self {
        Predicate::from_expr(Expr::And(preds.into_iter().map(|p| p.expr).collect()))
    }

    pub fn or(preds: impl IntoIterator<Item = Predicate<E>>) -> Self {
        Predicate::from_expr(Expr::Or(preds.into_iter().map(|p| p.expr).collect()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(pred: Predicate<E>) -> Self {
        Predicate::from_expr(Expr::Not(Box::new(pred.expr)))
    }
}

impl<E: Entity> Predicate<E> {
    /// Rows that have at least one neighbour over `edge`.
    pub fn has<R: Entity>(edge: &Edge<E, R>) -> Self {
        Self::has_with(edge, Vec::new())
    }

    /// Rows that have at least one neighbour over `edge` matching all `preds`.
    pub fn has_with<R: Entity>(edge: &Edge<E, R>, preds: Vec<Predicate<R>>) -> Self {
        Predicate::from_expr(Expr::Exists {
            related: R::schema(),
            from: edge.from,
            to: edge.to,
            preds: preds.into_iter().map(|p| p.expr).collect(),
        })
    }
}

/// A sort key on a column of `E`.
pub struct Order<E> {
    pub(crate) column: &'static str,
    pub(crate) desc: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Order<E> {
    fn clone(&self) -> Self {
        Order::new(self.column, self.desc)
    }
}

impl<E> fmt::Debug for Order<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, if self.desc { "DESC" } else { "ASC" })
    }
}

impl<E> Order<E> {
    pub(crate) fn new(column: &'static str, desc: bool) -> Self {
        Order {
            column,
            desc,
            _entity: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{application_resource, environment, project};
    use serde_json::json;

    fn render(expr: &Expr, entity: &'static EntitySchema) -> (String, QueryBuf) {
        let mut q = QueryBuf::new();
        let scope = Scope {
            db_schema: "public",
            entity,
            alias: Some("t0"),
        };
        let sql = expr.render(&scope, &mut q);
        (sql, q)
    }

    #[test]
    fn comparisons_cast_to_the_column_type() {
        let (sql, q) = render(
            &Expr::Cmp {
                column: "create_time",
                op: CmpOp::Gte,
                value: json!("2024-01-01T00:00:00Z"),
            },
            &project::SCHEMA,
        );
        assert_eq!(sql, r#"t0."create_time" >= $1::timestamptz"#);
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn empty_sets_render_constants() {
        let empty_in = Expr::In { column: "name", values: vec![], negated: false };
        let empty_not_in = Expr::In { column: "name", values: vec![], negated: true };
        assert_eq!(render(&empty_in, &project::SCHEMA).0, "FALSE");
        assert_eq!(render(&empty_not_in, &project::SCHEMA).0, "TRUE");
        assert_eq!(render(&Expr::And(vec![]), &project::SCHEMA).0, "TRUE");
        assert_eq!(render(&Expr::Or(vec![]), &project::SCHEMA).0, "FALSE");
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like(r"50%_off\"), r"50\%\_off\\");
    }

    #[test]
    fn self_referencing_exists_uses_a_fresh_alias() {
        let expr = Expr::Exists {
            related: &application_resource::SCHEMA,
            from: "id",
            to: "composition_id",
            preds: vec![Expr::Cmp { column: "mode", op: CmpOp::Eq, value: json!("managed") }],
        };
        let (sql, q) = render(&expr, &application_resource::SCHEMA);
        assert_eq!(
            sql,
            r#"EXISTS (SELECT 1 FROM "public"."application_resources" AS t1 WHERE t1."composition_id" = t0."id" AND t1."mode" = $1::text)"#
        );
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn subquery_keeps_order_and_paging() {
        let expr = Expr::InSubquery {
            column: "project_id",
            source: Box::new(SubSelect {
                entity: &project::SCHEMA,
                preds: vec![Expr::Cmp { column: "name", op: CmpOp::Neq, value: json!("x") }],
                order: vec![("name", true)],
                limit: Some(1),
                offset: Some(2),
            }),
            source_column: "id",
        };
        let (sql, q) = render(&expr, &environment::SCHEMA);
        assert_eq!(
            sql,
            r#"t0."project_id" IN (SELECT t1."id" FROM "public"."projects" AS t1 WHERE t1."name" <> $1::text ORDER BY t1."name" DESC LIMIT 1 OFFSET 2)"#
        );
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn paged_subquery_without_order_sorts_on_the_key() {
        let expr = Expr::InSubquery {
            column: "project_id",
            source: Box::new(SubSelect {
                entity: &project::SCHEMA,
                preds: vec![],
                order: vec![],
                limit: Some(3),
                offset: None,
            }),
            source_column: "id",
        };
        let (sql, _) = render(&expr, &environment::SCHEMA);
        assert!(sql.ends_with(r#"AS t1 ORDER BY t1."id" LIMIT 3)"#), "{}", sql);
    }

    #[test]
    fn or_wraps_each_branch() {
        let expr = Expr::Or(vec![
            Expr::Null { column: "description", negated: false },
            Expr::Not(Box::new(Expr::Cmp { column: "name", op: CmpOp::Eq, value: json!("a") })),
        ]);
        let (sql, _) = render(&expr, &project::SCHEMA);
        assert_eq!(
            sql,
            r#"(t0."description" IS NULL) OR (NOT (t0."name" = $1::text))"#
        );
    }
}
