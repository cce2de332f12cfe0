//! The `Entity` trait, typed column constants and edges.

use crate::error::DaoError;
use crate::predicate::{escape_like, CmpOp, Expr, Order, Predicate};
use crate::schema::EntitySchema;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use std::fmt;
use std::marker::PhantomData;

/// A table-backed record.
///
/// Column values are derived from the serde representation of the struct, so
/// serialized field names must equal column names. The `edges` field carries
/// eagerly loaded neighbours and is skipped by both serde and sqlx.
pub trait Entity:
    for<'r> sqlx::FromRow<'r, PgRow>
    + Serialize
    + Clone
    + fmt::Debug
    + Send
    + Sync
    + Unpin
    + 'static
{
    type Id: Serialize + Clone + fmt::Debug + PartialEq + Send + Sync + 'static;
    type Edges: Default + Clone + fmt::Debug + Send + Sync;

    fn schema() -> &'static EntitySchema;

    fn id(&self) -> Self::Id;

    fn edges(&self) -> &Self::Edges;

    fn edges_mut(&mut self) -> &mut Self::Edges;

    /// Predicate selecting the row with the given key.
    fn id_predicate(id: &Self::Id) -> Predicate<Self> {
        let column = Self::schema().primary_key[0];
        Predicate::from_expr(Expr::Cmp {
            column,
            op: CmpOp::Eq,
            value: serde_json::to_value(id).unwrap_or(Value::Null),
        })
    }

    /// Fills client-generated values (keys) before insert.
    fn prepare_create(&mut self) {}

    /// Column checks for a row about to be inserted.
    fn validate(&self) -> Result<(), DaoError> {
        let values = self.values()?;
        validate_row(Self::schema(), &values)
    }

    /// Column name to JSON value, restricted to the table's columns.
    fn values(&self) -> Result<Map<String, Value>, DaoError> {
        let schema = Self::schema();
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.retain(|k, _| schema.has_column(k));
                Ok(map)
            }
            Ok(_) => Err(DaoError::validation(schema.name, "entity must serialize to an object")),
            Err(e) => Err(DaoError::validation(schema.name, e.to_string())),
        }
    }

    /// Value of one column, `Null` when absent.
    fn column_value(&self, name: &str) -> Value {
        self.values()
            .ok()
            .and_then(|mut m| m.remove(name))
            .unwrap_or(Value::Null)
    }
}

/// Checks every column of a row to be inserted; null defaulted columns are left to the database.
pub fn validate_row(schema: &EntitySchema, values: &Map<String, Value>) -> Result<(), DaoError> {
    for c in schema.columns {
        let v = values.get(c.name).unwrap_or(&Value::Null);
        if v.is_null() && c.has_default() {
            continue;
        }
        if v.is_null() && !c.nullable {
            return Err(DaoError::validation(c.name, "missing required field"));
        }
        c.validate(v).map_err(|m| DaoError::validation(c.name, m))?;
    }
    Ok(())
}

/// A typed column of `E` holding values of `T`.
pub struct Field<E, T> {
    pub name: &'static str,
    _marker: PhantomData<fn() -> (E, T)>,
}

impl<E, T> Clone for Field<E, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, T> Copy for Field<E, T> {}

impl<E, T> fmt::Debug for Field<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl<E, T> Field<E, T> {
    pub const fn new(name: &'static str) -> Self {
        Field {
            name,
            _marker: PhantomData,
        }
    }

    pub fn asc(self) -> Order<E> {
        Order::new(self.name, false)
    }

    pub fn desc(self) -> Order<E> {
        Order::new(self.name, true)
    }

    pub fn is_null(self) -> Predicate<E> {
        Predicate::from_expr(Expr::Null {
            column: self.name,
            negated: false,
        })
    }

    pub fn not_null(self) -> Predicate<E> {
        Predicate::from_expr(Expr::Null {
            column: self.name,
            negated: true,
        })
    }

    /// JSONB containment, `column @> value`.
    pub fn json_contains(self, value: Value) -> Predicate<E> {
        Predicate::from_expr(Expr::JsonContains {
            column: self.name,
            value,
        })
    }
}

fn to_json<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

impl<E, T: Serialize> Field<E, T> {
    fn cmp(self, op: CmpOp, v: T) -> Predicate<E> {
        Predicate::from_expr(Expr::Cmp {
            column: self.name,
            op,
            value: to_json(&v),
        })
    }

    pub fn eq(self, v: impl Into<T>) -> Predicate<E> {
        self.cmp(CmpOp::Eq, v.into())
    }

    pub fn neq(self, v: impl Into<T>) -> Predicate<E> {
        self.cmp(CmpOp::Neq, v.into())
    }

    pub fn gt(self, v: impl Into<T>) -> Predicate<E> {
        self.cmp(CmpOp::Gt, v.into())
    }

    pub fn gte(self, v: impl Into<T>) -> Predicate<E> {
        self.cmp(CmpOp::Gte, v.into())
    }

    pub fn lt(self, v: impl Into<T>) -> Predicate<E> {
        self.cmp(CmpOp::Lt, v.into())
    }

    pub fn lte(self, v: impl Into<T>) -> Predicate<E> {
        self.cmp(CmpOp::Lte, v.into())
    }

    pub fn in_(self, vs: impl IntoIterator<Item = T>) -> Predicate<E> {
        Predicate::from_expr(Expr::In {
            column: self.name,
            values: vs.into_iter().map(|v| to_json(&v)).collect(),
            negated: false,
        })
    }

    pub fn not_in(self, vs: impl IntoIterator<Item = T>) -> Predicate<E> {
        Predicate::from_expr(Expr::In {
            column: self.name,
            values: vs.into_iter().map(|v| to_json(&v)).collect(),
            negated: true,
        })
    }
}

impl<E> Field<E, String> {
    fn like(self, pattern: String, case_insensitive: bool) -> Predicate<E> {
        Predicate::from_expr(Expr::Like {
            column: self.name,
            pattern,
            case_insensitive,
        })
    }

    pub fn contains(self, s: &str) -> Predicate<E> {
        self.like(format!("%{}%", escape_like(s)), false)
    }

    pub fn contains_fold(self, s: &str) -> Predicate<E> {
        self.like(format!("%{}%", escape_like(s)), true)
    }

    pub fn has_prefix(self, s: &str) -> Predicate<E> {
        self.like(format!("{}%", escape_like(s)), false)
    }

    pub fn has_suffix(self, s: &str) -> Predicate<E> {
        self.like(format!("%{}", escape_like(s)), false)
    }

    pub fn equal_fold(self, s: &str) -> Predicate<E> {
        Predicate::from_expr(Expr::EqualFold {
            column: self.name,
            value: s.to_string(),
        })
    }
}

/// A foreign-key relationship from `E` to `R`: rows of `R` whose `to` column
/// equals the `from` column of an `E`.
pub struct Edge<E, R> {
    pub name: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    /// At most one neighbour.
    pub unique: bool,
    /// Stores loaded neighbours into the entity's edges.
    pub assign: fn(&mut E, Vec<R>),
}

impl<E, R> Clone for Edge<E, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, R> Copy for Edge<E, R> {}

impl<E, R> fmt::Debug for Edge<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("unique", &self.unique)
            .finish()
    }
}

impl<E, R> Edge<E, R> {
    pub fn to_one(
        name: &'static str,
        from: &'static str,
        to: &'static str,
        assign: fn(&mut E, Vec<R>),
    ) -> Self {
        Edge {
            name,
            from,
            to,
            unique: true,
            assign,
        }
    }

    pub fn to_many(
        name: &'static str,
        from: &'static str,
        to: &'static str,
        assign: fn(&mut E, Vec<R>),
    ) -> Self {
        Edge {
            name,
            from,
            to,
            unique: false,
            assign,
        }
    }
}

/// Loaded to-many neighbours, or `NotLoaded`.
pub fn loaded_many<'a, R>(v: &'a Option<Vec<R>>, edge: &'static str) -> Result<&'a [R], DaoError> {
    v.as_deref().ok_or(DaoError::NotLoaded { edge })
}

/// Loaded to-one neighbour; `NotFound` when it was loaded but is absent.
pub fn loaded_one<'a, R: Entity>(
    v: &'a Option<Option<Box<R>>>,
    edge: &'static str,
) -> Result<&'a R, DaoError> {
    match v {
        None => Err(DaoError::NotLoaded { edge }),
        Some(None) => Err(DaoError::NotFound {
            entity: R::schema().name,
        }),
        Some(Some(r)) => Ok(r),
    }
}

/// Stores the first row of a to-one load.
pub fn first_boxed<R>(rows: Vec<R>) -> Option<Option<Box<R>>> {
    Some(rows.into_iter().next().map(Box::new))
}
