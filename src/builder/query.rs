use super::check_columns;
use crate::client::Client;
use crate::entity::{Edge, Entity};
use crate::error::DaoError;
use crate::predicate::{Expr, Order, Predicate, SubSelect};
use crate::sql::{self, Aggregate, Select};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use std::collections::HashMap;
use std::sync::Arc;

/// Eager loading of one edge for a batch of rows.
#[async_trait]
pub(crate) trait EdgeLoad<E>: Send + Sync {
    async fn load(&self, nodes: &mut [E]) -> Result<(), DaoError>;
}

struct EdgeLoader<E, R: Entity> {
    edge: Edge<E, R>,
    query: Query<R>,
}

fn key_of(v: &Value) -> String {
    v.to_string()
}

#[async_trait]
impl<E: Entity, R: Entity> EdgeLoad<E> for EdgeLoader<E, R> {
    async fn load(&self, nodes: &mut [E]) -> Result<(), DaoError> {
        let mut keys: Vec<Value> = Vec::new();
        for n in nodes.iter() {
            let v = n.column_value(self.edge.from);
            if !v.is_null() && !keys.contains(&v) {
                keys.push(v);
            }
        }
        let related = if keys.is_empty() {
            Vec::new()
        } else {
            self.query
                .clone()
                .filter(Predicate::from_expr(Expr::In {
                    column: self.edge.to,
                    values: keys,
                    negated: false,
                }))
                .all()
                .await?
        };
        let mut by_key: HashMap<String, Vec<R>> = HashMap::new();
        for r in related {
            by_key
                .entry(key_of(&r.column_value(self.edge.to)))
                .or_default()
                .push(r);
        }
        for n in nodes.iter_mut() {
            let k = n.column_value(self.edge.from);
            let rows = if k.is_null() {
                Vec::new()
            } else {
                by_key.get(&key_of(&k)).cloned().unwrap_or_default()
            };
            (self.edge.assign)(n, rows);
        }
        Ok(())
    }
}

/// SELECT builder for `E`.
#[derive(Clone)]
pub struct Query<E: Entity> {
    client: Client,
    preds: Vec<Expr>,
    order: Vec<(&'static str, bool)>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
    for_update: bool,
    loads: Vec<Arc<dyn EdgeLoad<E>>>,
}

impl<E: Entity> std::fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("table", &E::schema().table)
            .field("preds", &self.preds)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("loads", &self.loads.len())
            .finish()
    }
}

impl<E: Entity> Query<E> {
    pub(crate) fn new(client: Client) -> Self {
        Query {
            client,
            preds: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            for_update: false,
            loads: Vec::new(),
        }
    }

    pub fn filter(mut self, pred: Predicate<E>) -> Self {
        self.preds.push(pred.expr);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn order(mut self, o: Order<E>) -> Self {
        self.order.push((o.column, o.desc));
        self
    }

    /// SELECT DISTINCT.
    pub fn unique(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Locks the selected rows until the transaction ends.
    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    /// Eager-loads `edge` with one extra query per edge; `configure` shapes that query.
    pub fn with<R, F>(mut self, edge: Edge<E, R>, configure: F) -> Self
    where
        R: Entity,
        F: FnOnce(Query<R>) -> Query<R>,
    {
        let query = configure(Query::new(self.client.clone()));
        self.loads.push(Arc::new(EdgeLoader { edge, query }));
        self
    }

    /// Rows of `R` reachable over `edge` from the rows this query selects.
    pub fn query_edge<R: Entity>(self, edge: Edge<E, R>) -> Query<R> {
        let pred = Expr::InSubquery {
            column: edge.to,
            source: Box::new(SubSelect {
                entity: E::schema(),
                preds: self.preds,
                order: self.order,
                limit: self.limit,
                offset: self.offset,
            }),
            source_column: edge.from,
        };
        Query::new(self.client).filter(Predicate::from_expr(pred))
    }

    fn select(&self) -> Select<'_> {
        Select {
            db_schema: self.client.schema(),
            entity: E::schema(),
            preds: &self.preds,
            order: &self.order,
            limit: self.limit,
            offset: self.offset,
            distinct: self.distinct,
            for_update: self.for_update,
        }
    }

    pub async fn all(self) -> Result<Vec<E>, DaoError> {
        let q = sql::select(&self.select(), None);
        let mut nodes: Vec<E> = self.client.fetch_all(&q).await?;
        if !nodes.is_empty() {
            for l in &self.loads {
                l.load(&mut nodes).await?;
            }
        }
        Ok(nodes)
    }

    /// First row, `NotFound` when there is none.
    pub async fn first(self) -> Result<E, DaoError> {
        self.limit(1)
            .all()
            .await?
            .into_iter()
            .next()
            .ok_or(DaoError::NotFound {
                entity: E::schema().name,
            })
    }

    /// The single matching row: `NotFound` when none, `NotSingular` when several.
    pub async fn only(self) -> Result<E, DaoError> {
        let mut rows = self.limit(2).all().await?;
        match rows.len() {
            0 => Err(DaoError::NotFound {
                entity: E::schema().name,
            }),
            1 => Ok(rows.remove(0)),
            _ => Err(DaoError::NotSingular {
                entity: E::schema().name,
            }),
        }
    }

    pub async fn count(self) -> Result<i64, DaoError> {
        let q = sql::count(&self.select());
        let n: Vec<i64> = self.client.fetch_scalars(&q).await?;
        Ok(n.into_iter().next().unwrap_or(0))
    }

    pub async fn exist(self) -> Result<bool, DaoError> {
        let q = sql::exists(&self.select());
        let found: Vec<bool> = self.client.fetch_scalars(&q).await?;
        Ok(found.into_iter().next().unwrap_or(false))
    }

    /// Selected columns of every row as JSON objects.
    pub async fn select_json(self, columns: &[&str]) -> Result<Vec<Value>, DaoError> {
        check_columns(E::schema(), columns.iter().copied())?;
        let q = sql::select(&self.select(), Some(columns));
        let rows = self.client.fetch_rows(&q).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// One JSON object per group with the group columns and the aggregate aliases.
    pub async fn aggregate(
        self,
        group_by: &[&str],
        aggregates: &[Aggregate],
    ) -> Result<Vec<Value>, DaoError> {
        check_columns(E::schema(), group_by.iter().copied())?;
        check_columns(E::schema(), aggregates.iter().filter_map(|a| a.column.as_deref()))?;
        let q = sql::aggregate(&self.select(), group_by, aggregates);
        let rows = self.client.fetch_rows(&q).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

impl<E: Entity> Query<E>
where
    (E::Id,): for<'r> sqlx::FromRow<'r, PgRow>,
    E::Id: Send + Unpin,
{
    /// Keys of the matching rows (single-column keys only).
    pub async fn ids(self) -> Result<Vec<E::Id>, DaoError> {
        let pk = [E::schema().primary_key[0]];
        let q = sql::select(&self.select(), Some(&pk[..]));
        self.client.fetch_scalars(&q).await
    }

    pub async fn first_id(self) -> Result<E::Id, DaoError> {
        self.limit(1)
            .ids()
            .await?
            .into_iter()
            .next()
            .ok_or(DaoError::NotFound {
                entity: E::schema().name,
            })
    }

    pub async fn only_id(self) -> Result<E::Id, DaoError> {
        let mut ids = self.limit(2).ids().await?;
        match ids.len() {
            0 => Err(DaoError::NotFound {
                entity: E::schema().name,
            }),
            1 => Ok(ids.remove(0)),
            _ => Err(DaoError::NotSingular {
                entity: E::schema().name,
            }),
        }
    }
}

/// Decodes a row of unknown shape into a JSON object.
pub(crate) fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
