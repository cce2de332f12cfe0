use crate::client::Client;
use crate::crypto;
use crate::entity::{Entity, Field};
use crate::error::DaoError;
use crate::predicate::{Expr, Predicate};
use crate::schema::EntitySchema;
use crate::sql::{self, SetOp};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value};

/// SET items collected by the update builders. The first invalid setter is
/// kept and reported when the statement is saved.
struct Sets {
    schema: &'static EntitySchema,
    items: Vec<(&'static str, SetOp)>,
    error: Option<DaoError>,
}

impl Sets {
    fn new(schema: &'static EntitySchema) -> Self {
        Sets {
            schema,
            items: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, err: DaoError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn is_set(&self, column: &str) -> bool {
        self.items.iter().any(|(c, _)| *c == column)
    }

    fn push(&mut self, column: &'static str, op: SetOp) {
        let Some(c) = self.schema.column(column) else {
            let message = format!("invalid field for {}", self.schema.name);
            self.fail(DaoError::validation(column, message));
            return;
        };
        if !c.is_updatable() || self.schema.is_primary(column) {
            self.fail(DaoError::validation(column, "field is immutable"));
            return;
        }
        let checked = match &op {
            SetOp::Value(v) => c.validate(v),
            SetOp::Null => c.validate(&Value::Null),
            SetOp::Add(_) | SetOp::Append(_) => Ok(()),
        };
        if let Err(m) = checked {
            self.fail(DaoError::validation(column, m));
            return;
        }
        self.items.retain(|(name, _)| *name != column);
        self.items.push((column, op));
    }

    fn into_result(self) -> Result<Vec<(&'static str, SetOp)>, DaoError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }
}

fn to_json<T: Serialize>(v: &T) -> Result<Value, DaoError> {
    serde_json::to_value(v).map_err(|e| DaoError::validation("value", e.to_string()))
}

/// Changed columns between the stored and the new values of a row.
/// Keys, immutable columns and `update_time` are never part of the diff.
pub(crate) fn diff_sets(
    schema: &'static EntitySchema,
    stored: &Map<String, Value>,
    new: &Map<String, Value>,
) -> Vec<(&'static str, SetOp)> {
    let mut out = Vec::new();
    for c in schema.columns {
        if schema.is_primary(c.name) || !c.is_updatable() || c.name == "update_time" {
            continue;
        }
        let old = stored.get(c.name).unwrap_or(&Value::Null);
        let v = new.get(c.name).unwrap_or(&Value::Null);
        if old == v {
            continue;
        }
        if v.is_null() {
            // A defaulted non-null column cannot be cleared; keep the stored value.
            if c.nullable {
                out.push((c.name, SetOp::Null));
            }
        } else {
            out.push((c.name, SetOp::Value(v.clone())));
        }
    }
    out
}

/// UPDATE of every row matching the filters.
pub struct Update<E: Entity> {
    client: Client,
    preds: Vec<Expr>,
    sets: Sets,
    _entity: std::marker::PhantomData<fn() -> E>,
}

impl<E: Entity> Update<E> {
    pub(crate) fn new(client: Client) -> Self {
        Update {
            client,
            preds: Vec::new(),
            sets: Sets::new(E::schema()),
            _entity: std::marker::PhantomData,
        }
    }

    pub fn filter(mut self, pred: Predicate<E>) -> Self {
        self.preds.push(pred.expr);
        self
    }

    pub fn set<T: Serialize>(mut self, field: Field<E, T>, value: impl Into<T>) -> Self {
        match to_json(&value.into()) {
            Ok(v) => self.sets.push(field.name, SetOp::Value(v)),
            Err(e) => self.sets.fail(e),
        }
        self
    }

    /// Sets the column to NULL.
    pub fn clear<T>(mut self, field: Field<E, T>) -> Self {
        self.sets.push(field.name, SetOp::Null);
        self
    }

    /// Adds `value` to a numeric column.
    pub fn add<T: Serialize>(mut self, field: Field<E, T>, value: T) -> Self {
        match to_json(&value) {
            Ok(v) => self.sets.push(field.name, SetOp::Add(v)),
            Err(e) => self.sets.fail(e),
        }
        self
    }

    /// Appends to a JSONB array or merges into a JSONB object.
    pub fn append<T>(mut self, field: Field<E, T>, value: Value) -> Self {
        self.sets.push(field.name, SetOp::Append(value));
        self
    }

    /// Number of matched rows. Rows are touched (and `update_time` bumped) even without setters.
    pub async fn save(self) -> Result<u64, DaoError> {
        let sets = crypto::seal_sets(E::schema(), self.sets.into_result()?)?;
        let q = sql::update(self.client.schema(), E::schema(), &sets, &self.preds, false);
        self.client.execute(&q).await
    }
}

/// UPDATE of one row by key.
pub struct UpdateOne<E: Entity> {
    client: Client,
    id: E::Id,
    object: Option<E>,
    diff_object: bool,
    preds: Vec<Expr>,
    sets: Sets,
}

impl<E: Entity> UpdateOne<E> {
    pub(crate) fn from_entity(client: Client, entity: E) -> Self {
        UpdateOne {
            client,
            id: entity.id(),
            object: Some(entity),
            diff_object: false,
            preds: Vec::new(),
            sets: Sets::new(E::schema()),
        }
    }

    pub(crate) fn from_id(client: Client, id: E::Id) -> Self {
        UpdateOne {
            client,
            id,
            object: None,
            diff_object: false,
            preds: Vec::new(),
            sets: Sets::new(E::schema()),
        }
    }

    /// Extra condition the row must satisfy; otherwise the update reports `NotFound`.
    pub fn filter(mut self, pred: Predicate<E>) -> Self {
        self.preds.push(pred.expr);
        self
    }

    pub fn set<T: Serialize>(mut self, field: Field<E, T>, value: impl Into<T>) -> Self {
        match to_json(&value.into()) {
            Ok(v) => self.sets.push(field.name, SetOp::Value(v)),
            Err(e) => self.sets.fail(e),
        }
        self
    }

    pub fn clear<T>(mut self, field: Field<E, T>) -> Self {
        self.sets.push(field.name, SetOp::Null);
        self
    }

    pub fn add<T: Serialize>(mut self, field: Field<E, T>, value: T) -> Self {
        match to_json(&value) {
            Ok(v) => self.sets.push(field.name, SetOp::Add(v)),
            Err(e) => self.sets.fail(e),
        }
        self
    }

    pub fn append<T>(mut self, field: Field<E, T>, value: Value) -> Self {
        self.sets.push(field.name, SetOp::Append(value));
        self
    }

    /// Sets every mutable column whose value differs from the stored row.
    /// Explicit setters take precedence over the object's values.
    pub fn set_obj(mut self, obj: E) -> Self {
        self.object = Some(obj);
        self.diff_object = true;
        self
    }

    /// The updated row; `NotFound` when no row matched.
    pub async fn save(self) -> Result<E, DaoError> {
        let UpdateOne {
            client,
            id,
            object,
            diff_object,
            mut preds,
            sets,
        } = self;
        let mut sets = sets;
        if let Some(err) = sets.error.take() {
            return Err(err);
        }
        preds.insert(0, E::id_predicate(&id).expr);

        if diff_object {
            if let Some(obj) = &object {
                let stored = client.entity::<E>().get(&id).await?;
                for (column, op) in diff_sets(E::schema(), &stored.values()?, &obj.values()?) {
                    if !sets.is_set(column) {
                        sets.push(column, op);
                    }
                }
            }
        }
        let items = crypto::seal_sets(E::schema(), sets.into_result()?)?;

        let q = sql::update(client.schema(), E::schema(), &items, &preds, true);
        let mut row = client
            .fetch_all::<E>(&q)
            .await?
            .into_iter()
            .next()
            .ok_or(DaoError::NotFound {
                entity: E::schema().name,
            })?;
        if let Some(obj) = object {
            *row.edges_mut() = obj.edges().clone();
        }
        Ok(row)
    }

    /// Saves, then runs `cb` with the client and the updated row.
    ///
    /// When the update started from an object and no row matched, `cb` runs with
    /// that object instead and its result is returned.
    pub async fn save_e<F>(self, cb: F) -> Result<E, DaoError>
    where
        F: for<'a> FnOnce(&'a Client, &'a E) -> BoxFuture<'a, Result<(), DaoError>>,
    {
        let client = self.client.clone();
        let input = self.object.clone();
        let row = match (self.save().await, input) {
            (Ok(row), _) => row,
            (Err(DaoError::NotFound { .. }), Some(obj)) => obj,
            (Err(err), _) => return Err(err),
        };
        cb(&client, &row).await?;
        Ok(row)
    }

    pub async fn exec(self) -> Result<(), DaoError> {
        self.save().await.map(|_| ())
    }
}
