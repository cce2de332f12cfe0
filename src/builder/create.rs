use super::check_columns;
use crate::client::Client;
use crate::crypto;
use crate::entity::Entity;
use crate::error::DaoError;
use crate::predicate::Predicate;
use crate::sql::{self, ConflictAction, OnConflict};
use futures::future::BoxFuture;
use serde_json::{Map, Value};

/// Prepares, validates and inserts `rows`, chunked under the parameter limit.
/// Several chunks on a pooled client run in one transaction.
async fn insert_rows<E: Entity>(
    client: &Client,
    rows: &mut [E],
    conflict: Option<&OnConflict>,
    returning: bool,
) -> Result<Vec<E>, DaoError> {
    let mut values = Vec::with_capacity(rows.len());
    for e in rows.iter_mut() {
        e.prepare_create();
        e.validate()?;
        let mut row = e.values()?;
        crypto::seal_row(E::schema(), &mut row)?;
        values.push(row);
    }
    if values.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(oc) = conflict {
        check_columns(E::schema(), oc.columns.iter().copied())?;
        if let ConflictAction::UpdateColumns(cols) = &oc.action {
            check_columns(E::schema(), cols.iter().copied())?;
        }
    }
    let chunks: Vec<&[Map<String, Value>]> =
        values.chunks(sql::rows_per_insert(E::schema())).collect();
    if chunks.len() > 1 && !client.is_tx() {
        let tx = client.tx().await?;
        return match insert_chunks::<E>(tx.client(), &chunks, conflict, returning).await {
            Ok(saved) => {
                tx.commit().await?;
                Ok(saved)
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => Err(err),
                Err(rollback) => Err(DaoError::Rollback {
                    source: Box::new(err),
                    rollback: Box::new(rollback),
                }),
            },
        };
    }
    insert_chunks::<E>(client, &chunks, conflict, returning).await
}

async fn insert_chunks<E: Entity>(
    client: &Client,
    chunks: &[&[Map<String, Value>]],
    conflict: Option<&OnConflict>,
    returning: bool,
) -> Result<Vec<E>, DaoError> {
    let mut saved = Vec::new();
    for chunk in chunks {
        let q = sql::insert(client.schema(), E::schema(), chunk, conflict, returning);
        if returning {
            saved.extend(client.fetch_all::<E>(&q).await?);
        } else {
            client.execute(&q).await?;
        }
    }
    Ok(saved)
}

fn not_found<E: Entity>() -> DaoError {
    DaoError::NotFound {
        entity: E::schema().name,
    }
}

/// INSERT of one row.
pub struct Create<E: Entity> {
    client: Client,
    entity: E,
}

impl<E: Entity> Create<E> {
    pub(crate) fn new(client: Client, entity: E) -> Self {
        Create { client, entity }
    }

    /// Inserts and returns the stored row.
    pub async fn save(mut self) -> Result<E, DaoError> {
        let saved =
            insert_rows(&self.client, std::slice::from_mut(&mut self.entity), None, true).await?;
        saved.into_iter().next().ok_or_else(not_found::<E>)
    }

    pub async fn exec(mut self) -> Result<(), DaoError> {
        insert_rows(&self.client, std::slice::from_mut(&mut self.entity), None, false).await?;
        Ok(())
    }

    /// Inserts, then runs `cb` with the client and the stored row.
    /// Edges of the input entity are carried over to the stored row.
    pub async fn save_e<F>(self, cb: F) -> Result<E, DaoError>
    where
        F: for<'a> FnOnce(&'a Client, &'a E) -> BoxFuture<'a, Result<(), DaoError>>,
    {
        let client = self.client.clone();
        let edges = self.entity.edges().clone();
        let mut saved = self.save().await?;
        *saved.edges_mut() = edges;
        cb(&client, &saved).await?;
        Ok(saved)
    }

    /// Turns the insert into an upsert on the unique `columns`.
    pub fn on_conflict_columns(self, columns: &[&'static str]) -> Upsert<E> {
        Upsert {
            bulk: UpsertBulk::new(self.client, vec![self.entity], columns),
        }
    }
}

/// Multi-row INSERT.
pub struct CreateBulk<E: Entity> {
    client: Client,
    entities: Vec<E>,
}

impl<E: Entity> CreateBulk<E> {
    pub(crate) fn new(client: Client, entities: Vec<E>) -> Self {
        CreateBulk { client, entities }
    }

    pub async fn save(mut self) -> Result<Vec<E>, DaoError> {
        insert_rows(&self.client, &mut self.entities, None, true).await
    }

    pub async fn exec(mut self) -> Result<(), DaoError> {
        insert_rows(&self.client, &mut self.entities, None, false).await?;
        Ok(())
    }

    /// Inserts, then runs `cb` once per stored row.
    pub async fn save_e<F>(self, cb: F) -> Result<Vec<E>, DaoError>
    where
        F: for<'a> Fn(&'a Client, &'a E) -> BoxFuture<'a, Result<(), DaoError>>,
    {
        let client = self.client.clone();
        let edges: Vec<E::Edges> = self.entities.iter().map(|e| e.edges().clone()).collect();
        let mut saved = self.save().await?;
        if saved.len() == edges.len() {
            for (row, e) in saved.iter_mut().zip(edges) {
                *row.edges_mut() = e;
            }
        }
        for row in &saved {
            cb(&client, row).await?;
        }
        Ok(saved)
    }

    pub fn on_conflict_columns(self, columns: &[&'static str]) -> UpsertBulk<E> {
        UpsertBulk::new(self.client, self.entities, columns)
    }
}

/// INSERT ... ON CONFLICT of many rows. Defaults to updating with the new values.
pub struct UpsertBulk<E: Entity> {
    client: Client,
    entities: Vec<E>,
    conflict: OnConflict,
}

impl<E: Entity> UpsertBulk<E> {
    fn new(client: Client, entities: Vec<E>, columns: &[&'static str]) -> Self {
        UpsertBulk {
            client,
            entities,
            conflict: OnConflict {
                columns: columns.to_vec(),
                where_clause: None,
                action: ConflictAction::UpdateNewValues,
            },
        }
    }

    /// Inference predicate selecting a partial unique index.
    pub fn conflict_where(mut self, pred: Predicate<E>) -> Self {
        self.conflict.where_clause = Some(pred.expr);
        self
    }

    pub fn do_nothing(mut self) -> Self {
        self.conflict.action = ConflictAction::DoNothing;
        self
    }

    /// Keeps the stored row untouched but still returns it.
    pub fn ignore(mut self) -> Self {
        self.conflict.action = ConflictAction::Ignore;
        self
    }

    pub fn update_new_values(mut self) -> Self {
        self.conflict.action = ConflictAction::UpdateNewValues;
        self
    }

    pub fn update_columns(mut self, columns: &[&'static str]) -> Self {
        self.conflict.action = ConflictAction::UpdateColumns(columns.to_vec());
        self
    }

    /// Stored rows; with `do_nothing`, conflicting rows are not returned.
    pub async fn save(mut self) -> Result<Vec<E>, DaoError> {
        insert_rows(&self.client, &mut self.entities, Some(&self.conflict), true).await
    }

    pub async fn exec(mut self) -> Result<(), DaoError> {
        insert_rows(&self.client, &mut self.entities, Some(&self.conflict), false).await?;
        Ok(())
    }
}

/// INSERT ... ON CONFLICT of one row.
pub struct Upsert<E: Entity> {
    bulk: UpsertBulk<E>,
}

impl<E: Entity> Upsert<E> {
    pub fn conflict_where(self, pred: Predicate<E>) -> Self {
        Upsert {
            bulk: self.bulk.conflict_where(pred),
        }
    }

    pub fn do_nothing(self) -> Self {
        Upsert {
            bulk: self.bulk.do_nothing(),
        }
    }

    pub fn ignore(self) -> Self {
        Upsert {
            bulk: self.bulk.ignore(),
        }
    }

    pub fn update_new_values(self) -> Self {
        Upsert {
            bulk: self.bulk.update_new_values(),
        }
    }

    pub fn update_columns(self, columns: &[&'static str]) -> Self {
        Upsert {
            bulk: self.bulk.update_columns(columns),
        }
    }

    /// Stored row; `NotFound` when `do_nothing` skipped it.
    pub async fn save(self) -> Result<E, DaoError> {
        self.bulk.save().await?.into_iter().next().ok_or_else(not_found::<E>)
    }

    pub async fn exec(self) -> Result<(), DaoError> {
        self.bulk.exec().await
    }
}
