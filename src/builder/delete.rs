use crate::client::Client;
use crate::entity::Entity;
use crate::error::DaoError;
use crate::predicate::{Expr, Predicate};
use crate::sql;

/// DELETE of every row matching the filters.
pub struct Delete<E: Entity> {
    client: Client,
    preds: Vec<Expr>,
    _entity: std::marker::PhantomData<fn() -> E>,
}

impl<E: Entity> Delete<E> {
    pub(crate) fn new(client: Client) -> Self {
        Delete {
            client,
            preds: Vec::new(),
            _entity: std::marker::PhantomData,
        }
    }

    pub fn filter(mut self, pred: Predicate<E>) -> Self {
        self.preds.push(pred.expr);
        self
    }

    /// Number of deleted rows.
    pub async fn exec(self) -> Result<u64, DaoError> {
        let q = sql::delete(self.client.schema(), E::schema(), &self.preds);
        self.client.execute(&q).await
    }
}

/// DELETE of one row by key.
pub struct DeleteOne<E: Entity> {
    inner: Delete<E>,
}

impl<E: Entity> DeleteOne<E> {
    pub(crate) fn new(client: Client, id: E::Id) -> Self {
        DeleteOne {
            inner: Delete::new(client).filter(E::id_predicate(&id)),
        }
    }

    pub fn filter(self, pred: Predicate<E>) -> Self {
        DeleteOne {
            inner: self.inner.filter(pred),
        }
    }

    /// `NotFound` when nothing was deleted.
    pub async fn exec(self) -> Result<(), DaoError> {
        match self.inner.exec().await? {
            0 => Err(DaoError::NotFound {
                entity: E::schema().name,
            }),
            _ => Ok(()),
        }
    }
}
