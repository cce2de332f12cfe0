//! Statement execution over a pool or an open transaction.

use crate::error::DaoError;
use crate::sql::QueryBuf;
use crate::tx::TxDriver;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{Query, QueryAs, QueryScalar};
use sqlx::{PgPool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub enum Driver {
    Pool(PgPool),
    Tx(Arc<TxDriver>),
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Driver::Pool(_) => f.write_str("Driver::Pool"),
            Driver::Tx(_) => f.write_str("Driver::Tx"),
        }
    }
}

fn log(q: &QueryBuf, debug: bool) {
    if debug {
        tracing::info!(sql = %q.sql, params = ?q.params, "query");
    } else {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    }
}

fn bind<'q>(q: &'q QueryBuf) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

fn bind_as<'q, T>(q: &'q QueryBuf) -> QueryAs<'q, Postgres, T, PgArguments>
where
    T: for<'r> sqlx::FromRow<'r, PgRow>,
{
    let mut query = sqlx::query_as::<_, T>(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

fn bind_scalar<'q, T>(q: &'q QueryBuf) -> QueryScalar<'q, Postgres, T, PgArguments>
where
    (T,): for<'r> sqlx::FromRow<'r, PgRow>,
{
    let mut query = sqlx::query_scalar::<_, T>(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

impl Driver {
    pub fn is_tx(&self) -> bool {
        matches!(self, Driver::Tx(_))
    }

    /// Rows decoded into `T`.
    pub async fn fetch_all<T>(&self, q: &QueryBuf, debug: bool) -> Result<Vec<T>, DaoError>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        log(q, debug);
        let query = bind_as::<T>(q);
        let rows = match self {
            Driver::Pool(pool) => query.fetch_all(pool).await?,
            Driver::Tx(t) => {
                let mut guard = t.tx.lock().await;
                let tx = guard.as_mut().ok_or(DaoError::TxFinished)?;
                query.fetch_all(&mut **tx).await?
            }
        };
        Ok(rows)
    }

    /// Raw rows, for selections that do not map onto an entity.
    pub async fn fetch_rows(&self, q: &QueryBuf, debug: bool) -> Result<Vec<PgRow>, DaoError> {
        log(q, debug);
        let query = bind(q);
        let rows = match self {
            Driver::Pool(pool) => query.fetch_all(pool).await?,
            Driver::Tx(t) => {
                let mut guard = t.tx.lock().await;
                let tx = guard.as_mut().ok_or(DaoError::TxFinished)?;
                query.fetch_all(&mut **tx).await?
            }
        };
        Ok(rows)
    }

    /// First column of every row.
    pub async fn fetch_scalars<T>(&self, q: &QueryBuf, debug: bool) -> Result<Vec<T>, DaoError>
    where
        (T,): for<'r> sqlx::FromRow<'r, PgRow>,
        T: Send + Unpin,
    {
        log(q, debug);
        let query = bind_scalar::<T>(q);
        let rows = match self {
            Driver::Pool(pool) => query.fetch_all(pool).await?,
            Driver::Tx(t) => {
                let mut guard = t.tx.lock().await;
                let tx = guard.as_mut().ok_or(DaoError::TxFinished)?;
                query.fetch_all(&mut **tx).await?
            }
        };
        Ok(rows)
    }

    /// Number of affected rows.
    pub async fn execute(&self, q: &QueryBuf, debug: bool) -> Result<u64, DaoError> {
        log(q, debug);
        let query = bind(q);
        let result = match self {
            Driver::Pool(pool) => query.execute(pool).await?,
            Driver::Tx(t) => {
                let mut guard = t.tx.lock().await;
                let tx = guard.as_mut().ok_or(DaoError::TxFinished)?;
                query.execute(&mut **tx).await?
            }
        };
        Ok(result.rows_affected())
    }
}
