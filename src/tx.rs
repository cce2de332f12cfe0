//! Transactions with commit and rollback hooks.
//!
//! Hooks are middleware: each receives the next committer (or rollbacker) and
//! returns a wrapper around it. The first registered hook is the outermost, so
//! its code before delegating runs first and its code after delegating runs last.

use crate::client::Client;
use crate::driver::Driver;
use crate::error::DaoError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{Postgres, Transaction};
use std::sync::{Arc, Mutex, PoisonError};

#[async_trait]
pub trait Committer: Send + Sync {
    async fn commit(&self, tx: &Tx) -> Result<(), DaoError>;
}

#[async_trait]
pub trait Rollbacker: Send + Sync {
    async fn rollback(&self, tx: &Tx) -> Result<(), DaoError>;
}

/// Adapts a closure into a `Committer`.
pub struct CommitFn<F>(pub F);

#[async_trait]
impl<F> Committer for CommitFn<F>
where
    F: for<'a> Fn(&'a Tx) -> BoxFuture<'a, Result<(), DaoError>> + Send + Sync,
{
    async fn commit(&self, tx: &Tx) -> Result<(), DaoError> {
        (self.0)(tx).await
    }
}

/// Adapts a closure into a `Rollbacker`.
pub struct RollbackFn<F>(pub F);

#[async_trait]
impl<F> Rollbacker for RollbackFn<F>
where
    F: for<'a> Fn(&'a Tx) -> BoxFuture<'a, Result<(), DaoError>> + Send + Sync,
{
    async fn rollback(&self, tx: &Tx) -> Result<(), DaoError> {
        (self.0)(tx).await
    }
}

pub type CommitHook = Arc<dyn Fn(Arc<dyn Committer>) -> Arc<dyn Committer> + Send + Sync>;
pub type RollbackHook = Arc<dyn Fn(Arc<dyn Rollbacker>) -> Arc<dyn Rollbacker> + Send + Sync>;

/// Wraps `base` in `hooks`, first hook outermost.
pub(crate) fn chain<C: ?Sized>(
    base: Arc<C>,
    hooks: &[Arc<dyn Fn(Arc<C>) -> Arc<C> + Send + Sync>],
) -> Arc<C> {
    hooks.iter().rev().fold(base, |next, hook| hook(next))
}

/// Shared state of an open transaction.
pub struct TxDriver {
    pub(crate) tx: tokio::sync::Mutex<Option<Transaction<'static, Postgres>>>,
    on_commit: Mutex<Vec<CommitHook>>,
    on_rollback: Mutex<Vec<RollbackHook>>,
}

impl TxDriver {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        TxDriver {
            tx: tokio::sync::Mutex::new(Some(tx)),
            on_commit: Mutex::new(Vec::new()),
            on_rollback: Mutex::new(Vec::new()),
        }
    }

    fn commit_hooks(&self) -> Vec<CommitHook> {
        self.on_commit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn rollback_hooks(&self) -> Vec<RollbackHook> {
        self.on_rollback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct TxCommitter;

#[async_trait]
impl Committer for TxCommitter {
    async fn commit(&self, tx: &Tx) -> Result<(), DaoError> {
        let inner = tx.driver.tx.lock().await.take().ok_or(DaoError::TxFinished)?;
        inner.commit().await?;
        tracing::debug!("transaction committed");
        Ok(())
    }
}

struct TxRollbacker;

#[async_trait]
impl Rollbacker for TxRollbacker {
    async fn rollback(&self, tx: &Tx) -> Result<(), DaoError> {
        let inner = tx.driver.tx.lock().await.take().ok_or(DaoError::TxFinished)?;
        inner.rollback().await?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}

/// An open transaction. Builders obtained through `client()` run inside it.
pub struct Tx {
    driver: Arc<TxDriver>,
    client: Client,
}

impl Tx {
    pub(crate) fn begin(base: &Client, tx: Transaction<'static, Postgres>) -> Self {
        let driver = Arc::new(TxDriver::new(tx));
        let client = base.with_driver(Driver::Tx(driver.clone()));
        tracing::debug!("transaction started");
        Tx { driver, client }
    }

    /// Client bound to this transaction.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Registers commit middleware.
    pub fn on_commit<F>(&self, hook: F)
    where
        F: Fn(Arc<dyn Committer>) -> Arc<dyn Committer> + Send + Sync + 'static,
    {
        self.driver
            .on_commit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    /// Registers rollback middleware.
    pub fn on_rollback<F>(&self, hook: F)
    where
        F: Fn(Arc<dyn Rollbacker>) -> Arc<dyn Rollbacker> + Send + Sync + 'static,
    {
        self.driver
            .on_rollback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    /// Commits through the registered hooks.
    pub async fn commit(&self) -> Result<(), DaoError> {
        let hooks = self.driver.commit_hooks();
        let committer = chain::<dyn Committer>(Arc::new(TxCommitter), &hooks);
        committer.commit(self).await
    }

    /// Rolls back through the registered hooks.
    pub async fn rollback(&self) -> Result<(), DaoError> {
        let hooks = self.driver.rollback_hooks();
        let rollbacker = chain::<dyn Rollbacker>(Arc::new(TxRollbacker), &hooks);
        rollbacker.rollback(self).await
    }

    /// Whether commit or rollback already ran.
    pub async fn is_finished(&self) -> bool {
        self.driver.tx.lock().await.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    trait Step: Send + Sync {
        fn run(&self, log: &StdMutex<Vec<String>>);
    }

    struct Base;

    impl Step for Base {
        fn run(&self, log: &StdMutex<Vec<String>>) {
            log.lock().unwrap().push("commit".into());
        }
    }

    struct Wrap {
        name: &'static str,
        next: Arc<dyn Step>,
    }

    impl Step for Wrap {
        fn run(&self, log: &StdMutex<Vec<String>>) {
            log.lock().unwrap().push(format!("{} before", self.name));
            self.next.run(log);
            log.lock().unwrap().push(format!("{} after", self.name));
        }
    }

    fn hook(name: &'static str) -> Arc<dyn Fn(Arc<dyn Step>) -> Arc<dyn Step> + Send + Sync> {
        Arc::new(move |next| Arc::new(Wrap { name, next }) as Arc<dyn Step>)
    }

    #[test]
    fn first_registered_hook_is_outermost() {
        let hooks = vec![hook("first"), hook("second")];
        let step = chain::<dyn Step>(Arc::new(Base), &hooks);
        let log = StdMutex::new(Vec::new());
        step.run(&log);
        assert_eq!(
            log.into_inner().unwrap(),
            vec!["first before", "second before", "commit", "second after", "first after"]
        );
    }

    #[test]
    fn no_hooks_returns_base() {
        let step = chain::<dyn Step>(Arc::new(Base), &[]);
        let log = StdMutex::new(Vec::new());
        step.run(&log);
        assert_eq!(log.into_inner().unwrap(), vec!["commit"]);
    }
}
