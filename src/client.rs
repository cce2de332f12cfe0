//! Entry point of the data-access layer.

use crate::builder::{Create, CreateBulk, Delete, DeleteOne, Query, Update, UpdateOne};
use crate::driver::Driver;
use crate::entity::{Edge, Entity};
use crate::error::DaoError;
use crate::model::*;
use crate::predicate::{CmpOp, Expr, Predicate};
use crate::sql::QueryBuf;
use crate::tx::Tx;
use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Cheap to clone; routes statements through a pool or a transaction.
#[derive(Clone, Debug)]
pub struct Client {
    driver: Driver,
    schema: Arc<str>,
    debug: bool,
}

impl Client {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Client {
            driver: Driver::Pool(pool),
            schema: Arc::from(schema.into()),
            debug: false,
        }
    }

    /// Same client, logging every statement at info level.
    pub fn debug(&self) -> Client {
        Client {
            debug: true,
            ..self.clone()
        }
    }

    pub(crate) fn with_driver(&self, driver: Driver) -> Client {
        Client {
            driver,
            ..self.clone()
        }
    }

    /// PostgreSQL schema holding the tables.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn pool(&self) -> Option<&PgPool> {
        match &self.driver {
            Driver::Pool(p) => Some(p),
            Driver::Tx(_) => None,
        }
    }

    pub fn is_tx(&self) -> bool {
        self.driver.is_tx()
    }

    /// Begins a transaction. Fails with `NestedTx` on a transaction-bound client.
    pub async fn tx(&self) -> Result<Tx, DaoError> {
        let Driver::Pool(pool) = &self.driver else {
            return Err(DaoError::NestedTx);
        };
        let tx = pool.begin().await?;
        Ok(Tx::begin(self, tx))
    }

    /// Runs `f` in a transaction: commit on `Ok`, rollback on `Err` or panic.
    ///
    /// A panic is re-raised after the rollback.
    pub async fn with_tx<T, F>(&self, f: F) -> Result<T, DaoError>
    where
        F: for<'a> FnOnce(&'a Tx) -> BoxFuture<'a, Result<T, DaoError>>,
    {
        let tx = self.tx().await?;
        let outcome = AssertUnwindSafe(async { f(&tx).await }).catch_unwind().await;
        match outcome {
            Ok(Ok(v)) => {
                tx.commit().await?;
                Ok(v)
            }
            Ok(Err(err)) => match tx.rollback().await {
                Ok(()) => Err(err),
                Err(rollback) => Err(DaoError::Rollback {
                    source: Box::new(err),
                    rollback: Box::new(rollback),
                }),
            },
            Err(panic) => {
                if let Err(err) = tx.rollback().await {
                    tracing::error!(error = %err, "rollback after panic failed");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    pub fn entity<E: Entity>(&self) -> EntityClient<E> {
        EntityClient {
            client: self.clone(),
            _entity: PhantomData,
        }
    }

    pub fn roles(&self) -> EntityClient<Role> {
        self.entity()
    }

    pub fn subjects(&self) -> EntityClient<Subject> {
        self.entity()
    }

    pub fn subject_role_relationships(&self) -> EntityClient<SubjectRoleRelationship> {
        self.entity()
    }

    pub fn tokens(&self) -> EntityClient<Token> {
        self.entity()
    }

    pub fn projects(&self) -> EntityClient<Project> {
        self.entity()
    }

    pub fn environments(&self) -> EntityClient<Environment> {
        self.entity()
    }

    pub fn connectors(&self) -> EntityClient<Connector> {
        self.entity()
    }

    pub fn environment_connector_relationships(
        &self,
    ) -> EntityClient<EnvironmentConnectorRelationship> {
        self.entity()
    }

    pub fn catalogs(&self) -> EntityClient<Catalog> {
        self.entity()
    }

    pub fn modules(&self) -> EntityClient<Module> {
        self.entity()
    }

    pub fn module_versions(&self) -> EntityClient<ModuleVersion> {
        self.entity()
    }

    pub fn resource_definition_matching_rules(
        &self,
    ) -> EntityClient<ResourceDefinitionMatchingRule> {
        self.entity()
    }

    pub fn applications(&self) -> EntityClient<Application> {
        self.entity()
    }

    pub fn application_module_relationships(&self) -> EntityClient<ApplicationModuleRelationship> {
        self.entity()
    }

    pub fn application_instances(&self) -> EntityClient<ApplicationInstance> {
        self.entity()
    }

    pub fn application_revisions(&self) -> EntityClient<ApplicationRevision> {
        self.entity()
    }

    pub fn application_resources(&self) -> EntityClient<ApplicationResource> {
        self.entity()
    }

    pub fn perspectives(&self) -> EntityClient<Perspective> {
        self.entity()
    }

    pub fn allocation_costs(&self) -> EntityClient<AllocationCost> {
        self.entity()
    }

    pub fn cluster_costs(&self) -> EntityClient<ClusterCost> {
        self.entity()
    }

    pub fn settings(&self) -> EntityClient<Setting> {
        self.entity()
    }

    pub(crate) async fn fetch_all<T>(&self, q: &QueryBuf) -> Result<Vec<T>, DaoError>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        self.driver.fetch_all(q, self.debug).await
    }

    pub(crate) async fn fetch_rows(&self, q: &QueryBuf) -> Result<Vec<PgRow>, DaoError> {
        self.driver.fetch_rows(q, self.debug).await
    }

    pub(crate) async fn fetch_scalars<T>(&self, q: &QueryBuf) -> Result<Vec<T>, DaoError>
    where
        (T,): for<'r> sqlx::FromRow<'r, PgRow>,
        T: Send + Unpin,
    {
        self.driver.fetch_scalars(q, self.debug).await
    }

    pub(crate) async fn execute(&self, q: &QueryBuf) -> Result<u64, DaoError> {
        self.driver.execute(q, self.debug).await
    }
}

/// Builders for one entity type.
pub struct EntityClient<E> {
    client: Client,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityClient<E> {
    fn clone(&self) -> Self {
        EntityClient {
            client: self.client.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityClient<E> {
    pub fn query(&self) -> Query<E> {
        Query::new(self.client.clone())
    }

    /// The row with the given key, or `NotFound`.
    pub async fn get(&self, id: &E::Id) -> Result<E, DaoError> {
        self.query().filter(E::id_predicate(id)).only().await
    }

    pub fn create(&self, entity: E) -> Create<E> {
        Create::new(self.client.clone(), entity)
    }

    pub fn create_bulk(&self, entities: Vec<E>) -> CreateBulk<E> {
        CreateBulk::new(self.client.clone(), entities)
    }

    pub fn update(&self) -> Update<E> {
        Update::new(self.client.clone())
    }

    /// Update of the row behind `entity`; `set_obj` diffs against it.
    pub fn update_one(&self, entity: E) -> UpdateOne<E> {
        UpdateOne::from_entity(self.client.clone(), entity)
    }

    pub fn update_one_id(&self, id: E::Id) -> UpdateOne<E> {
        UpdateOne::from_id(self.client.clone(), id)
    }

    pub fn delete(&self) -> Delete<E> {
        Delete::new(self.client.clone())
    }

    pub fn delete_one(&self, entity: &E) -> DeleteOne<E> {
        DeleteOne::new(self.client.clone(), entity.id())
    }

    pub fn delete_one_id(&self, id: E::Id) -> DeleteOne<E> {
        DeleteOne::new(self.client.clone(), id)
    }

    /// Rows of `R` related to `entity` over `edge`.
    pub fn query_edge_of<R: Entity>(&self, entity: &E, edge: Edge<E, R>) -> Query<R> {
        let value = entity.column_value(edge.from);
        let pred = if value.is_null() {
            Expr::Or(Vec::new())
        } else {
            Expr::Cmp {
                column: edge.to,
                op: CmpOp::Eq,
                value,
            }
        };
        Query::new(self.client.clone()).filter(Predicate::from_expr(pred))
    }
}
