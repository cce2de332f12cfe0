//! CRUD handlers over every exposed entity. The path segment selects a
//! [`Resource`] from the registry; each resource converts JSON to the entity's
//! views and runs the typed builders. Writes run in one transaction, with the
//! row locked and narrowed to the request's project.

use crate::client::Client;
use crate::error::AppError;
use crate::extractors::ProjectScope;
use crate::model::{
    Application, ApplicationInstance, ApplicationResource, ApplicationRevision, Catalog, Connector,
    Environment, Module, ModuleVersion, Perspective, Project, Role, Setting, Subject, Token,
};
use crate::predicate::{CmpOp, Expr, Order, Predicate};
use crate::response::{success_many, success_many_created, success_one, success_one_ok};
use crate::state::AppState;
use crate::tx::Tx;
use crate::validation::{check_bulk_size, ColumnFilter, ListParams};
use crate::view::{ApiEntity, Operation};
use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased CRUD over one entity, in JSON.
#[async_trait]
pub trait Resource: Send + Sync {
    fn path(&self) -> &'static str;

    fn operations(&self) -> &'static [Operation];

    /// Page of rows and the total number matching the filters.
    async fn list(
        &self,
        client: &Client,
        scope: ProjectScope,
        query: &HashMap<String, String>,
    ) -> Result<(Vec<Value>, u64), AppError>;

    async fn read(&self, client: &Client, scope: ProjectScope, id: &str) -> Result<Value, AppError>;

    async fn create(
        &self,
        client: &Client,
        scope: ProjectScope,
        body: Value,
    ) -> Result<Value, AppError>;

    async fn update(
        &self,
        client: &Client,
        scope: ProjectScope,
        id: &str,
        body: Value,
    ) -> Result<Value, AppError>;

    async fn delete(&self, client: &Client, scope: ProjectScope, id: &str) -> Result<(), AppError>;

    async fn bulk_create(
        &self,
        client: &Client,
        scope: ProjectScope,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, AppError>;

    async fn bulk_delete(
        &self,
        client: &Client,
        scope: ProjectScope,
        ids: Vec<String>,
    ) -> Result<u64, AppError>;
}

pub struct EntityResource<E>(PhantomData<fn() -> E>);

impl<E> Default for EntityResource<E> {
    fn default() -> Self {
        EntityResource(PhantomData)
    }
}

fn bad_body(err: serde_json::Error) -> AppError {
    AppError::BadRequest(format!("invalid body: {err}"))
}

fn output<E: ApiEntity>(row: E) -> Result<Value, AppError> {
    serde_json::to_value(row.output()).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn created_output<E: ApiEntity>(row: E) -> Result<Value, AppError> {
    serde_json::to_value(row.create_output()).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn id_value<E: ApiEntity>(id: &E::Id) -> Result<Value, AppError> {
    serde_json::to_value(id).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Predicate on the request's project for project-owned entities.
fn scope_predicate<E: ApiEntity>(scope: ProjectScope) -> Option<Predicate<E>> {
    match (E::PROJECT_COLUMN, scope.0) {
        (Some(column), Some(project_id)) => Some(Predicate::from_expr(Expr::Cmp {
            column,
            op: CmpOp::Eq,
            value: Value::String(project_id.to_string()),
        })),
        _ => None,
    }
}

/// Narrows to the request's project for project-owned entities.
fn scoped<E: ApiEntity>(client: &Client, scope: ProjectScope) -> crate::builder::Query<E> {
    let query = client.entity::<E>().query();
    match scope_predicate::<E>(scope) {
        Some(pred) => query.filter(pred),
        None => query,
    }
}

fn filter_predicate<E>(f: ColumnFilter) -> Predicate<E> {
    Predicate::from_expr(match f.value {
        Some(value) => Expr::Cmp {
            column: f.column,
            op: CmpOp::Eq,
            value,
        },
        None => Expr::Null {
            column: f.column,
            negated: false,
        },
    })
}

fn keys_in<E: ApiEntity>(ids: Vec<Value>) -> Predicate<E> {
    Predicate::from_expr(Expr::In {
        column: E::schema().primary_key[0],
        values: ids,
        negated: false,
    })
}

/// Begins a transaction unless the client is already bound to one.
async fn begin(client: &Client) -> Result<(Client, Option<Tx>), AppError> {
    if client.is_tx() {
        return Ok((client.clone(), None));
    }
    let tx = client.tx().await?;
    Ok((tx.client().clone(), Some(tx)))
}

/// Commits on success and rolls back on failure. A joined transaction is left
/// to its owner.
async fn finish<T>(tx: Option<Tx>, outcome: Result<T, AppError>) -> Result<T, AppError> {
    let Some(tx) = tx else {
        return outcome;
    };
    match outcome {
        Ok(v) => {
            tx.commit().await?;
            Ok(v)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::error!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

/// The row with the edges its output shows.
async fn reload<E: ApiEntity>(client: &Client, id: &E::Id) -> Result<E, AppError> {
    let query = client.entity::<E>().query().filter(E::id_predicate(id));
    Ok(E::with_edges(query).only().await?)
}

#[async_trait]
impl<E: ApiEntity> Resource for EntityResource<E> {
    fn path(&self) -> &'static str {
        E::PATH
    }

    fn operations(&self) -> &'static [Operation] {
        E::OPERATIONS
    }

    async fn list(
        &self,
        client: &Client,
        scope: ProjectScope,
        query: &HashMap<String, String>,
    ) -> Result<(Vec<Value>, u64), AppError> {
        let params = ListParams::parse(E::schema(), query)?;
        let mut q = scoped::<E>(client, scope);
        if let Some(pred) = E::list_filter() {
            q = q.filter(pred);
        }
        for f in &params.filters {
            q = q.filter(filter_predicate(f.clone()));
        }
        let total = q.clone().count().await?;
        for (column, desc) in &params.sort {
            q = q.order(Order::new(*column, *desc));
        }
        let rows = E::with_edges(q.limit(params.limit).offset(params.offset)).all().await?;
        let data = rows.into_iter().map(output).collect::<Result<Vec<_>, _>>()?;
        Ok((data, total.max(0) as u64))
    }

    async fn read(
        &self,
        client: &Client,
        scope: ProjectScope,
        id: &str,
    ) -> Result<Value, AppError> {
        let id = E::parse_id(id)?;
        let query = scoped::<E>(client, scope).filter(E::id_predicate(&id));
        let row = E::with_edges(query).only().await?;
        output(row)
    }

    async fn create(
        &self,
        client: &Client,
        scope: ProjectScope,
        body: Value,
    ) -> Result<Value, AppError> {
        let input: E::CreateInput = serde_json::from_value(body).map_err(bad_body)?;
        let model = E::into_model(input, scope.0)?;
        let (c, tx) = begin(client).await?;
        let outcome = async {
            let saved = c
                .entity::<E>()
                .create(model)
                .save_e(|c, row| row.save_edges(c))
                .await?;
            Ok::<E, AppError>(reload::<E>(&c, &saved.id()).await?)
        }
        .await;
        let saved = finish(tx, outcome).await?;
        tracing::info!(resource = E::PATH, id = ?saved.id(), "created");
        created_output(saved)
    }

    async fn update(
        &self,
        client: &Client,
        scope: ProjectScope,
        id: &str,
        body: Value,
    ) -> Result<Value, AppError> {
        let id = E::parse_id(id)?;
        let input: E::UpdateInput = serde_json::from_value(body).map_err(bad_body)?;
        let (c, tx) = begin(client).await?;
        let outcome = async {
            let mut next = scoped::<E>(&c, scope)
                .filter(E::id_predicate(&id))
                .for_update()
                .only()
                .await?;
            next.apply_update(input)?;
            let mut update = c.entity::<E>().update_one_id(id.clone()).set_obj(next);
            if let Some(pred) = scope_predicate::<E>(scope) {
                update = update.filter(pred);
            }
            let saved = update.save().await?;
            saved.save_edges(&c).await?;
            Ok::<E, AppError>(reload::<E>(&c, &id).await?)
        }
        .await;
        let saved = finish(tx, outcome).await?;
        tracing::info!(resource = E::PATH, id = ?saved.id(), "updated");
        output(saved)
    }

    async fn delete(&self, client: &Client, scope: ProjectScope, id: &str) -> Result<(), AppError> {
        let id = E::parse_id(id)?;
        let (c, tx) = begin(client).await?;
        let outcome = async {
            let stored = scoped::<E>(&c, scope)
                .filter(E::id_predicate(&id))
                .for_update()
                .only()
                .await?;
            stored.check_delete()?;
            let mut delete = c.entity::<E>().delete_one_id(id.clone());
            if let Some(pred) = scope_predicate::<E>(scope) {
                delete = delete.filter(pred);
            }
            delete.exec().await?;
            Ok::<(), AppError>(())
        }
        .await;
        finish(tx, outcome).await?;
        tracing::info!(resource = E::PATH, id = ?id, "deleted");
        Ok(())
    }

    async fn bulk_create(
        &self,
        client: &Client,
        scope: ProjectScope,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, AppError> {
        check_bulk_size(items.len())?;
        let mut models = Vec::with_capacity(items.len());
        for item in items {
            let input: E::CreateInput = serde_json::from_value(item).map_err(bad_body)?;
            models.push(E::into_model(input, scope.0)?);
        }
        let (c, tx) = begin(client).await?;
        let outcome = async {
            let saved = c
                .entity::<E>()
                .create_bulk(models)
                .save_e(|c, row| row.save_edges(c))
                .await?;
            let keys = saved
                .iter()
                .map(|row| id_value::<E>(&row.id()))
                .collect::<Result<Vec<_>, _>>()?;
            let mut loaded = HashMap::with_capacity(keys.len());
            for row in E::with_edges(c.entity::<E>().query().filter(keys_in(keys.clone())))
                .all()
                .await?
            {
                loaded.insert(id_value::<E>(&row.id())?.to_string(), row);
            }
            // Input order.
            let rows = saved
                .into_iter()
                .zip(&keys)
                .map(|(row, key)| loaded.remove(&key.to_string()).unwrap_or(row))
                .collect::<Vec<E>>();
            Ok::<Vec<E>, AppError>(rows)
        }
        .await;
        let saved = finish(tx, outcome).await?;
        tracing::info!(resource = E::PATH, count = saved.len(), "bulk created");
        saved.into_iter().map(created_output).collect()
    }

    async fn bulk_delete(
        &self,
        client: &Client,
        scope: ProjectScope,
        ids: Vec<String>,
    ) -> Result<u64, AppError> {
        check_bulk_size(ids.len())?;
        let mut keys = Vec::with_capacity(ids.len());
        for raw in &ids {
            keys.push(id_value::<E>(&E::parse_id(raw)?)?);
        }
        keys.sort_by_key(|v| v.to_string());
        keys.dedup();
        let (c, tx) = begin(client).await?;
        let outcome = async {
            let stored = scoped::<E>(&c, scope)
                .filter(keys_in(keys.clone()))
                .for_update()
                .all()
                .await?;
            if stored.len() != keys.len() {
                return Err(AppError::NotFound(format!("{}: some ids do not exist", E::PATH)));
            }
            for row in &stored {
                row.check_delete()?;
            }
            let mut delete = c.entity::<E>().delete().filter(keys_in(keys));
            if let Some(pred) = scope_predicate::<E>(scope) {
                delete = delete.filter(pred);
            }
            Ok::<u64, AppError>(delete.exec().await?)
        }
        .await;
        let deleted = finish(tx, outcome).await?;
        tracing::info!(resource = E::PATH, count = deleted, "bulk deleted");
        Ok(deleted)
    }
}

/// Exposed resources by path segment.
#[derive(Default)]
pub struct Registry {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
}

impl Registry {
    pub fn register<E: ApiEntity>(&mut self) -> &mut Self {
        self.resources.insert(E::PATH, Arc::new(EntityResource::<E>::default()));
        self
    }

    /// Every entity with a REST surface.
    pub fn standard() -> Self {
        let mut r = Registry::default();
        r.register::<Role>()
            .register::<Subject>()
            .register::<Token>()
            .register::<Project>()
            .register::<Environment>()
            .register::<Connector>()
            .register::<Catalog>()
            .register::<Module>()
            .register::<ModuleVersion>()
            .register::<Application>()
            .register::<ApplicationInstance>()
            .register::<ApplicationRevision>()
            .register::<ApplicationResource>()
            .register::<Perspective>()
            .register::<Setting>();
        r
    }

    pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    /// The resource at `path`, if it allows `op`.
    pub fn resolve(&self, path: &str, op: Operation) -> Result<Arc<dyn Resource>, AppError> {
        let r = self
            .resources
            .get(path)
            .ok_or_else(|| AppError::NotFound(format!("unknown resource {path:?}")))?;
        if !r.operations().contains(&op) {
            return Err(AppError::NotAllowed(format!("{} is not supported on {path}", op.as_str())));
        }
        Ok(Arc::clone(r))
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    scope: ProjectScope,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let r = state.registry.resolve(&resource, Operation::List)?;
    let (rows, total) = r.list(&state.client, scope, &params).await?;
    Ok(success_many(rows, total))
}

pub async fn read(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    scope: ProjectScope,
) -> Result<impl IntoResponse, AppError> {
    let r = state.registry.resolve(&resource, Operation::Read)?;
    Ok(success_one_ok(r.read(&state.client, scope, &id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    scope: ProjectScope,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let r = state.registry.resolve(&resource, Operation::Create)?;
    Ok(success_one(r.create(&state.client, scope, body).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    scope: ProjectScope,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let r = state.registry.resolve(&resource, Operation::Update)?;
    Ok(success_one_ok(r.update(&state.client, scope, &id, body).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    scope: ProjectScope,
) -> Result<StatusCode, AppError> {
    let r = state.registry.resolve(&resource, Operation::Delete)?;
    r.delete(&state.client, scope, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    scope: ProjectScope,
    Json(items): Json<Vec<Value>>,
) -> Result<impl IntoResponse, AppError> {
    let r = state.registry.resolve(&resource, Operation::BulkCreate)?;
    Ok(success_many_created(r.bulk_create(&state.client, scope, items).await?))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteBody {
    pub items: Vec<BulkDeleteItem>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteItem {
    pub id: Value,
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    scope: ProjectScope,
    Json(body): Json<BulkDeleteBody>,
) -> Result<impl IntoResponse, AppError> {
    let r = state.registry.resolve(&resource, Operation::BulkDelete)?;
    let ids = body
        .items
        .into_iter()
        .map(|item| match item.id {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();
    let deleted = r.bulk_delete(&state.client, scope, ids).await?;
    Ok(success_one_ok(json!({ "deleted": deleted })))
}
