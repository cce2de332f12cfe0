//! Synchronisation of relationship rows against a desired set.
//!
//! Each function upserts the wanted edges and deletes the stale ones. On a
//! transaction-bound client both steps join that transaction, otherwise they
//! run in a transaction of their own.

use crate::client::Client;
use crate::error::DaoError;
use crate::model::{
    application_module_relationship as amr, environment_connector_relationship as ecr,
    subject_role_relationship as srr, ApplicationModuleRelationship,
    EnvironmentConnectorRelationship, SubjectRoleRelationship,
};
use crate::predicate::Predicate;
use uuid::Uuid;

/// Makes the global (project-less) roles of a subject equal to `role_ids`.
pub async fn sync_subject_roles(
    client: &Client,
    subject_id: Uuid,
    role_ids: &[String],
) -> Result<(), DaoError> {
    if client.is_tx() {
        return subject_roles(client, subject_id, role_ids).await;
    }
    let role_ids = role_ids.to_vec();
    client
        .with_tx(move |tx| {
            Box::pin(async move { subject_roles(tx.client(), subject_id, &role_ids).await })
        })
        .await
}

async fn subject_roles(
    client: &Client,
    subject_id: Uuid,
    role_ids: &[String],
) -> Result<(), DaoError> {
    let rows: Vec<SubjectRoleRelationship> = role_ids
        .iter()
        .map(|role_id| SubjectRoleRelationship {
            subject_id,
            role_id: role_id.clone(),
            ..Default::default()
        })
        .collect();
    if !rows.is_empty() {
        client
            .subject_role_relationships()
            .create_bulk(rows)
            .on_conflict_columns(&["subject_id", "role_id"])
            .conflict_where(srr::PROJECT_ID.is_null())
            .do_nothing()
            .exec()
            .await?;
    }
    let removed = client
        .subject_role_relationships()
        .delete()
        .filter(srr::SUBJECT_ID.eq(subject_id))
        .filter(srr::PROJECT_ID.is_null())
        .filter(srr::ROLE_ID.not_in(role_ids.iter().cloned()))
        .exec()
        .await?;
    tracing::debug!(%subject_id, roles = role_ids.len(), removed, "synced subject roles");
    Ok(())
}

/// Makes the connectors bound to an environment equal to `connector_ids`.
pub async fn sync_environment_connectors(
    client: &Client,
    environment_id: Uuid,
    connector_ids: &[Uuid],
) -> Result<(), DaoError> {
    if client.is_tx() {
        return environment_connectors(client, environment_id, connector_ids).await;
    }
    let connector_ids = connector_ids.to_vec();
    client
        .with_tx(move |tx| {
            Box::pin(async move {
                environment_connectors(tx.client(), environment_id, &connector_ids).await
            })
        })
        .await
}

async fn environment_connectors(
    client: &Client,
    environment_id: Uuid,
    connector_ids: &[Uuid],
) -> Result<(), DaoError> {
    let rows: Vec<EnvironmentConnectorRelationship> = connector_ids
        .iter()
        .map(|connector_id| EnvironmentConnectorRelationship::new(environment_id, *connector_id))
        .collect();
    if !rows.is_empty() {
        client
            .environment_connector_relationships()
            .create_bulk(rows)
            .on_conflict_columns(&["environment_id", "connector_id"])
            .do_nothing()
            .exec()
            .await?;
    }
    let removed = client
        .environment_connector_relationships()
        .delete()
        .filter(ecr::ENVIRONMENT_ID.eq(environment_id))
        .filter(ecr::CONNECTOR_ID.not_in(connector_ids.iter().copied()))
        .exec()
        .await?;
    tracing::debug!(
        %environment_id,
        connectors = connector_ids.len(),
        removed,
        "synced environment connectors"
    );
    Ok(())
}

/// Makes the modules of an application equal to `modules`, keyed by
/// (module, name). Version and attributes of kept modules are overwritten.
pub async fn sync_application_modules(
    client: &Client,
    application_id: Uuid,
    modules: &[ApplicationModuleRelationship],
) -> Result<(), DaoError> {
    if client.is_tx() {
        return application_modules(client, application_id, modules).await;
    }
    let modules = modules.to_vec();
    client
        .with_tx(move |tx| {
            Box::pin(async move {
                application_modules(tx.client(), application_id, &modules).await
            })
        })
        .await
}

async fn application_modules(
    client: &Client,
    application_id: Uuid,
    modules: &[ApplicationModuleRelationship],
) -> Result<(), DaoError> {
    let rows: Vec<ApplicationModuleRelationship> = modules
        .iter()
        .map(|m| ApplicationModuleRelationship {
            application_id,
            ..m.clone()
        })
        .collect();
    if !rows.is_empty() {
        client
            .application_module_relationships()
            .create_bulk(rows)
            .on_conflict_columns(&["application_id", "module_id", "name"])
            .update_columns(&["version", "attributes"])
            .exec()
            .await?;
    }
    let keep = modules.iter().map(|m| {
        Predicate::and([amr::MODULE_ID.eq(m.module_id.clone()), amr::NAME.eq(m.name.clone())])
    });
    let removed = client
        .application_module_relationships()
        .delete()
        .filter(amr::APPLICATION_ID.eq(application_id))
        .filter(Predicate::not(Predicate::or(keep)))
        .exec()
        .await?;
    tracing::debug!(
        %application_id,
        modules = modules.len(),
        removed,
        "synced application modules"
    );
    Ok(())
}
