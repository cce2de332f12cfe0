use super::{parse_uuid, patch, require_project, ApiEntity, Operation, Ref, ALL_OPERATIONS};
use crate::builder::Query;
use crate::client::Client;
use crate::dao;
use crate::error::{AppError, DaoError};
use crate::model::environment::EnvironmentEdges;
use crate::model::{
    connector, environment, environment_connector_relationship as ecr, Environment,
    EnvironmentConnectorRelationship, Project,
};
use crate::predicate::Predicate;
use crate::types::{Annotations, Labels};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreateInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Annotations,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdateInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub labels: Option<Labels>,
    pub annotations: Option<Annotations>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOutput {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub labels: Labels,
    pub annotations: Annotations,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for Project {
    const PATH: &'static str = "projects";
    const OPERATIONS: &'static [Operation] = ALL_OPERATIONS;

    type CreateInput = ProjectCreateInput;
    type UpdateInput = ProjectUpdateInput;
    type Output = ProjectOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(input: ProjectCreateInput, _project_id: Option<Uuid>) -> Result<Self, AppError> {
        Ok(Project {
            name: input.name,
            description: input.description,
            labels: input.labels,
            annotations: input.annotations,
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: ProjectUpdateInput) -> Result<(), AppError> {
        patch(&mut self.name, input.name);
        if input.description.is_some() {
            self.description = input.description;
        }
        patch(&mut self.labels, input.labels);
        patch(&mut self.annotations, input.annotations);
        Ok(())
    }

    fn output(self) -> ProjectOutput {
        ProjectOutput {
            id: self.id,
            name: self.name,
            description: self.description,
            labels: self.labels,
            annotations: self.annotations,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

/// Connector bound to an environment, `{"connector": {"id": ...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConnector {
    pub connector: Ref<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentCreateInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Annotations,
    pub connectors: Option<Vec<EnvironmentConnector>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentUpdateInput {
    pub description: Option<String>,
    pub labels: Option<Labels>,
    pub annotations: Option<Annotations>,
    /// Replaces the bound connectors when present.
    pub connectors: Option<Vec<EnvironmentConnector>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentOutput {
    pub id: Uuid,
    #[serde(rename = "projectID")]
    pub project_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub labels: Labels,
    pub annotations: Annotations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectors: Option<Vec<EnvironmentConnector>>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

fn connector_edges(connectors: Vec<EnvironmentConnector>) -> Vec<EnvironmentConnectorRelationship> {
    connectors
        .into_iter()
        .map(|c| EnvironmentConnectorRelationship::new(Uuid::nil(), c.connector.id))
        .collect()
}

impl ApiEntity for Environment {
    const PATH: &'static str = "environments";
    const OPERATIONS: &'static [Operation] = ALL_OPERATIONS;
    const PROJECT_COLUMN: Option<&'static str> = Some("project_id");

    type CreateInput = EnvironmentCreateInput;
    type UpdateInput = EnvironmentUpdateInput;
    type Output = EnvironmentOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(
        input: EnvironmentCreateInput,
        project_id: Option<Uuid>,
    ) -> Result<Self, AppError> {
        Ok(Environment {
            project_id: require_project(project_id)?,
            name: input.name,
            description: input.description,
            kind: input.kind,
            labels: input.labels,
            annotations: input.annotations,
            edges: EnvironmentEdges {
                connectors: input.connectors.map(connector_edges),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: EnvironmentUpdateInput) -> Result<(), AppError> {
        if input.description.is_some() {
            self.description = input.description;
        }
        patch(&mut self.labels, input.labels);
        patch(&mut self.annotations, input.annotations);
        if let Some(connectors) = input.connectors {
            self.edges.connectors = Some(connector_edges(connectors));
        }
        Ok(())
    }

    /// Binds the requested connectors; each must be global or belong to the
    /// environment's project.
    fn save_edges<'a>(&'a self, client: &'a Client) -> BoxFuture<'a, Result<(), DaoError>> {
        Box::pin(async move {
            let Some(rels) = &self.edges.connectors else {
                return Ok(());
            };
            let mut ids: Vec<Uuid> = rels.iter().map(|r| r.connector_id).collect();
            ids.sort();
            ids.dedup();
            if !ids.is_empty() {
                let usable = client
                    .connectors()
                    .query()
                    .filter(connector::ID.in_(ids.clone()))
                    .filter(Predicate::or([
                        connector::PROJECT_ID.is_null(),
                        connector::PROJECT_ID.eq(self.project_id),
                    ]))
                    .count()
                    .await?;
                if usable != ids.len() as i64 {
                    let message = "connector not found in this project";
                    return Err(DaoError::validation("connectors", message));
                }
            }
            dao::sync_environment_connectors(client, self.id, &ids).await
        })
    }

    fn with_edges(query: Query<Self>) -> Query<Self> {
        query.with(environment::connectors(), |q| q.order(ecr::CONNECTOR_ID.asc()))
    }

    fn output(self) -> EnvironmentOutput {
        EnvironmentOutput {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            description: self.description,
            kind: self.kind,
            labels: self.labels,
            annotations: self.annotations,
            connectors: self.edges.connectors.map(|rels| {
                rels.into_iter()
                    .map(|r| EnvironmentConnector {
                        connector: Ref { id: r.connector_id },
                    })
                    .collect()
            }),
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}
