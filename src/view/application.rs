use super::{
    parse_uuid, patch, require_project, ApiEntity, NoInput, Operation, ALL_OPERATIONS, READ_ONLY,
};
use crate::builder::Query;
use crate::client::Client;
use crate::dao;
use crate::error::{AppError, DaoError};
use crate::model::application::ApplicationEdges;
use crate::model::{
    application, application_module_relationship as amr, Application, ApplicationInstance,
    ApplicationModuleRelationship, ApplicationResource, ApplicationRevision,
};
use crate::types::{Annotations, ApplicationModule, Labels, Status, Variables};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCreateInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub variables: Variables,
    pub modules: Option<Vec<ApplicationModule>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdateInput {
    pub description: Option<String>,
    pub labels: Option<Labels>,
    pub annotations: Option<Annotations>,
    pub variables: Option<Variables>,
    /// Replaces the application's modules when present.
    pub modules: Option<Vec<ApplicationModule>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationOutput {
    pub id: Uuid,
    #[serde(rename = "projectID")]
    pub project_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub labels: Labels,
    pub annotations: Annotations,
    pub variables: Variables,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<ApplicationModule>>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

fn module_edges(modules: Vec<ApplicationModule>) -> Vec<ApplicationModuleRelationship> {
    modules
        .into_iter()
        .map(|m| ApplicationModuleRelationship {
            module_id: m.module_id,
            name: m.name,
            version: m.version,
            attributes: m.attributes.into_iter().collect(),
            ..Default::default()
        })
        .collect()
}

impl ApiEntity for Application {
    const PATH: &'static str = "applications";
    const OPERATIONS: &'static [Operation] = ALL_OPERATIONS;
    const PROJECT_COLUMN: Option<&'static str> = Some("project_id");

    type CreateInput = ApplicationCreateInput;
    type UpdateInput = ApplicationUpdateInput;
    type Output = ApplicationOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(
        input: ApplicationCreateInput,
        project_id: Option<Uuid>,
    ) -> Result<Self, AppError> {
        Ok(Application {
            project_id: require_project(project_id)?,
            name: input.name,
            description: input.description,
            labels: input.labels,
            annotations: input.annotations,
            variables: input.variables,
            edges: ApplicationEdges {
                modules: input.modules.map(module_edges),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: ApplicationUpdateInput) -> Result<(), AppError> {
        if input.description.is_some() {
            self.description = input.description;
        }
        patch(&mut self.labels, input.labels);
        patch(&mut self.annotations, input.annotations);
        patch(&mut self.variables, input.variables);
        if let Some(modules) = input.modules {
            self.edges.modules = Some(module_edges(modules));
        }
        Ok(())
    }

    fn save_edges<'a>(&'a self, client: &'a Client) -> BoxFuture<'a, Result<(), DaoError>> {
        Box::pin(async move {
            match &self.edges.modules {
                Some(modules) => dao::sync_application_modules(client, self.id, modules).await,
                None => Ok(()),
            }
        })
    }

    fn with_edges(query: Query<Self>) -> Query<Self> {
        query.with(application::modules(), |q| q.order(amr::NAME.asc()))
    }

    fn output(self) -> ApplicationOutput {
        ApplicationOutput {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            description: self.description,
            labels: self.labels,
            annotations: self.annotations,
            variables: self.variables,
            modules: self.edges.modules.map(|rels| {
                rels.into_iter()
                    .map(|r| ApplicationModule {
                        module_id: r.module_id,
                        version: r.version,
                        name: r.name,
                        attributes: r.attributes.into_iter().collect(),
                    })
                    .collect()
            }),
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInstanceCreateInput {
    #[serde(rename = "applicationID")]
    pub application_id: Uuid,
    #[serde(rename = "environmentID")]
    pub environment_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub variables: Variables,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInstanceUpdateInput {
    pub variables: Option<Variables>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInstanceOutput {
    pub id: Uuid,
    #[serde(rename = "applicationID")]
    pub application_id: Uuid,
    #[serde(rename = "environmentID")]
    pub environment_id: Uuid,
    pub name: String,
    pub variables: Variables,
    pub status: Status,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for ApplicationInstance {
    const PATH: &'static str = "application-instances";
    const OPERATIONS: &'static [Operation] = &[
        Operation::List,
        Operation::Read,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    type CreateInput = ApplicationInstanceCreateInput;
    type UpdateInput = ApplicationInstanceUpdateInput;
    type Output = ApplicationInstanceOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(
        input: ApplicationInstanceCreateInput,
        _project_id: Option<Uuid>,
    ) -> Result<Self, AppError> {
        Ok(ApplicationInstance {
            application_id: input.application_id,
            environment_id: input.environment_id,
            name: input.name,
            variables: input.variables,
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: ApplicationInstanceUpdateInput) -> Result<(), AppError> {
        patch(&mut self.variables, input.variables);
        Ok(())
    }

    fn output(self) -> ApplicationInstanceOutput {
        ApplicationInstanceOutput {
            id: self.id,
            application_id: self.application_id,
            environment_id: self.environment_id,
            name: self.name,
            variables: self.variables,
            status: self.status,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

/// Revision as listed to clients. The plan and deployment output can carry
/// provider credentials and are not returned.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRevisionOutput {
    pub id: Uuid,
    #[serde(rename = "instanceID")]
    pub instance_id: Uuid,
    #[serde(rename = "environmentID")]
    pub environment_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status_message: String,
    pub modules: Vec<ApplicationModule>,
    pub input_variables: Variables,
    pub deployer_type: String,
    pub duration: i32,
    pub create_time: Option<DateTime<Utc>>,
}

impl ApiEntity for ApplicationRevision {
    const PATH: &'static str = "application-revisions";
    const OPERATIONS: &'static [Operation] = &[Operation::List, Operation::Read, Operation::Delete];

    type CreateInput = NoInput;
    type UpdateInput = NoInput;
    type Output = ApplicationRevisionOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(input: NoInput, _project_id: Option<Uuid>) -> Result<Self, AppError> {
        match input {}
    }

    fn apply_update(&mut self, input: NoInput) -> Result<(), AppError> {
        match input {}
    }

    fn check_delete(&self) -> Result<(), AppError> {
        if !self.is_finished() {
            return Err(AppError::NotAllowed(format!("revision {} is still running", self.id)));
        }
        Ok(())
    }

    fn output(self) -> ApplicationRevisionOutput {
        ApplicationRevisionOutput {
            id: self.id,
            instance_id: self.instance_id,
            environment_id: self.environment_id,
            status: self.status,
            status_message: self.status_message,
            modules: self.modules,
            input_variables: self.input_variables,
            deployer_type: self.deployer_type,
            duration: self.duration,
            create_time: self.create_time,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResourceOutput {
    pub id: Uuid,
    #[serde(rename = "instanceID")]
    pub instance_id: Uuid,
    #[serde(rename = "connectorID")]
    pub connector_id: Uuid,
    #[serde(rename = "compositionID", skip_serializing_if = "Option::is_none")]
    pub composition_id: Option<Uuid>,
    pub module: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub deployer_type: String,
    pub status: Status,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for ApplicationResource {
    const PATH: &'static str = "application-resources";
    const OPERATIONS: &'static [Operation] = READ_ONLY;

    type CreateInput = NoInput;
    type UpdateInput = NoInput;
    type Output = ApplicationResourceOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(input: NoInput, _project_id: Option<Uuid>) -> Result<Self, AppError> {
        match input {}
    }

    fn apply_update(&mut self, input: NoInput) -> Result<(), AppError> {
        match input {}
    }

    fn output(self) -> ApplicationResourceOutput {
        ApplicationResourceOutput {
            id: self.id,
            instance_id: self.instance_id,
            connector_id: self.connector_id,
            composition_id: self.composition_id,
            module: self.module,
            mode: self.mode,
            kind: self.kind,
            name: self.name,
            deployer_type: self.deployer_type,
            status: self.status,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}
