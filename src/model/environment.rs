use super::columns as col;
use super::{ApplicationInstance, EnvironmentConnectorRelationship, Project};
use crate::entity::{first_boxed, loaded_many, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use crate::types::{Annotations, Labels};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const TYPE_DEVELOPMENT: &str = "development";
pub const TYPE_STAGING: &str = "staging";
pub const TYPE_PRODUCTION: &str = "production";

/// Deployment target inside a project.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Environment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub labels: Labels,
    #[sqlx(json)]
    pub annotations: Annotations,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: EnvironmentEdges,
}

#[derive(Clone, Debug, Default)]
pub struct EnvironmentEdges {
    pub project: Option<Option<Box<Project>>>,
    pub connectors: Option<Vec<EnvironmentConnectorRelationship>>,
    pub instances: Option<Vec<ApplicationInstance>>,
}

fn check_type(v: &Value) -> Result<(), String> {
    match v.as_str() {
        Some(TYPE_DEVELOPMENT | TYPE_STAGING | TYPE_PRODUCTION) => Ok(()),
        _ => Err(format!("must be one of {TYPE_DEVELOPMENT}, {TYPE_STAGING}, {TYPE_PRODUCTION}")),
    }
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "environment",
    table: "environments",
    columns: &[
        col::UUID_ID,
        Column::new("project_id", SqlType::Uuid).immutable(),
        Column::new("name", SqlType::Text).immutable().check(checks::dns_label),
        col::DESCRIPTION,
        col::LABELS,
        col::ANNOTATIONS,
        Column::new("type", SqlType::Text)
            .default_expr("'development'")
            .immutable()
            .check(check_type),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new("environment_project_id_name", &["project_id", "name"]).unique()],
    foreign_keys: &[ForeignKey::new("project_id", "projects", "id", OnDelete::Cascade)],
};

pub const ID: Field<Environment, Uuid> = Field::new("id");
pub const PROJECT_ID: Field<Environment, Uuid> = Field::new("project_id");
pub const NAME: Field<Environment, String> = Field::new("name");
pub const DESCRIPTION: Field<Environment, String> = Field::new("description");
pub const LABELS: Field<Environment, Labels> = Field::new("labels");
pub const TYPE: Field<Environment, String> = Field::new("type");
pub const CREATE_TIME: Field<Environment, DateTime<Utc>> = Field::new("create_time");
pub const UPDATE_TIME: Field<Environment, DateTime<Utc>> = Field::new("update_time");

pub fn project() -> Edge<Environment, Project> {
    Edge::to_one("project", "project_id", "id", |e: &mut Environment, rows| {
        e.edges.project = first_boxed(rows)
    })
}

pub fn connectors() -> Edge<Environment, EnvironmentConnectorRelationship> {
    Edge::to_many("connectors", "id", "environment_id", |e: &mut Environment, rows| {
        e.edges.connectors = Some(rows)
    })
}

pub fn instances() -> Edge<Environment, ApplicationInstance> {
    Edge::to_many("instances", "id", "environment_id", |e: &mut Environment, rows| {
        e.edges.instances = Some(rows)
    })
}

impl Environment {
    pub fn project(&self) -> Result<&Project, DaoError> {
        loaded_one(&self.edges.project, "project")
    }

    pub fn connectors(&self) -> Result<&[EnvironmentConnectorRelationship], DaoError> {
        loaded_many(&self.edges.connectors, "connectors")
    }

    pub fn instances(&self) -> Result<&[ApplicationInstance], DaoError> {
        loaded_many(&self.edges.instances, "instances")
    }
}

impl crate::entity::Entity for Environment {
    type Id = Uuid;
    type Edges = EnvironmentEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn edges(&self) -> &EnvironmentEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut EnvironmentEdges {
        &mut self.edges
    }

    fn prepare_create(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
        if self.kind.is_empty() {
            self.kind = TYPE_DEVELOPMENT.to_string();
        }
    }
}
