use super::columns as col;
use super::{ApplicationInstance, ApplicationModuleRelationship, Project};
use crate::entity::{first_boxed, loaded_many, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use crate::types::{Annotations, Labels, Variables};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A set of modules deployed together into environments.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub labels: Labels,
    #[sqlx(json)]
    pub annotations: Annotations,
    #[sqlx(json)]
    pub variables: Variables,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ApplicationEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ApplicationEdges {
    pub project: Option<Option<Box<Project>>>,
    pub instances: Option<Vec<ApplicationInstance>>,
    pub modules: Option<Vec<ApplicationModuleRelationship>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "application",
    table: "applications",
    columns: &[
        col::UUID_ID,
        Column::new("project_id", SqlType::Uuid).immutable(),
        Column::new("name", SqlType::Text).immutable().check(checks::dns_label),
        col::DESCRIPTION,
        col::LABELS,
        col::ANNOTATIONS,
        col::json_array("variables"),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new("application_project_id_name", &["project_id", "name"]).unique()],
    foreign_keys: &[ForeignKey::new("project_id", "projects", "id", OnDelete::Cascade)],
};

pub const ID: Field<Application, Uuid> = Field::new("id");
pub const PROJECT_ID: Field<Application, Uuid> = Field::new("project_id");
pub const NAME: Field<Application, String> = Field::new("name");
pub const DESCRIPTION: Field<Application, String> = Field::new("description");
pub const LABELS: Field<Application, Labels> = Field::new("labels");
pub const VARIABLES: Field<Application, Variables> = Field::new("variables");
pub const CREATE_TIME: Field<Application, DateTime<Utc>> = Field::new("create_time");
pub const UPDATE_TIME: Field<Application, DateTime<Utc>> = Field::new("update_time");

pub fn project() -> Edge<Application, Project> {
    Edge::to_one("project", "project_id", "id", |a: &mut Application, rows| {
        a.edges.project = first_boxed(rows)
    })
}

pub fn instances() -> Edge<Application, ApplicationInstance> {
    Edge::to_many("instances", "id", "application_id", |a: &mut Application, rows| {
        a.edges.instances = Some(rows)
    })
}

pub fn modules() -> Edge<Application, ApplicationModuleRelationship> {
    Edge::to_many("modules", "id", "application_id", |a: &mut Application, rows| {
        a.edges.modules = Some(rows)
    })
}

impl Application {
    pub fn project(&self) -> Result<&Project, DaoError> {
        loaded_one(&self.edges.project, "project")
    }

    pub fn instances(&self) -> Result<&[ApplicationInstance], DaoError> {
        loaded_many(&self.edges.instances, "instances")
    }

    pub fn modules(&self) -> Result<&[ApplicationModuleRelationship], DaoError> {
        loaded_many(&self.edges.modules, "modules")
    }
}

uuid_entity!(Application, ApplicationEdges);
