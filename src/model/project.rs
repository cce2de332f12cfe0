use super::columns as col;
use super::{Application, Catalog, Connector, Environment, SubjectRoleRelationship};
use crate::entity::{loaded_many, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, Index, SqlType};
use crate::types::{Annotations, Labels};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level tenant grouping environments, applications and connectors.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub labels: Labels,
    #[sqlx(json)]
    pub annotations: Annotations,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ProjectEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ProjectEdges {
    pub environments: Option<Vec<Environment>>,
    pub applications: Option<Vec<Application>>,
    pub connectors: Option<Vec<Connector>>,
    pub catalogs: Option<Vec<Catalog>>,
    pub subject_roles: Option<Vec<SubjectRoleRelationship>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "project",
    table: "projects",
    columns: &[
        col::UUID_ID,
        Column::new("name", SqlType::Text).check(checks::dns_label),
        col::DESCRIPTION,
        col::LABELS,
        col::ANNOTATIONS,
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new("project_name", &["name"]).unique()],
    foreign_keys: &[],
};

pub const ID: Field<Project, Uuid> = Field::new("id");
pub const NAME: Field<Project, String> = Field::new("name");
pub const DESCRIPTION: Field<Project, String> = Field::new("description");
pub const LABELS: Field<Project, Labels> = Field::new("labels");
pub const ANNOTATIONS: Field<Project, Annotations> = Field::new("annotations");
pub const CREATE_TIME: Field<Project, DateTime<Utc>> = Field::new("create_time");
pub const UPDATE_TIME: Field<Project, DateTime<Utc>> = Field::new("update_time");

pub fn environments() -> Edge<Project, Environment> {
    Edge::to_many("environments", "id", "project_id", |p: &mut Project, rows| {
        p.edges.environments = Some(rows)
    })
}

pub fn applications() -> Edge<Project, Application> {
    Edge::to_many("applications", "id", "project_id", |p: &mut Project, rows| {
        p.edges.applications = Some(rows)
    })
}

pub fn connectors() -> Edge<Project, Connector> {
    Edge::to_many("connectors", "id", "project_id", |p: &mut Project, rows| {
        p.edges.connectors = Some(rows)
    })
}

pub fn catalogs() -> Edge<Project, Catalog> {
    Edge::to_many("catalogs", "id", "project_id", |p: &mut Project, rows| {
        p.edges.catalogs = Some(rows)
    })
}

pub fn subject_roles() -> Edge<Project, SubjectRoleRelationship> {
    Edge::to_many("subject_roles", "id", "project_id", |p: &mut Project, rows| {
        p.edges.subject_roles = Some(rows)
    })
}

impl Project {
    pub fn environments(&self) -> Result<&[Environment], DaoError> {
        loaded_many(&self.edges.environments, "environments")
    }

    pub fn applications(&self) -> Result<&[Application], DaoError> {
        loaded_many(&self.edges.applications, "applications")
    }

    pub fn connectors(&self) -> Result<&[Connector], DaoError> {
        loaded_many(&self.edges.connectors, "connectors")
    }

    pub fn catalogs(&self) -> Result<&[Catalog], DaoError> {
        loaded_many(&self.edges.catalogs, "catalogs")
    }

    pub fn subject_roles(&self) -> Result<&[SubjectRoleRelationship], DaoError> {
        loaded_many(&self.edges.subject_roles, "subject_roles")
    }
}

uuid_entity!(Project, ProjectEdges);
