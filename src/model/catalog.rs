use super::columns as col;
use super::{Module, Project};
use crate::entity::{first_boxed, loaded_many, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use crate::types::{Annotations, Labels, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source of modules, e.g. a Git organisation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Catalog {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub labels: Labels,
    #[sqlx(json)]
    pub annotations: Annotations,
    #[sqlx(json)]
    pub status: Status,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub source: String,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: CatalogEdges,
}

#[derive(Clone, Debug, Default)]
pub struct CatalogEdges {
    pub project: Option<Option<Box<Project>>>,
    pub modules: Option<Vec<Module>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "catalog",
    table: "catalogs",
    columns: &[
        col::UUID_ID,
        Column::new("project_id", SqlType::Uuid).nullable().immutable(),
        Column::new("name", SqlType::Text).immutable().check(checks::dns_label),
        col::DESCRIPTION,
        col::LABELS,
        col::ANNOTATIONS,
        col::STATUS,
        Column::new("type", SqlType::Text).immutable().check(checks::not_empty),
        Column::new("source", SqlType::Text).immutable().check(checks::not_empty),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[
        Index::new("catalog_name", &["name"]).unique().partial("project_id IS NULL"),
        Index::new("catalog_project_id_name", &["project_id", "name"])
            .unique()
            .partial("project_id IS NOT NULL"),
    ],
    foreign_keys: &[ForeignKey::new("project_id", "projects", "id", OnDelete::Cascade)],
};

pub const ID: Field<Catalog, Uuid> = Field::new("id");
pub const PROJECT_ID: Field<Catalog, Uuid> = Field::new("project_id");
pub const NAME: Field<Catalog, String> = Field::new("name");
pub const STATUS: Field<Catalog, Status> = Field::new("status");
pub const TYPE: Field<Catalog, String> = Field::new("type");
pub const SOURCE: Field<Catalog, String> = Field::new("source");
pub const CREATE_TIME: Field<Catalog, DateTime<Utc>> = Field::new("create_time");

pub fn project() -> Edge<Catalog, Project> {
    Edge::to_one("project", "project_id", "id", |c: &mut Catalog, rows| {
        c.edges.project = first_boxed(rows)
    })
}

pub fn modules() -> Edge<Catalog, Module> {
    Edge::to_many("modules", "id", "catalog_id", |c: &mut Catalog, rows| {
        c.edges.modules = Some(rows)
    })
}

impl Catalog {
    pub fn project(&self) -> Result<&Project, DaoError> {
        loaded_one(&self.edges.project, "project")
    }

    pub fn modules(&self) -> Result<&[Module], DaoError> {
        loaded_many(&self.edges.modules, "modules")
    }
}

uuid_entity!(Catalog, CatalogEdges);
