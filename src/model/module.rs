use super::columns as col;
use super::{ApplicationModuleRelationship, Catalog, ModuleVersion};
use crate::entity::{first_boxed, loaded_many, loaded_one, Edge, Entity, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, OnDelete, SqlType};
use crate::types::Labels;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STATUS_INITIALIZING: &str = "Initializing";
pub const STATUS_READY: &str = "Ready";
pub const STATUS_ERROR: &str = "Error";

/// A deployable template, keyed by its name.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Module {
    pub id: String,
    pub status: String,
    pub status_message: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    #[sqlx(json)]
    pub labels: Labels,
    pub source: String,
    pub catalog_id: Option<Uuid>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ModuleEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ModuleEdges {
    pub catalog: Option<Option<Box<Catalog>>>,
    pub versions: Option<Vec<ModuleVersion>>,
    pub applications: Option<Vec<ApplicationModuleRelationship>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "module",
    table: "modules",
    columns: &[
        Column::new("id", SqlType::Text).check(checks::not_empty),
        Column::new("status", SqlType::Text).default_expr("'Initializing'"),
        Column::new("status_message", SqlType::Text).default_expr("''"),
        col::DESCRIPTION,
        Column::new("icon", SqlType::Text).nullable(),
        col::LABELS,
        Column::new("source", SqlType::Text).check(checks::not_empty),
        Column::new("catalog_id", SqlType::Uuid).nullable(),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[],
    foreign_keys: &[ForeignKey::new("catalog_id", "catalogs", "id", OnDelete::SetNull)],
};

pub const ID: Field<Module, String> = Field::new("id");
pub const STATUS: Field<Module, String> = Field::new("status");
pub const STATUS_MESSAGE: Field<Module, String> = Field::new("status_message");
pub const DESCRIPTION: Field<Module, String> = Field::new("description");
pub const ICON: Field<Module, String> = Field::new("icon");
pub const LABELS: Field<Module, Labels> = Field::new("labels");
pub const SOURCE: Field<Module, String> = Field::new("source");
pub const CATALOG_ID: Field<Module, Uuid> = Field::new("catalog_id");
pub const CREATE_TIME: Field<Module, DateTime<Utc>> = Field::new("create_time");

pub fn catalog() -> Edge<Module, Catalog> {
    Edge::to_one("catalog", "catalog_id", "id", |m: &mut Module, rows| {
        m.edges.catalog = first_boxed(rows)
    })
}

pub fn versions() -> Edge<Module, ModuleVersion> {
    Edge::to_many("versions", "id", "module_id", |m: &mut Module, rows| {
        m.edges.versions = Some(rows)
    })
}

pub fn applications() -> Edge<Module, ApplicationModuleRelationship> {
    Edge::to_many("applications", "id", "module_id", |m: &mut Module, rows| {
        m.edges.applications = Some(rows)
    })
}

impl Module {
    pub fn catalog(&self) -> Result<&Catalog, DaoError> {
        loaded_one(&self.edges.catalog, "catalog")
    }

    pub fn versions(&self) -> Result<&[ModuleVersion], DaoError> {
        loaded_many(&self.edges.versions, "versions")
    }

    pub fn applications(&self) -> Result<&[ApplicationModuleRelationship], DaoError> {
        loaded_many(&self.edges.applications, "applications")
    }
}

impl Entity for Module {
    type Id = String;
    type Edges = ModuleEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn edges(&self) -> &ModuleEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut ModuleEdges {
        &mut self.edges
    }

    fn prepare_create(&mut self) {
        if self.status.is_empty() {
            self.status = STATUS_INITIALIZING.to_string();
        }
    }
}
