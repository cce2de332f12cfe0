use super::{Application, Module};
use crate::entity::{first_boxed, loaded_one, Edge, Entity, Field};
use crate::error::DaoError;
use crate::predicate::Predicate;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, OnDelete, SqlType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Module used by an application under a name, pinned to a version.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationModuleRelationship {
    pub application_id: Uuid,
    pub module_id: String,
    pub name: String,
    pub version: String,
    #[sqlx(json)]
    pub attributes: Map<String, Value>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ApplicationModuleRelationshipEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ApplicationModuleRelationshipEdges {
    pub application: Option<Option<Box<Application>>>,
    pub module: Option<Option<Box<Module>>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "application_module_relationship",
    table: "application_module_relationships",
    columns: &[
        Column::new("application_id", SqlType::Uuid),
        Column::new("module_id", SqlType::Text),
        Column::new("name", SqlType::Text).check(checks::dns_label),
        Column::new("version", SqlType::Text).check(checks::not_empty),
        super::columns::json_object("attributes"),
        super::columns::CREATE_TIME,
        super::columns::UPDATE_TIME,
    ],
    primary_key: &["application_id", "module_id", "name"],
    indexes: &[],
    foreign_keys: &[
        ForeignKey::new("application_id", "applications", "id", OnDelete::Cascade),
        ForeignKey::new("module_id", "modules", "id", OnDelete::Restrict),
    ],
};

pub const APPLICATION_ID: Field<ApplicationModuleRelationship, Uuid> = Field::new("application_id");
pub const MODULE_ID: Field<ApplicationModuleRelationship, String> = Field::new("module_id");
pub const NAME: Field<ApplicationModuleRelationship, String> = Field::new("name");
pub const VERSION: Field<ApplicationModuleRelationship, String> = Field::new("version");
pub const ATTRIBUTES: Field<ApplicationModuleRelationship, Map<String, Value>> =
    Field::new("attributes");

pub fn application() -> Edge<ApplicationModuleRelationship, Application> {
    Edge::to_one(
        "application",
        "application_id",
        "id",
        |r: &mut ApplicationModuleRelationship, rows| r.edges.application = first_boxed(rows),
    )
}

pub fn module() -> Edge<ApplicationModuleRelationship, Module> {
    Edge::to_one("module", "module_id", "id", |r: &mut ApplicationModuleRelationship, rows| {
        r.edges.module = first_boxed(rows)
    })
}

impl ApplicationModuleRelationship {
    pub fn application(&self) -> Result<&Application, DaoError> {
        loaded_one(&self.edges.application, "application")
    }

    pub fn module(&self) -> Result<&Module, DaoError> {
        loaded_one(&self.edges.module, "module")
    }
}

impl Entity for ApplicationModuleRelationship {
    /// (application_id, module_id, name)
    type Id = (Uuid, String, String);
    type Edges = ApplicationModuleRelationshipEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> (Uuid, String, String) {
        (self.application_id, self.module_id.clone(), self.name.clone())
    }

    fn edges(&self) -> &ApplicationModuleRelationshipEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut ApplicationModuleRelationshipEdges {
        &mut self.edges
    }

    fn id_predicate(id: &(Uuid, String, String)) -> Predicate<Self> {
        Predicate::and([
            APPLICATION_ID.eq(id.0),
            MODULE_ID.eq(id.1.clone()),
            NAME.eq(id.2.clone()),
        ])
    }
}
