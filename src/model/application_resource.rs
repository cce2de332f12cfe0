use super::columns as col;
use super::{ApplicationInstance, Connector};
use crate::entity::{first_boxed, loaded_many, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, OnDelete, SqlType};
use crate::types::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const MODE_MANAGED: &str = "managed";
pub const MODE_DATA: &str = "data";
pub const MODE_DISCOVERED: &str = "discovered";

/// A concrete infrastructure object created by an instance. Discovered
/// resources point at the managed resource that composes them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationResource {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub connector_id: Uuid,
    pub composition_id: Option<Uuid>,
    pub module: String,
    pub mode: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub name: String,
    pub deployer_type: String,
    #[sqlx(json)]
    pub status: Status,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ApplicationResourceEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ApplicationResourceEdges {
    pub instance: Option<Option<Box<ApplicationInstance>>>,
    pub connector: Option<Option<Box<Connector>>>,
    pub composition: Option<Option<Box<ApplicationResource>>>,
    pub components: Option<Vec<ApplicationResource>>,
}

fn check_mode(v: &Value) -> Result<(), String> {
    match v.as_str() {
        Some(MODE_MANAGED | MODE_DATA | MODE_DISCOVERED) => Ok(()),
        _ => Err(format!("must be one of {MODE_MANAGED}, {MODE_DATA}, {MODE_DISCOVERED}")),
    }
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "application_resource",
    table: "application_resources",
    columns: &[
        col::UUID_ID,
        Column::new("instance_id", SqlType::Uuid).immutable(),
        Column::new("connector_id", SqlType::Uuid).immutable(),
        Column::new("composition_id", SqlType::Uuid).nullable().immutable(),
        Column::new("module", SqlType::Text).immutable().check(checks::not_empty),
        Column::new("mode", SqlType::Text).immutable().check(check_mode),
        Column::new("type", SqlType::Text).immutable().check(checks::not_empty),
        Column::new("name", SqlType::Text).immutable().check(checks::not_empty),
        Column::new("deployer_type", SqlType::Text).immutable().check(checks::not_empty),
        col::STATUS,
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[],
    foreign_keys: &[
        ForeignKey::new("instance_id", "application_instances", "id", OnDelete::Cascade),
        ForeignKey::new("connector_id", "connectors", "id", OnDelete::Restrict),
        ForeignKey::new("composition_id", "application_resources", "id", OnDelete::Cascade),
    ],
};

pub const ID: Field<ApplicationResource, Uuid> = Field::new("id");
pub const INSTANCE_ID: Field<ApplicationResource, Uuid> = Field::new("instance_id");
pub const CONNECTOR_ID: Field<ApplicationResource, Uuid> = Field::new("connector_id");
pub const COMPOSITION_ID: Field<ApplicationResource, Uuid> = Field::new("composition_id");
pub const MODULE: Field<ApplicationResource, String> = Field::new("module");
pub const MODE: Field<ApplicationResource, String> = Field::new("mode");
pub const TYPE: Field<ApplicationResource, String> = Field::new("type");
pub const NAME: Field<ApplicationResource, String> = Field::new("name");
pub const DEPLOYER_TYPE: Field<ApplicationResource, String> = Field::new("deployer_type");
pub const STATUS: Field<ApplicationResource, Status> = Field::new("status");
pub const CREATE_TIME: Field<ApplicationResource, DateTime<Utc>> = Field::new("create_time");

pub fn instance() -> Edge<ApplicationResource, ApplicationInstance> {
    Edge::to_one("instance", "instance_id", "id", |r: &mut ApplicationResource, rows| {
        r.edges.instance = first_boxed(rows)
    })
}

pub fn connector() -> Edge<ApplicationResource, Connector> {
    Edge::to_one("connector", "connector_id", "id", |r: &mut ApplicationResource, rows| {
        r.edges.connector = first_boxed(rows)
    })
}

pub fn composition() -> Edge<ApplicationResource, ApplicationResource> {
    Edge::to_one("composition", "composition_id", "id", |r: &mut ApplicationResource, rows| {
        r.edges.composition = first_boxed(rows)
    })
}

pub fn components() -> Edge<ApplicationResource, ApplicationResource> {
    Edge::to_many("components", "id", "composition_id", |r: &mut ApplicationResource, rows| {
        r.edges.components = Some(rows)
    })
}

impl ApplicationResource {
    pub fn instance(&self) -> Result<&ApplicationInstance, DaoError> {
        loaded_one(&self.edges.instance, "instance")
    }

    pub fn connector(&self) -> Result<&Connector, DaoError> {
        loaded_one(&self.edges.connector, "connector")
    }

    pub fn composition(&self) -> Result<&ApplicationResource, DaoError> {
        loaded_one(&self.edges.composition, "composition")
    }

    pub fn components(&self) -> Result<&[ApplicationResource], DaoError> {
        loaded_many(&self.edges.components, "components")
    }
}

uuid_entity!(ApplicationResource, ApplicationResourceEdges);
