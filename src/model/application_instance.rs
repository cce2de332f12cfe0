use super::columns as col;
use super::{Application, ApplicationResource, ApplicationRevision, Environment};
use crate::entity::{first_boxed, loaded_many, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use crate::types::{Status, Variables};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STATUS_DEPLOYED: &str = "Deployed";
pub const STATUS_READY: &str = "Ready";
pub const STATUS_DELETED: &str = "Deleted";

/// Condition order used to summarize an instance status.
pub const STATUS_STEPS: &[&str] = &[STATUS_DEPLOYED, STATUS_READY];

/// An application deployed into one environment.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationInstance {
    pub id: Uuid,
    pub application_id: Uuid,
    pub environment_id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub variables: Variables,
    #[sqlx(json)]
    pub status: Status,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ApplicationInstanceEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ApplicationInstanceEdges {
    pub application: Option<Option<Box<Application>>>,
    pub environment: Option<Option<Box<Environment>>>,
    pub revisions: Option<Vec<ApplicationRevision>>,
    pub resources: Option<Vec<ApplicationResource>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "application_instance",
    table: "application_instances",
    columns: &[
        col::UUID_ID,
        Column::new("application_id", SqlType::Uuid).immutable(),
        Column::new("environment_id", SqlType::Uuid).immutable(),
        Column::new("name", SqlType::Text).immutable().check(checks::dns_label),
        col::json_array("variables"),
        col::STATUS,
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new(
        "application_instance_application_id_environment_id_name",
        &["application_id", "environment_id", "name"],
    )
    .unique()],
    foreign_keys: &[
        ForeignKey::new("application_id", "applications", "id", OnDelete::Cascade),
        ForeignKey::new("environment_id", "environments", "id", OnDelete::Cascade),
    ],
};

pub const ID: Field<ApplicationInstance, Uuid> = Field::new("id");
pub const APPLICATION_ID: Field<ApplicationInstance, Uuid> = Field::new("application_id");
pub const ENVIRONMENT_ID: Field<ApplicationInstance, Uuid> = Field::new("environment_id");
pub const NAME: Field<ApplicationInstance, String> = Field::new("name");
pub const VARIABLES: Field<ApplicationInstance, Variables> = Field::new("variables");
pub const STATUS: Field<ApplicationInstance, Status> = Field::new("status");
pub const CREATE_TIME: Field<ApplicationInstance, DateTime<Utc>> = Field::new("create_time");

pub fn application() -> Edge<ApplicationInstance, Application> {
    Edge::to_one("application", "application_id", "id", |i: &mut ApplicationInstance, rows| {
        i.edges.application = first_boxed(rows)
    })
}

pub fn environment() -> Edge<ApplicationInstance, Environment> {
    Edge::to_one("environment", "environment_id", "id", |i: &mut ApplicationInstance, rows| {
        i.edges.environment = first_boxed(rows)
    })
}

pub fn revisions() -> Edge<ApplicationInstance, ApplicationRevision> {
    Edge::to_many("revisions", "id", "instance_id", |i: &mut ApplicationInstance, rows| {
        i.edges.revisions = Some(rows)
    })
}

pub fn resources() -> Edge<ApplicationInstance, ApplicationResource> {
    Edge::to_many("resources", "id", "instance_id", |i: &mut ApplicationInstance, rows| {
        i.edges.resources = Some(rows)
    })
}

impl ApplicationInstance {
    pub fn application(&self) -> Result<&Application, DaoError> {
        loaded_one(&self.edges.application, "application")
    }

    pub fn environment(&self) -> Result<&Environment, DaoError> {
        loaded_one(&self.edges.environment, "environment")
    }

    pub fn revisions(&self) -> Result<&[ApplicationRevision], DaoError> {
        loaded_many(&self.edges.revisions, "revisions")
    }

    pub fn resources(&self) -> Result<&[ApplicationResource], DaoError> {
        loaded_many(&self.edges.resources, "resources")
    }
}

uuid_entity!(ApplicationInstance, ApplicationInstanceEdges);
