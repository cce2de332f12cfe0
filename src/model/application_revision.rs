use super::columns as col;
use super::{ApplicationInstance, Environment};
use crate::entity::{first_boxed, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{Column, EntitySchema, ForeignKey, OnDelete, SqlType};
use crate::types::{ApplicationModule, ProviderRequirement, Variables};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const STATUS_RUNNING: &str = "Running";
pub const STATUS_SUCCEEDED: &str = "Succeeded";
pub const STATUS_FAILED: &str = "Failed";

pub const DEPLOYER_TERRAFORM: &str = "Terraform";

/// One deployment attempt of an instance. Revisions are append-only.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationRevision {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub environment_id: Uuid,
    pub status: String,
    pub status_message: String,
    #[sqlx(json)]
    pub modules: Vec<ApplicationModule>,
    #[sqlx(json)]
    pub input_variables: Variables,
    pub input_plan: String,
    pub output: String,
    pub deployer_type: String,
    /// Seconds the deployment took.
    pub duration: i32,
    #[sqlx(json)]
    pub previous_required_providers: Vec<ProviderRequirement>,
    #[sqlx(json)]
    pub tags: Map<String, Value>,
    pub create_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ApplicationRevisionEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ApplicationRevisionEdges {
    pub instance: Option<Option<Box<ApplicationInstance>>>,
    pub environment: Option<Option<Box<Environment>>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "application_revision",
    table: "application_revisions",
    columns: &[
        col::UUID_ID,
        Column::new("instance_id", SqlType::Uuid).immutable(),
        Column::new("environment_id", SqlType::Uuid).immutable(),
        Column::new("status", SqlType::Text).default_expr("'Running'"),
        Column::new("status_message", SqlType::Text).default_expr("''"),
        col::json_array("modules"),
        col::json_array("input_variables"),
        Column::new("input_plan", SqlType::Text).default_expr("''"),
        Column::new("output", SqlType::Text).default_expr("''"),
        Column::new("deployer_type", SqlType::Text)
            .default_expr("'Terraform'")
            .immutable(),
        Column::new("duration", SqlType::Int).default_expr("0"),
        col::json_array("previous_required_providers"),
        col::json_object("tags"),
        col::CREATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[],
    foreign_keys: &[
        ForeignKey::new("instance_id", "application_instances", "id", OnDelete::Cascade),
        ForeignKey::new("environment_id", "environments", "id", OnDelete::Cascade),
    ],
};

pub const ID: Field<ApplicationRevision, Uuid> = Field::new("id");
pub const INSTANCE_ID: Field<ApplicationRevision, Uuid> = Field::new("instance_id");
pub const ENVIRONMENT_ID: Field<ApplicationRevision, Uuid> = Field::new("environment_id");
pub const STATUS: Field<ApplicationRevision, String> = Field::new("status");
pub const STATUS_MESSAGE: Field<ApplicationRevision, String> = Field::new("status_message");
pub const INPUT_PLAN: Field<ApplicationRevision, String> = Field::new("input_plan");
pub const OUTPUT: Field<ApplicationRevision, String> = Field::new("output");
pub const DEPLOYER_TYPE: Field<ApplicationRevision, String> = Field::new("deployer_type");
pub const DURATION: Field<ApplicationRevision, i32> = Field::new("duration");
pub const TAGS: Field<ApplicationRevision, Map<String, Value>> = Field::new("tags");
pub const CREATE_TIME: Field<ApplicationRevision, DateTime<Utc>> = Field::new("create_time");

pub fn instance() -> Edge<ApplicationRevision, ApplicationInstance> {
    Edge::to_one("instance", "instance_id", "id", |r: &mut ApplicationRevision, rows| {
        r.edges.instance = first_boxed(rows)
    })
}

pub fn environment() -> Edge<ApplicationRevision, Environment> {
    Edge::to_one("environment", "environment_id", "id", |r: &mut ApplicationRevision, rows| {
        r.edges.environment = first_boxed(rows)
    })
}

impl ApplicationRevision {
    pub fn instance(&self) -> Result<&ApplicationInstance, DaoError> {
        loaded_one(&self.edges.instance, "instance")
    }

    pub fn environment(&self) -> Result<&Environment, DaoError> {
        loaded_one(&self.edges.environment, "environment")
    }

    pub fn is_finished(&self) -> bool {
        self.status == STATUS_SUCCEEDED || self.status == STATUS_FAILED
    }
}

impl crate::entity::Entity for ApplicationRevision {
    type Id = Uuid;
    type Edges = ApplicationRevisionEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn edges(&self) -> &ApplicationRevisionEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut ApplicationRevisionEdges {
        &mut self.edges
    }

    fn prepare_create(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
        if self.status.is_empty() {
            self.status = STATUS_RUNNING.to_string();
        }
        if self.deployer_type.is_empty() {
            self.deployer_type = DEPLOYER_TERRAFORM.to_string();
        }
    }
}
