use super::{Connector, Environment};
use crate::entity::{first_boxed, loaded_one, Edge, Entity, Field};
use crate::error::DaoError;
use crate::predicate::Predicate;
use crate::schema::{Column, EntitySchema, ForeignKey, OnDelete, SqlType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connector attached to an environment.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct EnvironmentConnectorRelationship {
    pub environment_id: Uuid,
    pub connector_id: Uuid,
    pub create_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: EnvironmentConnectorRelationshipEdges,
}

#[derive(Clone, Debug, Default)]
pub struct EnvironmentConnectorRelationshipEdges {
    pub environment: Option<Option<Box<Environment>>>,
    pub connector: Option<Option<Box<Connector>>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "environment_connector_relationship",
    table: "environment_connector_relationships",
    columns: &[
        Column::new("environment_id", SqlType::Uuid),
        Column::new("connector_id", SqlType::Uuid),
        super::columns::CREATE_TIME,
    ],
    primary_key: &["environment_id", "connector_id"],
    indexes: &[],
    foreign_keys: &[
        ForeignKey::new("environment_id", "environments", "id", OnDelete::Cascade),
        ForeignKey::new("connector_id", "connectors", "id", OnDelete::Cascade),
    ],
};

pub const ENVIRONMENT_ID: Field<EnvironmentConnectorRelationship, Uuid> =
    Field::new("environment_id");
pub const CONNECTOR_ID: Field<EnvironmentConnectorRelationship, Uuid> = Field::new("connector_id");
pub const CREATE_TIME: Field<EnvironmentConnectorRelationship, DateTime<Utc>> =
    Field::new("create_time");

pub fn environment() -> Edge<EnvironmentConnectorRelationship, Environment> {
    Edge::to_one(
        "environment",
        "environment_id",
        "id",
        |r: &mut EnvironmentConnectorRelationship, rows| r.edges.environment = first_boxed(rows),
    )
}

pub fn connector() -> Edge<EnvironmentConnectorRelationship, Connector> {
    Edge::to_one(
        "connector",
        "connector_id",
        "id",
        |r: &mut EnvironmentConnectorRelationship, rows| r.edges.connector = first_boxed(rows),
    )
}

impl EnvironmentConnectorRelationship {
    pub fn new(environment_id: Uuid, connector_id: Uuid) -> Self {
        EnvironmentConnectorRelationship {
            environment_id,
            connector_id,
            ..Default::default()
        }
    }

    pub fn environment(&self) -> Result<&Environment, DaoError> {
        loaded_one(&self.edges.environment, "environment")
    }

    pub fn connector(&self) -> Result<&Connector, DaoError> {
        loaded_one(&self.edges.connector, "connector")
    }
}

impl Entity for EnvironmentConnectorRelationship {
    /// (environment_id, connector_id)
    type Id = (Uuid, Uuid);
    type Edges = EnvironmentConnectorRelationshipEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> (Uuid, Uuid) {
        (self.environment_id, self.connector_id)
    }

    fn edges(&self) -> &EnvironmentConnectorRelationshipEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut EnvironmentConnectorRelationshipEdges {
        &mut self.edges
    }

    fn id_predicate(id: &(Uuid, Uuid)) -> Predicate<Self> {
        Predicate::and([ENVIRONMENT_ID.eq(id.0), CONNECTOR_ID.eq(id.1)])
    }
}
