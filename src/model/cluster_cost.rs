use super::columns as col;
use super::Connector;
use crate::entity::{first_boxed, loaded_one, Edge, Entity, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cost of a whole cluster over one collection window.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClusterCost {
    /// Assigned by the database; zero before insert.
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub minutes: f64,
    pub connector_id: Uuid,
    pub cluster_name: String,
    pub total_cost: f64,
    pub currency: Option<i32>,
    pub allocation_cost: f64,
    pub idle_cost: f64,
    pub management_cost: f64,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ClusterCostEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ClusterCostEdges {
    pub connector: Option<Option<Box<Connector>>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "cluster_cost",
    table: "cluster_costs",
    columns: &[
        Column::new("id", SqlType::BigSerial),
        Column::new("start_time", SqlType::Timestamp).immutable(),
        Column::new("end_time", SqlType::Timestamp).immutable(),
        Column::new("minutes", SqlType::Float).immutable().check(checks::non_negative),
        Column::new("connector_id", SqlType::Uuid).immutable(),
        Column::new("cluster_name", SqlType::Text).immutable().check(checks::not_empty),
        col::float_zero("total_cost").check(checks::non_negative),
        Column::new("currency", SqlType::Int).nullable(),
        col::float_zero("allocation_cost").check(checks::non_negative),
        col::float_zero("idle_cost").check(checks::non_negative),
        col::float_zero("management_cost").check(checks::non_negative),
    ],
    primary_key: &["id"],
    indexes: &[
        Index::new(
            "cluster_cost_start_time_end_time_connector_id",
            &["start_time", "end_time", "connector_id"],
        )
        .unique(),
    ],
    foreign_keys: &[ForeignKey::new("connector_id", "connectors", "id", OnDelete::Cascade)],
};

pub const ID: Field<ClusterCost, i64> = Field::new("id");
pub const START_TIME: Field<ClusterCost, DateTime<Utc>> = Field::new("start_time");
pub const END_TIME: Field<ClusterCost, DateTime<Utc>> = Field::new("end_time");
pub const MINUTES: Field<ClusterCost, f64> = Field::new("minutes");
pub const CONNECTOR_ID: Field<ClusterCost, Uuid> = Field::new("connector_id");
pub const CLUSTER_NAME: Field<ClusterCost, String> = Field::new("cluster_name");
pub const TOTAL_COST: Field<ClusterCost, f64> = Field::new("total_cost");
pub const CURRENCY: Field<ClusterCost, i32> = Field::new("currency");
pub const ALLOCATION_COST: Field<ClusterCost, f64> = Field::new("allocation_cost");
pub const IDLE_COST: Field<ClusterCost, f64> = Field::new("idle_cost");
pub const MANAGEMENT_COST: Field<ClusterCost, f64> = Field::new("management_cost");

pub fn connector() -> Edge<ClusterCost, Connector> {
    Edge::to_one("connector", "connector_id", "id", |c: &mut ClusterCost, rows| {
        c.edges.connector = first_boxed(rows)
    })
}

impl ClusterCost {
    pub fn connector(&self) -> Result<&Connector, DaoError> {
        loaded_one(&self.edges.connector, "connector")
    }
}

impl Entity for ClusterCost {
    type Id = i64;
    type Edges = ClusterCostEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn edges(&self) -> &ClusterCostEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut ClusterCostEdges {
        &mut self.edges
    }
}
