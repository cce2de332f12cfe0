use super::columns::{float_zero, json_object};
use super::Connector;
use crate::entity::{first_boxed, loaded_one, Edge, Entity, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use crate::types::{Labels, PvCost};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Cost of one workload item (container, pod, ...) over one collection window.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct AllocationCost {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub minutes: f64,
    pub connector_id: Uuid,
    pub name: String,
    /// Stable identity of the item within a window.
    pub fingerprint: String,
    pub cluster_name: Option<String>,
    pub namespace: Option<String>,
    pub node: Option<String>,
    pub controller: Option<String>,
    pub controller_kind: Option<String>,
    pub pod: Option<String>,
    pub container: Option<String>,
    /// Persistent volume costs by volume name.
    #[sqlx(json)]
    pub pvs: BTreeMap<String, PvCost>,
    #[sqlx(json)]
    pub labels: Labels,
    pub total_cost: f64,
    pub currency: Option<i32>,
    pub cpu_cost: f64,
    pub cpu_core_request: f64,
    pub gpu_cost: f64,
    pub gpu_count: f64,
    pub ram_cost: f64,
    pub ram_byte_request: f64,
    pub pv_cost: f64,
    pub pv_bytes: f64,
    pub load_balancer_cost: f64,
    pub cpu_core_usage_average: f64,
    pub cpu_core_usage_max: f64,
    pub ram_byte_usage_average: f64,
    pub ram_byte_usage_max: f64,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: AllocationCostEdges,
}

#[derive(Clone, Debug, Default)]
pub struct AllocationCostEdges {
    pub connector: Option<Option<Box<Connector>>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "allocation_cost",
    table: "allocation_costs",
    columns: &[
        Column::new("id", SqlType::BigSerial),
        Column::new("start_time", SqlType::Timestamp).immutable(),
        Column::new("end_time", SqlType::Timestamp).immutable(),
        Column::new("minutes", SqlType::Float).immutable().check(checks::non_negative),
        Column::new("connector_id", SqlType::Uuid).immutable(),
        Column::new("name", SqlType::Text).immutable(),
        Column::new("fingerprint", SqlType::Text).immutable(),
        Column::new("cluster_name", SqlType::Text).nullable().immutable(),
        Column::new("namespace", SqlType::Text).nullable().immutable(),
        Column::new("node", SqlType::Text).nullable().immutable(),
        Column::new("controller", SqlType::Text).nullable().immutable(),
        Column::new("controller_kind", SqlType::Text).nullable().immutable(),
        Column::new("pod", SqlType::Text).nullable().immutable(),
        Column::new("container", SqlType::Text).nullable().immutable(),
        json_object("pvs"),
        json_object("labels"),
        float_zero("total_cost").check(checks::non_negative),
        Column::new("currency", SqlType::Int).nullable(),
        float_zero("cpu_cost").check(checks::non_negative),
        float_zero("cpu_core_request"),
        float_zero("gpu_cost").check(checks::non_negative),
        float_zero("gpu_count"),
        float_zero("ram_cost").check(checks::non_negative),
        float_zero("ram_byte_request"),
        float_zero("pv_cost").check(checks::non_negative),
        float_zero("pv_bytes"),
        float_zero("load_balancer_cost").check(checks::non_negative),
        float_zero("cpu_core_usage_average"),
        float_zero("cpu_core_usage_max"),
        float_zero("ram_byte_usage_average"),
        float_zero("ram_byte_usage_max"),
    ],
    primary_key: &["id"],
    indexes: &[
        Index::new(
            "allocation_cost_start_time_end_time_connector_id_fingerprint",
            &["start_time", "end_time", "connector_id", "fingerprint"],
        )
        .unique(),
        Index::new("allocation_cost_connector_id_start_time", &["connector_id", "start_time"]),
    ],
    foreign_keys: &[ForeignKey::new("connector_id", "connectors", "id", OnDelete::Cascade)],
};

pub const ID: Field<AllocationCost, i64> = Field::new("id");
pub const START_TIME: Field<AllocationCost, DateTime<Utc>> = Field::new("start_time");
pub const END_TIME: Field<AllocationCost, DateTime<Utc>> = Field::new("end_time");
pub const MINUTES: Field<AllocationCost, f64> = Field::new("minutes");
pub const CONNECTOR_ID: Field<AllocationCost, Uuid> = Field::new("connector_id");
pub const NAME: Field<AllocationCost, String> = Field::new("name");
pub const FINGERPRINT: Field<AllocationCost, String> = Field::new("fingerprint");
pub const CLUSTER_NAME: Field<AllocationCost, String> = Field::new("cluster_name");
pub const NAMESPACE: Field<AllocationCost, String> = Field::new("namespace");
pub const NODE: Field<AllocationCost, String> = Field::new("node");
pub const CONTROLLER: Field<AllocationCost, String> = Field::new("controller");
pub const CONTROLLER_KIND: Field<AllocationCost, String> = Field::new("controller_kind");
pub const POD: Field<AllocationCost, String> = Field::new("pod");
pub const CONTAINER: Field<AllocationCost, String> = Field::new("container");
pub const LABELS: Field<AllocationCost, Labels> = Field::new("labels");
pub const TOTAL_COST: Field<AllocationCost, f64> = Field::new("total_cost");
pub const CPU_COST: Field<AllocationCost, f64> = Field::new("cpu_cost");
pub const GPU_COST: Field<AllocationCost, f64> = Field::new("gpu_cost");
pub const RAM_COST: Field<AllocationCost, f64> = Field::new("ram_cost");
pub const PV_COST: Field<AllocationCost, f64> = Field::new("pv_cost");
pub const LOAD_BALANCER_COST: Field<AllocationCost, f64> = Field::new("load_balancer_cost");

pub fn connector() -> Edge<AllocationCost, Connector> {
    Edge::to_one("connector", "connector_id", "id", |c: &mut AllocationCost, rows| {
        c.edges.connector = first_boxed(rows)
    })
}

impl AllocationCost {
    pub fn connector(&self) -> Result<&Connector, DaoError> {
        loaded_one(&self.edges.connector, "connector")
    }
}

impl Entity for AllocationCost {
    type Id = i64;
    type Edges = AllocationCostEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn edges(&self) -> &AllocationCostEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut AllocationCostEdges {
        &mut self.edges
    }
}

/// Upsert key of collected costs.
pub const CONFLICT_COLUMNS: &[&str] = &["start_time", "end_time", "connector_id", "fingerprint"];
