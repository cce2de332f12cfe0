use super::columns as col;
use super::{
    AllocationCost, ApplicationResource, ClusterCost, EnvironmentConnectorRelationship, Project,
};
use crate::crypto::Sealed;
use crate::entity::{first_boxed, loaded_many, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use crate::types::{Annotations, FinOpsCustomPricing, Labels, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const CATEGORY_KUBERNETES: &str = "Kubernetes";
pub const CATEGORY_CLOUD_PROVIDER: &str = "CloudProvider";
pub const CATEGORY_VERSION_CONTROL: &str = "VersionControl";
pub const CATEGORY_CUSTOM: &str = "Custom";

pub const STATUS_PROVISIONED: &str = "Provisioned";
pub const STATUS_COST_SYNCED: &str = "CostSynced";
pub const STATUS_READY: &str = "Ready";

/// Credentials and endpoint of an infrastructure provider, global when
/// `project_id` is null.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Connector {
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
    pub category: String,
    pub config_version: String,
    pub config_data: Sealed<Map<String, Value>>,
    pub enable_fin_ops: bool,
    #[sqlx(json)]
    pub fin_ops_custom_pricing: FinOpsCustomPricing,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ConnectorEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ConnectorEdges {
    pub project: Option<Option<Box<Project>>>,
    pub environments: Option<Vec<EnvironmentConnectorRelationship>>,
    pub resources: Option<Vec<ApplicationResource>>,
    pub cluster_costs: Option<Vec<ClusterCost>>,
    pub allocation_costs: Option<Vec<AllocationCost>>,
}

fn check_category(v: &Value) -> Result<(), String> {
    match v.as_str() {
        Some(
            CATEGORY_KUBERNETES
            | CATEGORY_CLOUD_PROVIDER
            | CATEGORY_VERSION_CONTROL
            | CATEGORY_CUSTOM,
        ) => Ok(()),
        _ => Err(format!(
            "must be one of {CATEGORY_KUBERNETES}, {CATEGORY_CLOUD_PROVIDER}, \
             {CATEGORY_VERSION_CONTROL}, {CATEGORY_CUSTOM}"
        )),
    }
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "connector",
    table: "connectors",
    columns: &[
        col::UUID_ID,
        Column::new("project_id", SqlType::Uuid).nullable().immutable(),
        Column::new("name", SqlType::Text).check(checks::dns_label),
        col::DESCRIPTION,
        col::LABELS,
        col::ANNOTATIONS,
        col::STATUS,
        Column::new("type", SqlType::Text).immutable().check(checks::not_empty),
        Column::new("category", SqlType::Text).immutable().check(check_category),
        Column::new("config_version", SqlType::Text).check(checks::not_empty),
        Column::new("config_data", SqlType::Text).default_expr("'{}'").sealed(),
        col::flag("enable_fin_ops", "FALSE"),
        col::json_object("fin_ops_custom_pricing"),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[
        Index::new("connector_name", &["name"]).unique().partial("project_id IS NULL"),
        Index::new("connector_project_id_name", &["project_id", "name"])
            .unique()
            .partial("project_id IS NOT NULL"),
    ],
    foreign_keys: &[ForeignKey::new("project_id", "projects", "id", OnDelete::Cascade)],
};

pub const ID: Field<Connector, Uuid> = Field::new("id");
pub const PROJECT_ID: Field<Connector, Uuid> = Field::new("project_id");
pub const NAME: Field<Connector, String> = Field::new("name");
pub const DESCRIPTION: Field<Connector, String> = Field::new("description");
pub const LABELS: Field<Connector, Labels> = Field::new("labels");
pub const STATUS: Field<Connector, Status> = Field::new("status");
pub const TYPE: Field<Connector, String> = Field::new("type");
pub const CATEGORY: Field<Connector, String> = Field::new("category");
pub const CONFIG_VERSION: Field<Connector, String> = Field::new("config_version");
pub const ENABLE_FIN_OPS: Field<Connector, bool> = Field::new("enable_fin_ops");
pub const FIN_OPS_CUSTOM_PRICING: Field<Connector, FinOpsCustomPricing> =
    Field::new("fin_ops_custom_pricing");
pub const CREATE_TIME: Field<Connector, DateTime<Utc>> = Field::new("create_time");
pub const UPDATE_TIME: Field<Connector, DateTime<Utc>> = Field::new("update_time");

pub fn project() -> Edge<Connector, Project> {
    Edge::to_one("project", "project_id", "id", |c: &mut Connector, rows| {
        c.edges.project = first_boxed(rows)
    })
}

pub fn environments() -> Edge<Connector, EnvironmentConnectorRelationship> {
    Edge::to_many("environments", "id", "connector_id", |c: &mut Connector, rows| {
        c.edges.environments = Some(rows)
    })
}

pub fn resources() -> Edge<Connector, ApplicationResource> {
    Edge::to_many("resources", "id", "connector_id", |c: &mut Connector, rows| {
        c.edges.resources = Some(rows)
    })
}

pub fn cluster_costs() -> Edge<Connector, ClusterCost> {
    Edge::to_many("cluster_costs", "id", "connector_id", |c: &mut Connector, rows| {
        c.edges.cluster_costs = Some(rows)
    })
}

pub fn allocation_costs() -> Edge<Connector, AllocationCost> {
    Edge::to_many("allocation_costs", "id", "connector_id", |c: &mut Connector, rows| {
        c.edges.allocation_costs = Some(rows)
    })
}

impl Connector {
    pub fn project(&self) -> Result<&Project, DaoError> {
        loaded_one(&self.edges.project, "project")
    }

    pub fn environments(&self) -> Result<&[EnvironmentConnectorRelationship], DaoError> {
        loaded_many(&self.edges.environments, "environments")
    }

    pub fn resources(&self) -> Result<&[ApplicationResource], DaoError> {
        loaded_many(&self.edges.resources, "resources")
    }

    pub fn cluster_costs(&self) -> Result<&[ClusterCost], DaoError> {
        loaded_many(&self.edges.cluster_costs, "cluster_costs")
    }

    pub fn allocation_costs(&self) -> Result<&[AllocationCost], DaoError> {
        loaded_many(&self.edges.allocation_costs, "allocation_costs")
    }

    pub fn is_kubernetes(&self) -> bool {
        self.category == CATEGORY_KUBERNETES
    }
}

impl crate::entity::Entity for Connector {
    type Id = Uuid;
    type Edges = ConnectorEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn edges(&self) -> &ConnectorEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut ConnectorEdges {
        &mut self.edges
    }

    fn prepare_create(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
        if self.enable_fin_ops && self.fin_ops_custom_pricing.is_zero() {
            self.fin_ops_custom_pricing = FinOpsCustomPricing::default_pricing();
        }
    }
}
