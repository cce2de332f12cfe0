use super::columns as col;
use super::ModuleVersion;
use crate::entity::{first_boxed, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use crate::types::{Selector, SelectorTarget};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Picks a module version and its attributes for resources matching `selector`.
/// Rules are evaluated by ascending `order`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourceDefinitionMatchingRule {
    pub id: Uuid,
    pub module_version_id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub selector: Selector,
    #[sqlx(json)]
    pub attributes: Map<String, Value>,
    pub order: i32,
    pub create_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ResourceDefinitionMatchingRuleEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ResourceDefinitionMatchingRuleEdges {
    pub module_version: Option<Option<Box<ModuleVersion>>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "resource_definition_matching_rule",
    table: "resource_definition_matching_rules",
    columns: &[
        col::UUID_ID,
        Column::new("module_version_id", SqlType::Uuid),
        Column::new("name", SqlType::Text).check(checks::dns_label),
        col::json_object("selector"),
        col::json_object("attributes"),
        Column::new("order", SqlType::Int)
            .default_expr("0")
            .check(checks::non_negative),
        col::CREATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new(
        "resource_definition_matching_rule_module_version_id_name",
        &["module_version_id", "name"],
    )
    .unique()],
    foreign_keys: &[ForeignKey::new(
        "module_version_id",
        "module_versions",
        "id",
        OnDelete::Cascade,
    )],
};

pub const ID: Field<ResourceDefinitionMatchingRule, Uuid> = Field::new("id");
pub const MODULE_VERSION_ID: Field<ResourceDefinitionMatchingRule, Uuid> =
    Field::new("module_version_id");
pub const NAME: Field<ResourceDefinitionMatchingRule, String> = Field::new("name");
pub const SELECTOR: Field<ResourceDefinitionMatchingRule, Selector> = Field::new("selector");
pub const ATTRIBUTES: Field<ResourceDefinitionMatchingRule, Map<String, Value>> =
    Field::new("attributes");
pub const ORDER: Field<ResourceDefinitionMatchingRule, i32> = Field::new("order");

pub fn module_version() -> Edge<ResourceDefinitionMatchingRule, ModuleVersion> {
    Edge::to_one(
        "module_version",
        "module_version_id",
        "id",
        |r: &mut ResourceDefinitionMatchingRule, rows| r.edges.module_version = first_boxed(rows),
    )
}

impl ResourceDefinitionMatchingRule {
    pub fn module_version(&self) -> Result<&ModuleVersion, DaoError> {
        loaded_one(&self.edges.module_version, "module_version")
    }
}

/// First rule, by `order`, whose selector matches `target`.
pub fn first_match<'a>(
    rules: &'a [ResourceDefinitionMatchingRule],
    target: &SelectorTarget<'_>,
) -> Option<&'a ResourceDefinitionMatchingRule> {
    rules
        .iter()
        .filter(|r| r.selector.matches(target))
        .min_by_key(|r| r.order)
}

uuid_entity!(ResourceDefinitionMatchingRule, ResourceDefinitionMatchingRuleEdges);
