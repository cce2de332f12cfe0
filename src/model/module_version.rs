use super::columns as col;
use super::{Module, ResourceDefinitionMatchingRule};
use crate::entity::{first_boxed, loaded_many, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One released version of a module with its variable schema.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModuleVersion {
    pub id: Uuid,
    pub module_id: String,
    pub version: String,
    pub source: String,
    /// Variables and outputs of this version, as parsed from the module source.
    pub schema: Value,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: ModuleVersionEdges,
}

#[derive(Clone, Debug, Default)]
pub struct ModuleVersionEdges {
    pub module: Option<Option<Box<Module>>>,
    pub matching_rules: Option<Vec<ResourceDefinitionMatchingRule>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "module_version",
    table: "module_versions",
    columns: &[
        col::UUID_ID,
        Column::new("module_id", SqlType::Text).immutable(),
        Column::new("version", SqlType::Text).immutable().check(checks::not_empty),
        Column::new("source", SqlType::Text).check(checks::not_empty),
        col::json_object("schema"),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new("module_version_module_id_version", &["module_id", "version"]).unique()],
    foreign_keys: &[ForeignKey::new("module_id", "modules", "id", OnDelete::Cascade)],
};

pub const ID: Field<ModuleVersion, Uuid> = Field::new("id");
pub const MODULE_ID: Field<ModuleVersion, String> = Field::new("module_id");
pub const VERSION: Field<ModuleVersion, String> = Field::new("version");
pub const SOURCE: Field<ModuleVersion, String> = Field::new("source");
pub const SCHEMA_FIELD: Field<ModuleVersion, Value> = Field::new("schema");
pub const CREATE_TIME: Field<ModuleVersion, DateTime<Utc>> = Field::new("create_time");

pub fn module() -> Edge<ModuleVersion, Module> {
    Edge::to_one("module", "module_id", "id", |v: &mut ModuleVersion, rows| {
        v.edges.module = first_boxed(rows)
    })
}

pub fn matching_rules() -> Edge<ModuleVersion, ResourceDefinitionMatchingRule> {
    Edge::to_many("matching_rules", "id", "module_version_id", |v: &mut ModuleVersion, rows| {
        v.edges.matching_rules = Some(rows)
    })
}

impl ModuleVersion {
    pub fn module(&self) -> Result<&Module, DaoError> {
        loaded_one(&self.edges.module, "module")
    }

    pub fn matching_rules(&self) -> Result<&[ResourceDefinitionMatchingRule], DaoError> {
        loaded_many(&self.edges.matching_rules, "matching_rules")
    }
}

uuid_entity!(ModuleVersion, ModuleVersionEdges);
