//! JSON-encoded composite column types.

mod cost;
mod role;
mod selector;
pub mod status;

pub use cost::{
    AllocationCostFilters, FilterRule, FinOpsCustomPricing, GroupByField, IdleCostFilter, Operator,
    PvCost, QueryCondition, SharedCost, SharingStrategy, Step,
};
pub use role::{RolePolicies, RolePolicy, RolePolicyScope};
pub use selector::{Selector, SelectorTarget};
pub use status::{Condition, ConditionStatus, Status};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Labels = BTreeMap<String, String>;
pub type Annotations = BTreeMap<String, String>;

/// Input variable of an application or instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

pub type Variables = Vec<Variable>;

/// Module reference recorded on a revision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationModule {
    #[serde(rename = "moduleID")]
    pub module_id: String,
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Provider requirement of a deployment, kept to detect provider changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequirement {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_constraints: Vec<String>,
}
