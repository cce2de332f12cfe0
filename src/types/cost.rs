//! Cost columns: persistent-volume costs, custom pricing and perspective queries.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvCost {
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub bytes: f64,
}

/// Prices used when a connector has no cloud billing data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinOpsCustomPricing {
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub ram: f64,
    #[serde(default)]
    pub gpu: f64,
    #[serde(default)]
    pub storage: f64,
    #[serde(default)]
    pub currency: String,
}

impl FinOpsCustomPricing {
    /// Prices applied to new connectors, in USD per hour and per GiB-hour.
    pub fn default_pricing() -> Self {
        FinOpsCustomPricing {
            cpu: 0.031611,
            ram: 0.004237,
            gpu: 0.95,
            storage: 0.00005479452,
            currency: "USD".into(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.cpu == 0.0 && self.ram == 0.0 && self.gpu == 0.0 && self.storage == 0.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    In,
    #[serde(rename = "notin")]
    NotIn,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    pub field_name: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default)]
    pub include_all: bool,
}

/// Outer list is OR-ed, inner lists are AND-ed.
pub type AllocationCostFilters = Vec<Vec<FilterRule>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleCostFilter {
    #[serde(rename = "connectorID")]
    pub connector_id: String,
    #[serde(default)]
    pub include_all: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharingStrategy {
    #[default]
    Equally,
    Proportionally,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedCost {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: AllocationCostFilters,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub idle_cost_filters: Vec<IdleCostFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub management_cost_filters: Vec<IdleCostFilter>,
    #[serde(default)]
    pub sharing_strategy: SharingStrategy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

/// Grouping of a cost query: a column, a time bucket, or `label:<key>`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupByField(pub String);

const LABEL_PREFIX: &str = "label:";
const TIME_BUCKETS: &[&str] = &["day", "week", "month", "year"];

impl GroupByField {
    pub fn label(&self) -> Option<&str> {
        self.0.strip_prefix(LABEL_PREFIX)
    }

    pub fn is_time_bucket(&self) -> bool {
        TIME_BUCKETS.contains(&self.0.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCondition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: AllocationCostFilters,
    #[serde(default, rename = "shareCosts", skip_serializing_if = "Vec::is_empty")]
    pub shared_costs: Vec<SharedCost>,
    #[serde(default)]
    pub group_by: GroupByField,
    #[serde(default)]
    pub step: Step,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_condition_reads_camel_case() {
        let q: QueryCondition = serde_json::from_value(json!({
            "filters": [[
                {"fieldName": "namespace", "operator": "notin", "values": ["kube-system"]}
            ]],
            "groupBy": "label:seal.io/app",
            "step": "month"
        }))
        .unwrap();
        assert_eq!(q.filters[0][0].operator, Operator::NotIn);
        assert_eq!(q.group_by.label(), Some("seal.io/app"));
        assert!(!q.group_by.is_time_bucket());
        assert_eq!(q.step, Step::Month);
    }

    #[test]
    fn default_pricing_is_not_zero() {
        assert!(!FinOpsCustomPricing::default_pricing().is_zero());
        assert!(FinOpsCustomPricing::default().is_zero());
    }
}
