use super::{parse_uuid, patch, ApiEntity, Operation, ALL_OPERATIONS};
use crate::crypto::Sealed;
use crate::error::AppError;
use crate::model::{Catalog, Connector};
use crate::types::{Annotations, FinOpsCustomPricing, Labels, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorCreateInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    #[serde(default)]
    pub config_version: String,
    #[serde(default)]
    pub config_data: Map<String, Value>,
    #[serde(default)]
    pub enable_fin_ops: bool,
    #[serde(default)]
    pub fin_ops_custom_pricing: FinOpsCustomPricing,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorUpdateInput {
    pub description: Option<String>,
    pub labels: Option<Labels>,
    pub annotations: Option<Annotations>,
    pub config_version: Option<String>,
    pub config_data: Option<Map<String, Value>>,
    pub enable_fin_ops: Option<bool>,
    pub fin_ops_custom_pricing: Option<FinOpsCustomPricing>,
}

/// Connector as listed to clients; credentials in `configData` stay server side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorOutput {
    pub id: Uuid,
    #[serde(rename = "projectID", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub labels: Labels,
    pub annotations: Annotations,
    pub status: Status,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub config_version: String,
    pub enable_fin_ops: bool,
    pub fin_ops_custom_pricing: FinOpsCustomPricing,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for Connector {
    const PATH: &'static str = "connectors";
    const OPERATIONS: &'static [Operation] = ALL_OPERATIONS;
    const PROJECT_COLUMN: Option<&'static str> = Some("project_id");

    type CreateInput = ConnectorCreateInput;
    type UpdateInput = ConnectorUpdateInput;
    type Output = ConnectorOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(input: ConnectorCreateInput, project_id: Option<Uuid>) -> Result<Self, AppError> {
        Ok(Connector {
            project_id,
            name: input.name,
            description: input.description,
            labels: input.labels,
            annotations: input.annotations,
            kind: input.kind,
            category: input.category,
            config_version: input.config_version,
            config_data: Sealed(input.config_data),
            enable_fin_ops: input.enable_fin_ops,
            fin_ops_custom_pricing: input.fin_ops_custom_pricing,
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: ConnectorUpdateInput) -> Result<(), AppError> {
        if input.description.is_some() {
            self.description = input.description;
        }
        patch(&mut self.labels, input.labels);
        patch(&mut self.annotations, input.annotations);
        patch(&mut self.config_version, input.config_version);
        patch(&mut self.config_data.0, input.config_data);
        patch(&mut self.enable_fin_ops, input.enable_fin_ops);
        patch(&mut self.fin_ops_custom_pricing, input.fin_ops_custom_pricing);
        if self.enable_fin_ops && self.fin_ops_custom_pricing.is_zero() {
            self.fin_ops_custom_pricing = FinOpsCustomPricing::default_pricing();
        }
        Ok(())
    }

    fn output(self) -> ConnectorOutput {
        ConnectorOutput {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            description: self.description,
            labels: self.labels,
            annotations: self.annotations,
            status: self.status,
            kind: self.kind,
            category: self.category,
            config_version: self.config_version,
            enable_fin_ops: self.enable_fin_ops,
            fin_ops_custom_pricing: self.fin_ops_custom_pricing,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCreateInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogUpdateInput {
    pub description: Option<String>,
    pub labels: Option<Labels>,
    pub annotations: Option<Annotations>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogOutput {
    pub id: Uuid,
    #[serde(rename = "projectID", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub labels: Labels,
    pub annotations: Annotations,
    pub status: Status,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for Catalog {
    const PATH: &'static str = "catalogs";
    const OPERATIONS: &'static [Operation] = ALL_OPERATIONS;
    const PROJECT_COLUMN: Option<&'static str> = Some("project_id");

    type CreateInput = CatalogCreateInput;
    type UpdateInput = CatalogUpdateInput;
    type Output = CatalogOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(input: CatalogCreateInput, project_id: Option<Uuid>) -> Result<Self, AppError> {
        Ok(Catalog {
            project_id,
            name: input.name,
            description: input.description,
            labels: input.labels,
            annotations: input.annotations,
            kind: input.kind,
            source: input.source,
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: CatalogUpdateInput) -> Result<(), AppError> {
        if input.description.is_some() {
            self.description = input.description;
        }
        patch(&mut self.labels, input.labels);
        patch(&mut self.annotations, input.annotations);
        Ok(())
    }

    fn output(self) -> CatalogOutput {
        CatalogOutput {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            description: self.description,
            labels: self.labels,
            annotations: self.annotations,
            status: self.status,
            kind: self.kind,
            source: self.source,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enabling_fin_ops_fills_default_pricing() {
        let mut c = Connector::default();
        let input: ConnectorUpdateInput =
            serde_json::from_value(json!({"enableFinOps": true})).unwrap();
        c.apply_update(input).unwrap();
        assert!(c.enable_fin_ops);
        assert!(!c.fin_ops_custom_pricing.is_zero());
    }

    #[test]
    fn connector_may_be_global() {
        let input: ConnectorCreateInput = serde_json::from_value(json!({
            "name": "aws",
            "type": "AWS",
            "category": "CloudProvider"
        }))
        .unwrap();
        let c = Connector::into_model(input, None).unwrap();
        assert!(c.project_id.is_none());
        let v = serde_json::to_value(c.output()).unwrap();
        assert!(v.get("projectID").is_none());
        assert!(v.get("configData").is_none());
    }
}
