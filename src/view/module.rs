use super::{
    parse_text, parse_uuid, patch, ApiEntity, NoInput, Operation, ALL_OPERATIONS, READ_ONLY,
};
use crate::error::AppError;
use crate::model::{Module, ModuleVersion};
use crate::types::Labels;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCreateInput {
    pub id: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub labels: Labels,
    pub source: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUpdateInput {
    pub description: Option<String>,
    pub icon: Option<String>,
    pub labels: Option<Labels>,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOutput {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub labels: Labels,
    pub source: String,
    #[serde(rename = "catalogID", skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<Uuid>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for Module {
    const PATH: &'static str = "modules";
    const OPERATIONS: &'static [Operation] = ALL_OPERATIONS;

    type CreateInput = ModuleCreateInput;
    type UpdateInput = ModuleUpdateInput;
    type Output = ModuleOutput;

    fn parse_id(raw: &str) -> Result<String, AppError> {
        parse_text(raw)
    }

    fn into_model(input: ModuleCreateInput, _project_id: Option<Uuid>) -> Result<Self, AppError> {
        Ok(Module {
            id: input.id,
            description: input.description,
            icon: input.icon,
            labels: input.labels,
            source: input.source,
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: ModuleUpdateInput) -> Result<(), AppError> {
        if input.description.is_some() {
            self.description = input.description;
        }
        if input.icon.is_some() {
            self.icon = input.icon;
        }
        patch(&mut self.labels, input.labels);
        if let Some(source) = input.source {
            if source != self.source {
                // A new source is re-synced before the module is usable again.
                self.source = source;
                self.status = crate::model::module::STATUS_INITIALIZING.to_string();
                self.status_message.clear();
            }
        }
        Ok(())
    }

    fn output(self) -> ModuleOutput {
        ModuleOutput {
            id: self.id,
            status: self.status,
            status_message: self.status_message,
            description: self.description,
            icon: self.icon,
            labels: self.labels,
            source: self.source,
            catalog_id: self.catalog_id,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleVersionOutput {
    pub id: Uuid,
    #[serde(rename = "moduleID")]
    pub module_id: String,
    pub version: String,
    pub source: String,
    pub schema: Value,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for ModuleVersion {
    const PATH: &'static str = "module-versions";
    const OPERATIONS: &'static [Operation] = READ_ONLY;

    type CreateInput = NoInput;
    type UpdateInput = NoInput;
    type Output = ModuleVersionOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(input: NoInput, _project_id: Option<Uuid>) -> Result<Self, AppError> {
        match input {}
    }

    fn apply_update(&mut self, input: NoInput) -> Result<(), AppError> {
        match input {}
    }

    fn output(self) -> ModuleVersionOutput {
        ModuleVersionOutput {
            id: self.id,
            module_id: self.module_id,
            version: self.version,
            source: self.source,
            schema: self.schema,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::module::{STATUS_INITIALIZING, STATUS_READY};
    use serde_json::json;

    #[test]
    fn changing_source_resets_status() {
        let mut m = Module {
            id: "webservice".into(),
            source: "github.com/a/b".into(),
            status: STATUS_READY.into(),
            ..Default::default()
        };
        let same: ModuleUpdateInput =
            serde_json::from_value(json!({"source": "github.com/a/b"})).unwrap();
        m.apply_update(same).unwrap();
        assert_eq!(m.status, STATUS_READY);

        let moved: ModuleUpdateInput =
            serde_json::from_value(json!({"source": "github.com/a/c"})).unwrap();
        m.apply_update(moved).unwrap();
        assert_eq!(m.status, STATUS_INITIALIZING);
        assert_eq!(m.source, "github.com/a/c");
    }
}
