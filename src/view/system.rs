use super::{parse_uuid, patch, ApiEntity, NoInput, Operation, ALL_OPERATIONS};
use crate::error::AppError;
use crate::model::{setting, Perspective, Setting};
use crate::predicate::Predicate;
use crate::types::QueryCondition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MASK: &str = "******";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveCreateInput {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub allocation_queries: Vec<QueryCondition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveUpdateInput {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub allocation_queries: Option<Vec<QueryCondition>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveOutput {
    pub id: Uuid,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub builtin: bool,
    pub allocation_queries: Vec<QueryCondition>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for Perspective {
    const PATH: &'static str = "perspectives";
    const OPERATIONS: &'static [Operation] = ALL_OPERATIONS;

    type CreateInput = PerspectiveCreateInput;
    type UpdateInput = PerspectiveUpdateInput;
    type Output = PerspectiveOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(
        input: PerspectiveCreateInput,
        _project_id: Option<Uuid>,
    ) -> Result<Self, AppError> {
        Ok(Perspective {
            name: input.name,
            start_time: input.start_time,
            end_time: input.end_time,
            allocation_queries: input.allocation_queries,
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: PerspectiveUpdateInput) -> Result<(), AppError> {
        patch(&mut self.start_time, input.start_time);
        patch(&mut self.end_time, input.end_time);
        patch(&mut self.allocation_queries, input.allocation_queries);
        Ok(())
    }

    fn check_delete(&self) -> Result<(), AppError> {
        if self.builtin {
            return Err(AppError::NotAllowed(format!(
                "builtin perspective {} cannot be deleted",
                self.name
            )));
        }
        Ok(())
    }

    fn output(self) -> PerspectiveOutput {
        PerspectiveOutput {
            id: self.id,
            name: self.name,
            start_time: self.start_time,
            end_time: self.end_time,
            builtin: self.builtin,
            allocation_queries: self.allocation_queries,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingUpdateInput {
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingOutput {
    pub id: Uuid,
    pub name: String,
    pub value: String,
    pub editable: bool,
    pub private: bool,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for Setting {
    const PATH: &'static str = "settings";
    const OPERATIONS: &'static [Operation] = &[Operation::List, Operation::Read, Operation::Update];

    type CreateInput = NoInput;
    type UpdateInput = SettingUpdateInput;
    type Output = SettingOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(input: NoInput, _project_id: Option<Uuid>) -> Result<Self, AppError> {
        match input {}
    }

    fn apply_update(&mut self, input: SettingUpdateInput) -> Result<(), AppError> {
        if !self.editable {
            return Err(AppError::NotAllowed(format!("setting {} is not editable", self.name)));
        }
        patch(&mut self.value, input.value);
        Ok(())
    }

    fn list_filter() -> Option<Predicate<Self>> {
        Some(setting::HIDDEN.eq(false))
    }

    fn output(self) -> SettingOutput {
        let value = if self.private && !self.value.is_empty() {
            MASK.to_string()
        } else {
            self.value
        };
        SettingOutput {
            id: self.id,
            name: self.name,
            value,
            editable: self.editable,
            private: self.private,
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
    fn read_only_setting_rejects_update() {
        let mut s = Setting {
            name: "ServeUrl".into(),
            ..Default::default()
        };
        let input: SettingUpdateInput = serde_json::from_value(json!({"value": "x"})).unwrap();
        assert!(s.apply_update(input).is_err());

        s.editable = true;
        let input: SettingUpdateInput = serde_json::from_value(json!({"value": "x"})).unwrap();
        s.apply_update(input).unwrap();
        assert_eq!(s.value, "x");
    }

    #[test]
    fn private_value_is_masked() {
        let s = Setting {
            value: "token".into(),
            private: true,
            ..Default::default()
        };
        assert_eq!(s.output().value, MASK);
    }
}
