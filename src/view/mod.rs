//! Request and response shapes of the REST surface.
//!
//! Inputs and outputs are camelCase JSON. `UpdateInput`s are patches: absent
//! fields leave the stored value untouched.

mod application;
mod connector;
mod module;
mod project;
mod rbac;
mod system;

pub use application::{
    ApplicationCreateInput, ApplicationInstanceCreateInput, ApplicationInstanceOutput,
    ApplicationInstanceUpdateInput, ApplicationOutput, ApplicationResourceOutput,
    ApplicationRevisionOutput, ApplicationUpdateInput,
};
pub use connector::{
    CatalogCreateInput, CatalogOutput, CatalogUpdateInput, ConnectorCreateInput, ConnectorOutput,
    ConnectorUpdateInput,
};
pub use module::{ModuleCreateInput, ModuleOutput, ModuleUpdateInput, ModuleVersionOutput};
pub use project::{
    EnvironmentConnector, EnvironmentCreateInput, EnvironmentOutput, EnvironmentUpdateInput,
    ProjectCreateInput, ProjectOutput, ProjectUpdateInput,
};
pub use rbac::{
    RoleCreateInput, RoleOutput, RoleUpdateInput, SubjectCreateInput, SubjectOutput,
    SubjectRoleInput, SubjectRoleOutput, SubjectUpdateInput, TokenCreateInput, TokenOutput,
};
pub use system::{
    PerspectiveCreateInput, PerspectiveOutput, PerspectiveUpdateInput, SettingOutput,
    SettingUpdateInput,
};

use crate::builder::Query;
use crate::client::Client;
use crate::entity::Entity;
use crate::error::{AppError, DaoError};
use crate::predicate::Predicate;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// REST operations an entity may expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    Read,
    Create,
    Update,
    Delete,
    BulkCreate,
    BulkDelete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::BulkCreate => "bulk create",
            Operation::BulkDelete => "bulk delete",
        }
    }
}

pub const ALL_OPERATIONS: &[Operation] = &[
    Operation::List,
    Operation::Read,
    Operation::Create,
    Operation::Update,
    Operation::Delete,
    Operation::BulkCreate,
    Operation::BulkDelete,
];

pub const READ_ONLY: &[Operation] = &[Operation::List, Operation::Read];

/// Input of an operation the entity does not support. It cannot be deserialized.
#[derive(Debug, Deserialize)]
pub enum NoInput {}

/// An entity exposed under `/v1/{PATH}`.
pub trait ApiEntity: Entity {
    const PATH: &'static str;
    const OPERATIONS: &'static [Operation];
    /// Column holding the owning project; lists and lookups are narrowed to
    /// the `X-Project-ID` project when set.
    const PROJECT_COLUMN: Option<&'static str> = None;

    type CreateInput: DeserializeOwned + Send;
    type UpdateInput: DeserializeOwned + Send;
    type Output: Serialize + Send;

    fn parse_id(raw: &str) -> Result<Self::Id, AppError>;

    fn into_model(input: Self::CreateInput, project_id: Option<Uuid>) -> Result<Self, AppError>;

    fn apply_update(&mut self, input: Self::UpdateInput) -> Result<(), AppError>;

    /// Filter applied to every list, e.g. to keep internal rows out of view.
    fn list_filter() -> Option<Predicate<Self>> {
        None
    }

    /// Refuses deletion of rows the system depends on.
    fn check_delete(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// Writes the edges an input carried, after the row itself is saved.
    /// Runs in the transaction of the request.
    fn save_edges<'a>(&'a self, _client: &'a Client) -> BoxFuture<'a, Result<(), DaoError>> {
        Box::pin(async { Ok(()) })
    }

    /// Eager-loads the edges shown in the output.
    fn with_edges(query: Query<Self>) -> Query<Self> {
        query
    }

    fn output(self) -> Self::Output;

    /// Output of a row just created; may show values later reads never return.
    fn create_output(self) -> Self::Output {
        self.output()
    }
}

/// Reference to a related row by key, `{"id": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ref<Id> {
    pub id: Id,
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("invalid id {raw:?}")))
}

pub(crate) fn parse_text(raw: &str) -> Result<String, AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::BadRequest("empty id".into()));
    }
    Ok(raw.to_string())
}

/// The project a project-owned entity is created in.
pub(crate) fn require_project(project_id: Option<Uuid>) -> Result<Uuid, AppError> {
    project_id.ok_or_else(|| AppError::BadRequest("X-Project-ID header is required".into()))
}

/// Overwrites `target` when the patch carries a value.
pub(crate) fn patch<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sealed;
    use crate::model::{Connector, Project, Setting, Token};
    use serde_json::json;

    #[test]
    fn project_input_converts_and_patches() {
        let input: ProjectCreateInput = serde_json::from_value(json!({
            "name": "demo",
            "labels": {"team": "a"}
        }))
        .unwrap();
        let mut p = Project::into_model(input, None).unwrap();
        assert_eq!(p.name, "demo");
        assert_eq!(p.labels.get("team").map(String::as_str), Some("a"));
        assert!(p.description.is_none());

        let patch: ProjectUpdateInput =
            serde_json::from_value(json!({"description": "d"})).unwrap();
        p.apply_update(patch).unwrap();
        assert_eq!(p.description.as_deref(), Some("d"));
        assert_eq!(p.name, "demo");
    }

    #[test]
    fn outputs_are_camel_case() {
        let p = Project {
            name: "demo".into(),
            ..Default::default()
        };
        let v = serde_json::to_value(p.output()).unwrap();
        assert!(v.get("createTime").is_some(), "{v}");
        assert!(v.get("create_time").is_none());
    }

    #[test]
    fn secrets_are_hidden() {
        let t = Token {
            name: "ci".into(),
            value: Sealed("secret".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(t.output()).unwrap();
        assert!(!v.to_string().contains("secret"), "{v}");

        let mut c = Connector {
            name: "k8s".into(),
            ..Default::default()
        };
        c.config_data.insert("kubeconfig".into(), json!("secret"));
        let v = serde_json::to_value(c.output()).unwrap();
        assert!(!v.to_string().contains("secret"), "{v}");

        let s = Setting {
            name: "ServeUrl".into(),
            value: "hidden-value".into(),
            private: true,
            ..Default::default()
        };
        let v = serde_json::to_value(s.output()).unwrap();
        assert!(!v.to_string().contains("hidden-value"), "{v}");
    }

    #[test]
    fn project_owned_entities_require_a_project() {
        let input: EnvironmentCreateInput = serde_json::from_value(json!({"name": "dev"})).unwrap();
        assert!(crate::model::Environment::into_model(input, None).is_err());

        let pid = Uuid::new_v4();
        let input: EnvironmentCreateInput =
            serde_json::from_value(json!({"name": "dev", "type": "production"})).unwrap();
        let env = crate::model::Environment::into_model(input, Some(pid)).unwrap();
        assert_eq!(env.project_id, pid);
        assert_eq!(env.kind, "production");
    }

    #[test]
    fn no_input_never_deserializes() {
        assert!(serde_json::from_value::<NoInput>(json!({})).is_err());
    }

    #[test]
    fn ids_are_parsed_per_key_type() {
        assert!(Project::parse_id("not-a-uuid").is_err());
        assert!(crate::model::Role::parse_id("system/admin").is_ok());
    }
}
