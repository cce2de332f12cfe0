use super::{parse_text, parse_uuid, ApiEntity, NoInput, Operation, Ref, ALL_OPERATIONS};
use crate::builder::Query;
use crate::client::Client;
use crate::dao;
use crate::error::{AppError, DaoError};
use crate::model::subject::SubjectEdges;
use crate::model::{
    subject, subject_role_relationship as srr, Role, Subject, SubjectRoleRelationship, Token,
};
use crate::types::RolePolicies;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCreateInput {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    pub description: Option<String>,
    #[serde(default)]
    pub policies: RolePolicies,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdateInput {
    pub description: Option<String>,
    pub policies: Option<RolePolicies>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleOutput {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub policies: RolePolicies,
    pub session: bool,
    pub builtin: bool,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl ApiEntity for Role {
    const PATH: &'static str = "roles";
    const OPERATIONS: &'static [Operation] = ALL_OPERATIONS;

    type CreateInput = RoleCreateInput;
    type UpdateInput = RoleUpdateInput;
    type Output = RoleOutput;

    fn parse_id(raw: &str) -> Result<String, AppError> {
        parse_text(raw)
    }

    fn into_model(input: RoleCreateInput, _project_id: Option<Uuid>) -> Result<Self, AppError> {
        Ok(Role {
            id: input.id,
            kind: input.kind,
            description: input.description,
            policies: input.policies,
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: RoleUpdateInput) -> Result<(), AppError> {
        if self.builtin {
            return Err(AppError::NotAllowed(format!(
                "builtin role {} cannot be modified",
                self.id
            )));
        }
        if input.description.is_some() {
            self.description = input.description;
        }
        if let Some(policies) = input.policies {
            self.policies = policies.normalize().deduplicate();
        }
        Ok(())
    }

    fn check_delete(&self) -> Result<(), AppError> {
        if self.builtin {
            return Err(AppError::NotAllowed(format!("builtin role {} cannot be deleted", self.id)));
        }
        Ok(())
    }

    fn output(self) -> RoleOutput {
        RoleOutput {
            id: self.id,
            kind: self.kind,
            description: self.description,
            policies: self.policies,
            session: self.session,
            builtin: self.builtin,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

/// Global role granted to a subject, `{"role": {"id": ...}}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SubjectRoleInput {
    pub role: Ref<String>,
}

/// Role binding of a subject; `project` is set for project-scoped bindings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubjectRoleOutput {
    pub role: Ref<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Ref<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCreateInput {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub domain: String,
    pub name: String,
    pub description: Option<String>,
    pub roles: Option<Vec<SubjectRoleInput>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectUpdateInput {
    pub description: Option<String>,
    /// Replaces the global roles when present.
    pub roles: Option<Vec<SubjectRoleInput>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOutput {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub domain: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub builtin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<SubjectRoleOutput>>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

fn role_edges(roles: Vec<SubjectRoleInput>) -> Vec<SubjectRoleRelationship> {
    roles
        .into_iter()
        .map(|r| SubjectRoleRelationship {
            role_id: r.role.id,
            ..Default::default()
        })
        .collect()
}

impl ApiEntity for Subject {
    const PATH: &'static str = "subjects";
    const OPERATIONS: &'static [Operation] = ALL_OPERATIONS;

    type CreateInput = SubjectCreateInput;
    type UpdateInput = SubjectUpdateInput;
    type Output = SubjectOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(input: SubjectCreateInput, _project_id: Option<Uuid>) -> Result<Self, AppError> {
        Ok(Subject {
            kind: input.kind,
            domain: input.domain,
            name: input.name,
            description: input.description,
            edges: SubjectEdges {
                roles: input.roles.map(role_edges),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: SubjectUpdateInput) -> Result<(), AppError> {
        if input.description.is_some() {
            self.description = input.description;
        }
        if let Some(roles) = input.roles {
            self.edges.roles = Some(role_edges(roles));
        }
        Ok(())
    }

    fn save_edges<'a>(&'a self, client: &'a Client) -> BoxFuture<'a, Result<(), DaoError>> {
        Box::pin(async move {
            let Some(rels) = &self.edges.roles else {
                return Ok(());
            };
            let mut role_ids: Vec<String> = rels
                .iter()
                .filter(|r| r.project_id.is_none())
                .map(|r| r.role_id.clone())
                .collect();
            role_ids.sort();
            role_ids.dedup();
            dao::sync_subject_roles(client, self.id, &role_ids).await
        })
    }

    fn with_edges(query: Query<Self>) -> Query<Self> {
        query.with(subject::roles(), |q| q.order(srr::ROLE_ID.asc()))
    }

    fn check_delete(&self) -> Result<(), AppError> {
        if self.builtin {
            return Err(AppError::NotAllowed(format!(
                "builtin subject {} cannot be deleted",
                self.name
            )));
        }
        Ok(())
    }

    fn output(self) -> SubjectOutput {
        SubjectOutput {
            id: self.id,
            kind: self.kind,
            domain: self.domain,
            name: self.name,
            description: self.description,
            builtin: self.builtin,
            roles: self.edges.roles.map(|rels| {
                rels.into_iter()
                    .map(|r| SubjectRoleOutput {
                        role: Ref { id: r.role_id },
                        project: r.project_id.map(|id| Ref { id }),
                    })
                    .collect()
            }),
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreateInput {
    #[serde(rename = "subjectID")]
    pub subject_id: Uuid,
    pub name: String,
    /// Lifetime in seconds; tokens without one never expire.
    pub expiration_seconds: Option<i64>,
}

/// Token as returned to clients. The secret value is returned once, as
/// `accessToken` in the create response, and never read back.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOutput {
    pub id: Uuid,
    #[serde(rename = "subjectID")]
    pub subject_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
}

impl ApiEntity for Token {
    const PATH: &'static str = "tokens";
    const OPERATIONS: &'static [Operation] =
        &[Operation::List, Operation::Read, Operation::Create, Operation::Delete];

    type CreateInput = TokenCreateInput;
    type UpdateInput = NoInput;
    type Output = TokenOutput;

    fn parse_id(raw: &str) -> Result<Uuid, AppError> {
        parse_uuid(raw)
    }

    fn into_model(input: TokenCreateInput, _project_id: Option<Uuid>) -> Result<Self, AppError> {
        let expiration = match input.expiration_seconds {
            Some(s) if s <= 0 => {
                return Err(AppError::BadRequest("expirationSeconds must be positive".into()));
            }
            Some(s) => Some(Utc::now() + chrono::Duration::seconds(s)),
            None => None,
        };
        Ok(Token {
            subject_id: input.subject_id,
            name: input.name,
            expiration,
            ..Default::default()
        })
    }

    fn apply_update(&mut self, input: NoInput) -> Result<(), AppError> {
        match input {}
    }

    fn output(self) -> TokenOutput {
        TokenOutput {
            id: self.id,
            subject_id: self.subject_id,
            kind: self.kind,
            name: self.name,
            expiration: self.expiration,
            access_token: None,
            create_time: self.create_time,
        }
    }

    fn create_output(mut self) -> TokenOutput {
        let value = std::mem::take(&mut self.value).into_inner();
        TokenOutput {
            access_token: Some(value),
            ..self.output()
        }
    }
}
