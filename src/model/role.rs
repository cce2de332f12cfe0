use super::columns as col;
use super::SubjectRoleRelationship;
use crate::entity::{loaded_many, Edge, Entity, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, SqlType};
use crate::types::RolePolicies;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND_SYSTEM: &str = "system";
pub const KIND_PROJECT: &str = "project";

/// A named set of policies, keyed by a readable id such as "system/admin".
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: String,
    pub kind: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub policies: RolePolicies,
    /// Granted implicitly to every signed-in session.
    pub session: bool,
    pub builtin: bool,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: RoleEdges,
}

#[derive(Clone, Debug, Default)]
pub struct RoleEdges {
    pub subjects: Option<Vec<SubjectRoleRelationship>>,
}

fn check_kind(v: &Value) -> Result<(), String> {
    match v.as_str() {
        Some(KIND_SYSTEM | KIND_PROJECT) => Ok(()),
        _ => Err(format!("must be one of {KIND_SYSTEM}, {KIND_PROJECT}")),
    }
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "role",
    table: "roles",
    columns: &[
        Column::new("id", SqlType::Text).check(checks::not_empty),
        Column::new("kind", SqlType::Text)
            .default_expr("'system'")
            .immutable()
            .check(check_kind),
        col::DESCRIPTION,
        col::json_array("policies"),
        col::flag("session", "FALSE"),
        col::flag("builtin", "FALSE").immutable(),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[],
    foreign_keys: &[],
};

pub const ID: Field<Role, String> = Field::new("id");
pub const KIND: Field<Role, String> = Field::new("kind");
pub const DESCRIPTION: Field<Role, String> = Field::new("description");
pub const POLICIES: Field<Role, RolePolicies> = Field::new("policies");
pub const SESSION: Field<Role, bool> = Field::new("session");
pub const BUILTIN: Field<Role, bool> = Field::new("builtin");
pub const CREATE_TIME: Field<Role, DateTime<Utc>> = Field::new("create_time");

pub fn subjects() -> Edge<Role, SubjectRoleRelationship> {
    Edge::to_many("subjects", "id", "role_id", |r: &mut Role, rows| r.edges.subjects = Some(rows))
}

impl Role {
    pub fn subjects(&self) -> Result<&[SubjectRoleRelationship], DaoError> {
        loaded_many(&self.edges.subjects, "subjects")
    }
}

impl Entity for Role {
    type Id = String;
    type Edges = RoleEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn edges(&self) -> &RoleEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut RoleEdges {
        &mut self.edges
    }

    fn prepare_create(&mut self) {
        if self.kind.is_empty() {
            self.kind = KIND_SYSTEM.to_string();
        }
        self.policies = std::mem::take(&mut self.policies).normalize().deduplicate();
    }
}
