use super::columns as col;
use super::{SubjectRoleRelationship, Token};
use crate::entity::{loaded_many, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, Index, SqlType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const KIND_USER: &str = "user";
pub const KIND_GROUP: &str = "group";
pub const DOMAIN_BUILTIN: &str = "builtin";

/// A user or a group of users.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subject {
    pub id: Uuid,
    pub kind: String,
    /// Identity source; built-in accounts live in "builtin".
    pub domain: String,
    pub name: String,
    pub description: Option<String>,
    pub builtin: bool,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: SubjectEdges,
}

#[derive(Clone, Debug, Default)]
pub struct SubjectEdges {
    pub roles: Option<Vec<SubjectRoleRelationship>>,
    pub tokens: Option<Vec<Token>>,
}

fn check_kind(v: &Value) -> Result<(), String> {
    match v.as_str() {
        Some(KIND_USER | KIND_GROUP) => Ok(()),
        _ => Err(format!("must be one of {KIND_USER}, {KIND_GROUP}")),
    }
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "subject",
    table: "subjects",
    columns: &[
        col::UUID_ID,
        Column::new("kind", SqlType::Text)
            .default_expr("'user'")
            .immutable()
            .check(check_kind),
        Column::new("domain", SqlType::Text)
            .default_expr("'builtin'")
            .immutable(),
        Column::new("name", SqlType::Text).immutable().check(checks::not_empty),
        col::DESCRIPTION,
        col::flag("builtin", "FALSE").immutable(),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new("subject_kind_domain_name", &["kind", "domain", "name"]).unique()],
    foreign_keys: &[],
};

pub const ID: Field<Subject, Uuid> = Field::new("id");
pub const KIND: Field<Subject, String> = Field::new("kind");
pub const DOMAIN: Field<Subject, String> = Field::new("domain");
pub const NAME: Field<Subject, String> = Field::new("name");
pub const DESCRIPTION: Field<Subject, String> = Field::new("description");
pub const BUILTIN: Field<Subject, bool> = Field::new("builtin");
pub const CREATE_TIME: Field<Subject, DateTime<Utc>> = Field::new("create_time");

pub fn roles() -> Edge<Subject, SubjectRoleRelationship> {
    Edge::to_many("roles", "id", "subject_id", |s: &mut Subject, rows| s.edges.roles = Some(rows))
}

pub fn tokens() -> Edge<Subject, Token> {
    Edge::to_many("tokens", "id", "subject_id", |s: &mut Subject, rows| s.edges.tokens = Some(rows))
}

impl Subject {
    pub fn roles(&self) -> Result<&[SubjectRoleRelationship], DaoError> {
        loaded_many(&self.edges.roles, "roles")
    }

    pub fn tokens(&self) -> Result<&[Token], DaoError> {
        loaded_many(&self.edges.tokens, "tokens")
    }
}

impl crate::entity::Entity for Subject {
    type Id = Uuid;
    type Edges = SubjectEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn edges(&self) -> &SubjectEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut SubjectEdges {
        &mut self.edges
    }

    fn prepare_create(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
        if self.kind.is_empty() {
            self.kind = KIND_USER.to_string();
        }
        if self.domain.is_empty() {
            self.domain = DOMAIN_BUILTIN.to_string();
        }
    }
}
