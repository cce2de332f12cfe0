use super::columns as col;
use super::Subject;
use crate::crypto::Sealed;
use crate::entity::{first_boxed, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{checks, Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const KIND_API: &str = "api";

/// Access token of a subject.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Token {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub kind: String,
    pub name: String,
    pub expiration: Option<DateTime<Utc>>,
    /// Secret; filled on create when empty.
    pub value: Sealed<String>,
    pub create_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: TokenEdges,
}

#[derive(Clone, Debug, Default)]
pub struct TokenEdges {
    pub subject: Option<Option<Box<Subject>>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "token",
    table: "tokens",
    columns: &[
        col::UUID_ID,
        Column::new("subject_id", SqlType::Uuid).immutable(),
        Column::new("kind", SqlType::Text).default_expr("'api'").immutable(),
        Column::new("name", SqlType::Text).immutable().check(checks::not_empty),
        Column::new("expiration", SqlType::Timestamp).nullable().immutable(),
        Column::new("value", SqlType::Text).immutable().sealed(),
        col::CREATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new("token_subject_id_name", &["subject_id", "name"]).unique()],
    foreign_keys: &[ForeignKey::new("subject_id", "subjects", "id", OnDelete::Cascade)],
};

pub const ID: Field<Token, Uuid> = Field::new("id");
pub const SUBJECT_ID: Field<Token, Uuid> = Field::new("subject_id");
pub const KIND: Field<Token, String> = Field::new("kind");
pub const NAME: Field<Token, String> = Field::new("name");
pub const EXPIRATION: Field<Token, DateTime<Utc>> = Field::new("expiration");
pub const CREATE_TIME: Field<Token, DateTime<Utc>> = Field::new("create_time");

pub fn subject() -> Edge<Token, Subject> {
    Edge::to_one("subject", "subject_id", "id", |t: &mut Token, rows| {
        t.edges.subject = first_boxed(rows)
    })
}

impl Token {
    pub fn subject(&self) -> Result<&Subject, DaoError> {
        loaded_one(&self.edges.subject, "subject")
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|e| e <= now)
    }
}

impl crate::entity::Entity for Token {
    type Id = Uuid;
    type Edges = TokenEdges;

    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn edges(&self) -> &TokenEdges {
        &self.edges
    }

    fn edges_mut(&mut self) -> &mut TokenEdges {
        &mut self.edges
    }

    fn prepare_create(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
        if self.kind.is_empty() {
            self.kind = KIND_API.to_string();
        }
        if self.value.is_empty() {
            self.value = Sealed(format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()));
        }
    }
}
