use super::columns as col;
use crate::entity::Field;
use crate::schema::{checks, Column, EntitySchema, Index, SqlType};
use crate::types::QueryCondition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved cost view. Times are relative expressions such as "now-7d".
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Perspective {
    pub id: Uuid,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub builtin: bool,
    #[sqlx(json)]
    pub allocation_queries: Vec<QueryCondition>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: PerspectiveEdges,
}

#[derive(Clone, Debug, Default)]
pub struct PerspectiveEdges {}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "perspective",
    table: "perspectives",
    columns: &[
        col::UUID_ID,
        Column::new("name", SqlType::Text).check(checks::not_empty),
        Column::new("start_time", SqlType::Text).check(checks::not_empty),
        Column::new("end_time", SqlType::Text).check(checks::not_empty),
        col::flag("builtin", "FALSE").immutable(),
        col::json_array("allocation_queries"),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new("perspective_name", &["name"]).unique()],
    foreign_keys: &[],
};

pub const ID: Field<Perspective, Uuid> = Field::new("id");
pub const NAME: Field<Perspective, String> = Field::new("name");
pub const START_TIME: Field<Perspective, String> = Field::new("start_time");
pub const END_TIME: Field<Perspective, String> = Field::new("end_time");
pub const BUILTIN: Field<Perspective, bool> = Field::new("builtin");
pub const ALLOCATION_QUERIES: Field<Perspective, Vec<QueryCondition>> =
    Field::new("allocation_queries");
pub const CREATE_TIME: Field<Perspective, DateTime<Utc>> = Field::new("create_time");

uuid_entity!(Perspective, PerspectiveEdges);
