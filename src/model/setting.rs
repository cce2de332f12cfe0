use super::columns as col;
use crate::entity::Field;
use crate::schema::{checks, Column, EntitySchema, Index, SqlType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named system setting.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub id: Uuid,
    pub name: String,
    pub value: String,
    /// Not listed to clients.
    pub hidden: bool,
    pub editable: bool,
    /// Value is masked in responses.
    pub private: bool,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: SettingEdges,
}

#[derive(Clone, Debug, Default)]
pub struct SettingEdges {}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "setting",
    table: "settings",
    columns: &[
        col::UUID_ID,
        Column::new("name", SqlType::Text).immutable().check(checks::not_empty),
        Column::new("value", SqlType::Text).default_expr("''"),
        col::flag("hidden", "FALSE"),
        col::flag("editable", "FALSE"),
        col::flag("private", "FALSE"),
        col::CREATE_TIME,
        col::UPDATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[Index::new("setting_name", &["name"]).unique()],
    foreign_keys: &[],
};

pub const ID: Field<Setting, Uuid> = Field::new("id");
pub const NAME: Field<Setting, String> = Field::new("name");
pub const VALUE: Field<Setting, String> = Field::new("value");
pub const HIDDEN: Field<Setting, bool> = Field::new("hidden");
pub const EDITABLE: Field<Setting, bool> = Field::new("editable");
pub const PRIVATE: Field<Setting, bool> = Field::new("private");

uuid_entity!(Setting, SettingEdges);
