use super::columns as col;
use super::{Project, Role, Subject};
use crate::entity::{first_boxed, loaded_one, Edge, Field};
use crate::error::DaoError;
use crate::schema::{Column, EntitySchema, ForeignKey, Index, OnDelete, SqlType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role binding of a subject, global when `project_id` is null.
#[derive(Clone, Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubjectRoleRelationship {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub subject_id: Uuid,
    pub role_id: String,
    pub create_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub edges: SubjectRoleRelationshipEdges,
}

#[derive(Clone, Debug, Default)]
pub struct SubjectRoleRelationshipEdges {
    pub project: Option<Option<Box<Project>>>,
    pub subject: Option<Option<Box<Subject>>>,
    pub role: Option<Option<Box<Role>>>,
}

pub static SCHEMA: EntitySchema = EntitySchema {
    name: "subject_role_relationship",
    table: "subject_role_relationships",
    columns: &[
        col::UUID_ID,
        Column::new("project_id", SqlType::Uuid).nullable().immutable(),
        Column::new("subject_id", SqlType::Uuid).immutable(),
        Column::new("role_id", SqlType::Text).immutable(),
        col::CREATE_TIME,
    ],
    primary_key: &["id"],
    indexes: &[
        Index::new("subject_role_relationship_subject_id_role_id", &["subject_id", "role_id"])
            .unique()
            .partial("project_id IS NULL"),
        Index::new(
            "subject_role_relationship_project_id_subject_id_role_id",
            &["project_id", "subject_id", "role_id"],
        )
        .unique()
        .partial("project_id IS NOT NULL"),
    ],
    foreign_keys: &[
        ForeignKey::new("project_id", "projects", "id", OnDelete::Cascade),
        ForeignKey::new("subject_id", "subjects", "id", OnDelete::Cascade),
        ForeignKey::new("role_id", "roles", "id", OnDelete::Cascade),
    ],
};

pub const ID: Field<SubjectRoleRelationship, Uuid> = Field::new("id");
pub const PROJECT_ID: Field<SubjectRoleRelationship, Uuid> = Field::new("project_id");
pub const SUBJECT_ID: Field<SubjectRoleRelationship, Uuid> = Field::new("subject_id");
pub const ROLE_ID: Field<SubjectRoleRelationship, String> = Field::new("role_id");
pub const CREATE_TIME: Field<SubjectRoleRelationship, DateTime<Utc>> = Field::new("create_time");

pub fn project() -> Edge<SubjectRoleRelationship, Project> {
    Edge::to_one("project", "project_id", "id", |r: &mut SubjectRoleRelationship, rows| {
        r.edges.project = first_boxed(rows)
    })
}

pub fn subject() -> Edge<SubjectRoleRelationship, Subject> {
    Edge::to_one("subject", "subject_id", "id", |r: &mut SubjectRoleRelationship, rows| {
        r.edges.subject = first_boxed(rows)
    })
}

pub fn role() -> Edge<SubjectRoleRelationship, Role> {
    Edge::to_one("role", "role_id", "id", |r: &mut SubjectRoleRelationship, rows| {
        r.edges.role = first_boxed(rows)
    })
}

impl SubjectRoleRelationship {
    pub fn project(&self) -> Result<&Project, DaoError> {
        loaded_one(&self.edges.project, "project")
    }

    pub fn subject(&self) -> Result<&Subject, DaoError> {
        loaded_one(&self.edges.subject, "subject")
    }

    pub fn role(&self) -> Result<&Role, DaoError> {
        loaded_one(&self.edges.role, "role")
    }
}

uuid_entity!(SubjectRoleRelationship, SubjectRoleRelationshipEdges);
