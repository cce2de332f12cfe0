//! Table-backed entities, one module per table.
//!
//! Each module holds the row struct, its edges, the static `SCHEMA`
//! descriptor, typed column constants and edge constructors.

/// `Entity` impl for tables keyed by a client-generated UUID `id`.
macro_rules! uuid_entity {
    ($ty:ident, $edges:ident) => {
        impl $crate::entity::Entity for $ty {
            type Id = uuid::Uuid;
            type Edges = $edges;

            fn schema() -> &'static $crate::schema::EntitySchema {
                &SCHEMA
            }

            fn id(&self) -> uuid::Uuid {
                self.id
            }

            fn edges(&self) -> &$edges {
                &self.edges
            }

            fn edges_mut(&mut self) -> &mut $edges {
                &mut self.edges
            }

            fn prepare_create(&mut self) {
                if self.id.is_nil() {
                    self.id = uuid::Uuid::new_v4();
                }
            }
        }
    };
}

pub mod allocation_cost;
pub mod application;
pub mod application_instance;
pub mod application_module_relationship;
pub mod application_resource;
pub mod application_revision;
pub mod catalog;
pub mod cluster_cost;
pub mod connector;
pub mod environment;
pub mod environment_connector_relationship;
pub mod module;
pub mod module_version;
pub mod perspective;
pub mod project;
pub mod resource_definition_matching_rule;
pub mod role;
pub mod setting;
pub mod subject;
pub mod subject_role_relationship;
pub mod token;

pub use allocation_cost::AllocationCost;
pub use application::Application;
pub use application_instance::ApplicationInstance;
pub use application_module_relationship::ApplicationModuleRelationship;
pub use application_resource::ApplicationResource;
pub use application_revision::ApplicationRevision;
pub use catalog::Catalog;
pub use cluster_cost::ClusterCost;
pub use connector::Connector;
pub use environment::Environment;
pub use environment_connector_relationship::EnvironmentConnectorRelationship;
pub use module::Module;
pub use module_version::ModuleVersion;
pub use perspective::Perspective;
pub use project::Project;
pub use resource_definition_matching_rule::ResourceDefinitionMatchingRule;
pub use role::Role;
pub use setting::Setting;
pub use subject::Subject;
pub use subject_role_relationship::SubjectRoleRelationship;
pub use token::Token;

/// Columns shared by most tables.
pub(crate) mod columns {
    use crate::schema::{Column, SqlType};

    pub(crate) const UUID_ID: Column = Column::new("id", SqlType::Uuid);
    pub(crate) const CREATE_TIME: Column = Column::new("create_time", SqlType::Timestamp)
        .default_expr("NOW()")
        .immutable();
    pub(crate) const UPDATE_TIME: Column =
        Column::new("update_time", SqlType::Timestamp).default_expr("NOW()");
    pub(crate) const DESCRIPTION: Column = Column::new("description", SqlType::Text).nullable();
    pub(crate) const LABELS: Column = Column::new("labels", SqlType::Jsonb).default_expr("'{}'");
    pub(crate) const ANNOTATIONS: Column =
        Column::new("annotations", SqlType::Jsonb).default_expr("'{}'");
    pub(crate) const STATUS: Column = Column::new("status", SqlType::Jsonb).default_expr("'{}'");

    pub(crate) const fn json_object(name: &'static str) -> Column {
        Column::new(name, SqlType::Jsonb).default_expr("'{}'")
    }

    pub(crate) const fn json_array(name: &'static str) -> Column {
        Column::new(name, SqlType::Jsonb).default_expr("'[]'")
    }

    pub(crate) const fn float_zero(name: &'static str) -> Column {
        Column::new(name, SqlType::Float).default_expr("0")
    }

    pub(crate) const fn flag(name: &'static str, default: &'static str) -> Column {
        Column::new(name, SqlType::Bool).default_expr(default)
    }
}
