//! Walrus model: typed PostgreSQL data access for infrastructure-management
//! entities, with a REST surface over the same model.

pub mod builder;
pub mod case;
pub mod client;
pub mod config;
pub mod crypto;
pub mod dao;
pub mod driver;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod model;
pub mod predicate;
pub mod response;
pub mod routes;
pub mod schema;
pub mod sql;
pub mod state;
pub mod store;
pub mod tx;
pub mod types;
pub mod validation;
pub mod view;

pub use client::{Client, EntityClient};
pub use config::Config;
pub use entity::{Edge, Entity, Field};
pub use error::{mask_not_found, AppError, ConfigError, DaoError};
pub use migration::apply_migrations;
pub use predicate::{Order, Predicate};
pub use routes::app;
pub use state::AppState;
pub use store::{ensure_database_exists, open};
pub use tx::Tx;
