//! HTTP handlers for entity CRUD.

pub mod resource;
pub use resource::*;
