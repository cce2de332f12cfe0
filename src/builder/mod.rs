//! Generic query and mutation builders.

mod create;
mod delete;
mod query;
mod update;

pub use create::{Create, CreateBulk, Upsert, UpsertBulk};
pub use delete::{Delete, DeleteOne};
pub use query::Query;
pub use update::{Update, UpdateOne};

use crate::error::DaoError;
use crate::schema::EntitySchema;

/// Rejects names that are not columns of `schema`.
pub(crate) fn check_columns<'a>(
    schema: &EntitySchema,
    columns: impl IntoIterator<Item = &'a str>,
) -> Result<(), DaoError> {
    for c in columns {
        if !schema.has_column(c) {
            return Err(DaoError::validation(c, format!("invalid field for {}", schema.name)));
        }
    }
    Ok(())
}
