pub mod project;

pub use project::{ProjectScope, PROJECT_ID_HEADER};
