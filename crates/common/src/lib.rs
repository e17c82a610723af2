//! Shared building blocks: the error taxonomy, logging setup and pagination
//! normalisation used across the workspace.

pub mod errors;
pub mod logging;
pub mod pagination;
