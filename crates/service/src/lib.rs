//! The request-scoped transactional data-access core.
//! - `scope`: binds one write transaction / read session per request and
//!   guarantees commit-or-rollback exactly once.
//! - `repository`: generic entity/model repository with condition chaining.
//! - `uniqueness`: concurrent multi-field uniqueness validation.
//! - `domain`: validated entities and their persistence mapping.
//! - `registration`: the tenant registration workflow on top of the above.

pub mod domain;
pub mod registration;
pub mod repository;
pub mod scope;
pub mod uniqueness;

#[cfg(test)]
pub mod test_support;
