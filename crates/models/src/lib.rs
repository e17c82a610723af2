//! Persistence models: flat, storage-shaped structs mirroring one table
//! each. Business logic never constructs these directly; the repository
//! layer maps them to and from domain entities.

pub mod account;
pub mod account_verification;
pub mod db;
pub mod tenant;

#[cfg(test)]
mod tests;
