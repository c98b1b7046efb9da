//! CPRHub Core: domain models, repository traits, workflow state
//! machines and billing arithmetic shared by every other crate.

#[macro_use]
mod macros;

pub mod billing;
pub mod error;
pub mod models;
pub mod repository;
pub mod workflow;
