//! CPRHub REST API
//!
//! Role-scoped HTTP endpoints over the repositories in `cprhub-db`, with
//! bearer-token authentication from `cprhub-auth`. Every response except
//! `/health` is wrapped in a `{ "success", "data" | "error" }` envelope.

pub mod config;
pub mod dto;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod routes;
pub mod server;
pub mod state;

pub use routes::create_router;
pub use server::{create_server, run_server};
pub use state::{ApiConfig, AppState};
