//! `shopcart-infra` — persistence and background execution.
//!
//! Holds the Postgres cart item store and the task runner that drives the
//! per-tenant scheduled tasks. Everything here is wiring; the semantics live
//! in the domain crates.

pub mod postgres;
pub mod scheduler;

pub use postgres::PostgresCartItemStore;
pub use scheduler::{TaskRunner, TaskRunnerConfig, TaskRunnerHandle};
