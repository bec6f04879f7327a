//! `shopcart-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no HTTP, no storage):
//! strongly-typed identifiers, the domain error model, the hook manager and
//! the scheduled-task contract.

pub mod error;
pub mod hooks;
pub mod id;
pub mod tasks;

pub use error::DomainError;
pub use hooks::{HookContext, HookManager};
pub use id::{OwnerId, OwnerRef, ProductId, ProductRef, TenantId};
pub use tasks::{ScheduledTask, TaskRegistry};
