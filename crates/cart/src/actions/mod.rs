//! Cart mutation actions: add, remove, delete.
//!
//! Each action is a small struct holding its collaborators, wired once at
//! startup and shared behind an `Arc`. Identity handling is asymmetric on
//! purpose: adding without an identity is an error the caller must surface,
//! while removing or deleting without one is treated as "nothing to do".

mod add;
mod delete;
mod remove;

pub use add::AddCartItem;
pub use delete::DeleteCartItem;
pub use remove::RemoveCartItem;
