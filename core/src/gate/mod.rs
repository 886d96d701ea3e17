//! Non-blocking admission gates
//!
//! Both gates decide synchronously: a saturated gate rejects the caller
//! instead of queueing it.

mod create;
mod edit;

pub use create::{CreateGate, CreatePermit};
pub use edit::{EditGate, EditGuard};
