//! Access control, confirmation and audit collaborators

pub mod audit;
pub mod confirm;
pub mod filter;

pub use audit::{AuditEntry, AuditLogger};
pub use confirm::ConfirmationTracker;
pub use filter::ChannelFilter;
