//! Core types for mailslot
//!
//! mailslot buffers chat messages delivered by a gateway connection so that
//! consumers can long-poll for "everything new since I last asked",
//! optionally restricted to one channel. The [`queue`] module is the heart of
//! it; the remaining modules are the collaborators that feed and drain it.

pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod poll;
pub mod queue;
pub mod resolve;
pub mod safety;

pub use error::{Error, Result};
pub use queue::{Entry, MessageQueue, QueueOptions};
