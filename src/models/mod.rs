//! Data models for the standards tracker.
//!
//! JSON field names match the documents written by the web client.

mod filter;
mod identity;
mod task;

pub use filter::*;
pub use identity::*;
pub use task::*;
