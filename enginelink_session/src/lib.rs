//! Connection/session state machine for a user-hosted generation engine.
//!
//! Owns the lifecycle of the link to an uptime-unstable remote endpoint:
//! validation, periodic heartbeats, and reconciliation of the endpoint with
//! the persisted user record. Callers read [`ConnectionState`]; public
//! operations resolve to booleans and never throw.

mod cache;
mod config;
mod manager;
mod state;
mod sync;

pub use cache::*;
pub use config::*;
pub use manager::*;
pub use state::*;
pub use sync::*;
