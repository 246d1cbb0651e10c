//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Session arbitration and idle-timeout supervision."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
//! Session and service arbitration for the remote station.
//!
//! One operator at a time may hold the station, and while they do at most
//! one relay-gated service may be powered. The [`Arbiter`] owns that state;
//! the [`HeartbeatScheduler`] evicts sessions that were not refreshed in time.

mod arbiter;
mod error;
mod heartbeat;
mod identity;

pub use arbiter::{Arbiter, ArbiterSettings, StatusSnapshot, TimeoutEviction};
pub use error::{ArbiterError, AuthFailure, ConflictReason};
pub use heartbeat::HeartbeatScheduler;
pub use identity::{identity_of, AuthorizedTokens, OperatorId};
