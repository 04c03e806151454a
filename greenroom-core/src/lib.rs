//! Core types for the greenroom speaker portal.
//!
//! This crate holds the two pieces of the portal that are pure functions of
//! their inputs and carry real contracts:
//! - `token`: issuance and verification of signed, scoped, time-limited
//!   access tokens used as bearer credentials in portal URLs
//! - `ics`: deterministic generation of iCalendar feeds from session records
//!
//! Neither module performs I/O. The HTTP server in the root package wires
//! them to the speaker directory and the request handlers.

pub mod error;
pub mod ics;
pub mod token;

pub use error::{PortalError, PortalResult};
pub use ics::{FeedBuilder, SessionEvent};
pub use token::{Claims, TokenSigner};
