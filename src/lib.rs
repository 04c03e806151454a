//! Greenroom: conference speaker portal backend.
//!
//! Serves the portal API: signed-link authentication, speaker and session
//! views over the external directory, and iCalendar subscription feeds. The
//! pure parts (token signing, feed encoding) live in `greenroom-core`.

pub mod config;
pub mod email;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod store;
pub mod urls;
