//! Session Manager: conversation state, DB-context reuse across turns on a
//! socket, and the auto-expiry housekeeping sweep.

mod manager;

pub use manager::{SendOutcome, SessionManager};
