//! Rebuild client
//!
//! Typed client for the Admin Service rebuild endpoints and a poller that
//! follows a running rebuild to completion.

pub mod client;
pub mod poller;

pub use client::AdminClient;
pub use poller::{PollHandle, PollOutcome, StatusPoller, DEFAULT_POLL_INTERVAL};
