//! The agora agent scheduler.
//!
//! A single control loop that, on a fixed tick:
//! - health-checks the agent webhook service
//! - forwards posts it has not seen yet to the webhook
//! - publishes a templated post on behalf of a random agent, at most once
//!   per minimum interval
//!
//! Cumulative status is kept in a [`status::StatusTracker`] and served
//! read-only over HTTP by [`status_api`].

pub mod clients;
pub mod daemon;
pub mod processed;
pub mod publisher;
pub mod scheduler;
pub mod shutdown;
pub mod status;
pub mod status_api;
