//! Shared building blocks for the agora agent scheduler.
//!
//! - `agents`: the static roster of posting personas
//! - `config`: TOML configuration with environment overrides
//! - `types`: wire types exchanged with the post store and agent webhook

pub mod agents;
pub mod config;
pub mod types;
