//! Observability for the agora scheduler.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`
//! - **Metrics**: process-wide counters, gauges and duration summaries with
//!   Prometheus text export
//! - **Middleware**: axum layers for request metrics and `x-request-id`
//!   correlation on the status server

pub mod logging;
pub mod metrics;
pub mod middleware;
