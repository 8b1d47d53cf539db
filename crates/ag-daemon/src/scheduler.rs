use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ag_core::agents::AgentRegistry;
use ag_core::config::Config;
use ag_core::types::WebhookPayload;
use ag_telemetry::metrics::global_metrics;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::clients::{AgentService, PostStore};
use crate::processed::ProcessedPosts;
use crate::publisher::{PostPublisher, PublishedPost};
use crate::shutdown::ShutdownSignal;
use crate::status::{next_post_in, StatusTracker, TickPhase};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong inside a tick.
///
/// None of these stop the loop. They are logged and the display string
/// becomes the tracker's `last_error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Agent health check failed: {0}")]
    DownstreamUnavailable(String),

    #[error("Error processing posts: {0}")]
    ListingFailure(String),

    #[error("Error sending to agent: post {post_id}: {reason}")]
    ForwardFailure { post_id: String, reason: String },

    #[error("Error creating agent post: {0}")]
    PublishFailure(String),

    #[error("Error in agent manager loop: {0}")]
    TickPanicked(String),
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What the forwarding step did in one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardReport {
    /// Posts returned by the listing.
    pub listed: usize,
    /// Newly seen posts the webhook accepted.
    pub forwarded: usize,
    /// Newly seen posts the webhook rejected; still marked processed.
    pub failed: usize,
    pub listing_failed: bool,
}

impl ForwardReport {
    /// Posts examined for the first time this tick.
    pub fn newly_processed(&self) -> usize {
        self.forwarded + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(PublishedPost),
    /// The minimum interval has not elapsed yet.
    Skipped { remaining: Duration },
    Failed(SchedulerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub healthy: bool,
    pub forward: ForwardReport,
    pub publish: PublishOutcome,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tick_interval: Duration,
    pub min_post_interval: Duration,
    pub processed_capacity: Option<usize>,
    pub agent_version: String,
    pub rng_seed: Option<u64>,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: config.scheduler.tick_interval(),
            min_post_interval: config.scheduler.min_post_interval(),
            processed_capacity: config.scheduler.processed_capacity(),
            agent_version: config.post_store.agent_version.clone(),
            rng_seed: config.scheduler.rng_seed,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ---------------------------------------------------------------------------
// AgentScheduler
// ---------------------------------------------------------------------------

/// The periodic control loop.
///
/// Each tick runs health check, forwarding and the rate-limited publish in
/// that order, each step best-effort: a failing step records an error and
/// the next step still runs.
pub struct AgentScheduler {
    registry: Arc<AgentRegistry>,
    post_store: Arc<dyn PostStore>,
    agent_service: Arc<dyn AgentService>,
    publisher: PostPublisher,
    tracker: StatusTracker,
    processed: ProcessedPosts,
    rng: StdRng,
    tick_interval: Duration,
    min_post_interval: Duration,
}

impl AgentScheduler {
    pub fn new(
        registry: Arc<AgentRegistry>,
        post_store: Arc<dyn PostStore>,
        agent_service: Arc<dyn AgentService>,
        tracker: StatusTracker,
        settings: SchedulerSettings,
    ) -> Self {
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            publisher: PostPublisher::new(post_store.clone(), settings.agent_version),
            registry,
            post_store,
            agent_service,
            tracker,
            processed: ProcessedPosts::new(settings.processed_capacity),
            rng,
            tick_interval: settings.tick_interval,
            min_post_interval: settings.min_post_interval,
        }
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    pub fn processed(&self) -> &ProcessedPosts {
        &self.processed
    }

    pub fn min_post_interval(&self) -> Duration {
        self.min_post_interval
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run ticks until `shutdown` fires, sleeping `tick_interval` after each.
    ///
    /// A panic inside a tick is caught here, recorded as the last error, and
    /// followed by the usual sleep.
    pub async fn run(&mut self, shutdown: ShutdownSignal) {
        let mut shutdown_rx = shutdown.subscribe();
        info!(
            tick_secs = self.tick_interval.as_secs(),
            min_post_interval_secs = self.min_post_interval.as_secs(),
            agents = self.registry.len(),
            "agent scheduler starting"
        );

        while !shutdown.is_shutting_down() {
            let outcome = AssertUnwindSafe(self.tick_at(Utc::now()))
                .catch_unwind()
                .await;
            if let Err(panic) = outcome {
                let err = SchedulerError::TickPanicked(panic_message(panic.as_ref()));
                error!(error = %err, "tick aborted");
                self.tracker.record_error(err.to_string()).await;
            }

            if !self.pause(&mut shutdown_rx).await {
                break;
            }
        }

        self.tracker.set_phase(TickPhase::Stopped).await;
        info!("agent scheduler stopped");
    }

    /// Sleep one tick interval in `Sleeping`, then move to `Idle`.
    ///
    /// Returns `false` when the shutdown signal fired first.
    async fn pause(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
        self.tracker.set_phase(TickPhase::Sleeping).await;
        tokio::select! {
            _ = tokio::time::sleep(self.tick_interval) => {
                self.tracker.set_phase(TickPhase::Idle).await;
                true
            }
            _ = shutdown_rx.recv() => {
                info!("shutdown signal received, stopping scheduler");
                false
            }
        }
    }

    /// One full iteration with `now` as the current instant.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickReport {
        let started = Instant::now();
        self.tracker.set_phase(TickPhase::HealthChecking).await;
        let healthy = self.check_health().await;

        self.tracker.set_phase(TickPhase::Forwarding).await;
        let forward = self.forward_new_posts().await;

        self.tracker.set_phase(TickPhase::RateLimitCheck).await;
        let publish = self.publish_if_due(now).await;

        let m = global_metrics();
        m.increment_counter("scheduler_ticks_total", &[]);
        m.set_gauge("processed_post_ids", self.processed.len() as i64);
        m.observe("tick_duration_seconds", started.elapsed().as_secs_f64());

        debug!(
            healthy,
            listed = forward.listed,
            forwarded = forward.forwarded,
            forward_failed = forward.failed,
            published = matches!(publish, PublishOutcome::Published(_)),
            "tick complete"
        );

        TickReport {
            healthy,
            forward,
            publish,
        }
    }

    /// Only a 2xx whose body decodes to a `healthy` or `ok` status passes;
    /// a 2xx with any other status or an undecodable body is a failure too.
    async fn check_health(&self) -> bool {
        let failure = match self.agent_service.health().await {
            Ok(health) if health.is_healthy() => {
                debug!("agent health check successful");
                global_metrics().increment_counter("health_checks_total", &[("outcome", "ok")]);
                return true;
            }
            Ok(health) => format!("service reported status {:?}", health.status),
            Err(e) => e.to_string(),
        };

        global_metrics().increment_counter("health_checks_total", &[("outcome", "error")]);
        let err = SchedulerError::DownstreamUnavailable(failure);
        // Restarting the agent service is left to the operator.
        warn!(error = %err, "agent service is not healthy");
        self.tracker.record_error(err.to_string()).await;
        false
    }

    async fn forward_new_posts(&mut self) -> ForwardReport {
        let posts = match self.post_store.list_posts().await {
            Ok(posts) => posts,
            Err(e) => {
                let err = SchedulerError::ListingFailure(e.to_string());
                error!(error = %err, "failed to list posts");
                self.tracker.record_error(err.to_string()).await;
                return ForwardReport {
                    listing_failed: true,
                    ..ForwardReport::default()
                };
            }
        };

        let mut report = ForwardReport {
            listed: posts.len(),
            ..ForwardReport::default()
        };

        for post in &posts {
            if self.processed.contains(&post.id) {
                continue;
            }
            info!(post_id = %post.id, "processing new post");

            match self.agent_service.forward(&WebhookPayload::from(post)).await {
                Ok(()) => {
                    report.forwarded += 1;
                    global_metrics()
                        .increment_counter("posts_forwarded_total", &[("outcome", "ok")]);
                    info!(post_id = %post.id, "post forwarded to agent");
                }
                Err(e) => {
                    report.failed += 1;
                    global_metrics()
                        .increment_counter("posts_forwarded_total", &[("outcome", "error")]);
                    let err = SchedulerError::ForwardFailure {
                        post_id: post.id.clone(),
                        reason: e.to_string(),
                    };
                    error!(error = %err, "forward failed, post will not be retried");
                    self.tracker.record_error(err.to_string()).await;
                }
            }

            self.processed.insert(post.id.clone());
            self.tracker.record_processed(1).await;
        }

        let listed: HashSet<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        let evicted = self.processed.evict_unlisted(&listed);
        if evicted > 0 {
            debug!(evicted, "dropped processed ids no longer listed");
        }

        report
    }

    async fn publish_if_due(&mut self, now: DateTime<Utc>) -> PublishOutcome {
        let last = self.tracker.last_post_time().await;
        let remaining = next_post_in(last, now, self.min_post_interval);
        if !remaining.is_zero() {
            self.tracker.set_phase(TickPhase::Skipped).await;
            debug!(remaining_secs = remaining.as_secs_f64(), "agent post not due yet");
            return PublishOutcome::Skipped { remaining };
        }

        self.tracker.set_phase(TickPhase::Publishing).await;
        let Some(profile) = self.registry.all().choose(&mut self.rng) else {
            let err = SchedulerError::PublishFailure("agent registry is empty".into());
            self.tracker.record_error(err.to_string()).await;
            return PublishOutcome::Failed(err);
        };

        match self.publisher.publish(profile, &mut self.rng).await {
            Ok(post) => {
                self.tracker.record_success(profile, now).await;
                global_metrics().increment_counter(
                    "agent_posts_total",
                    &[("agent", &profile.name), ("outcome", "ok")],
                );
                PublishOutcome::Published(post)
            }
            Err(e) => {
                global_metrics().increment_counter(
                    "agent_posts_total",
                    &[("agent", &profile.name), ("outcome", "error")],
                );
                let err = SchedulerError::PublishFailure(e.to_string());
                error!(error = %err, agent = %profile.name, "agent post failed");
                self.tracker.record_error(err.to_string()).await;
                PublishOutcome::Failed(err)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "tick panicked".to_string()
    }
}
