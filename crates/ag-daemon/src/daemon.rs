use std::sync::Arc;

use ag_core::agents::AgentRegistry;
use ag_core::config::Config;
use anyhow::{Context, Result};
use tracing::{error, info};

use crate::clients::{build_http_client, AgentService, HttpAgentService, HttpPostStore, PostStore};
use crate::scheduler::{AgentScheduler, SchedulerSettings};
use crate::shutdown::ShutdownSignal;
use crate::status::StatusTracker;
use crate::status_api::{status_router, StatusState};

/// The agent scheduler process: one scheduler loop plus the status server.
///
/// Both halves share a [`StatusTracker`] and stop when the
/// [`ShutdownSignal`] is triggered (ctrl-c in the binary, directly in tests).
pub struct Daemon {
    config: Config,
    registry: Arc<AgentRegistry>,
    post_store: Arc<dyn PostStore>,
    agent_service: Arc<dyn AgentService>,
    tracker: StatusTracker,
    shutdown: ShutdownSignal,
}

impl Daemon {
    /// Build a daemon talking HTTP to the collaborators named in `config`.
    pub fn new(config: Config) -> Result<Self> {
        let client = build_http_client(config.scheduler.request_timeout())
            .context("failed to build HTTP client")?;
        let post_store = Arc::new(HttpPostStore::new(
            client.clone(),
            config.post_store.base_url.clone(),
        ));
        let agent_service = Arc::new(HttpAgentService::new(
            client,
            config.agent_service.base_url.clone(),
        ));
        Self::with_collaborators(config, post_store, agent_service)
    }

    /// Build a daemon around caller-supplied collaborators.
    pub fn with_collaborators(
        config: Config,
        post_store: Arc<dyn PostStore>,
        agent_service: Arc<dyn AgentService>,
    ) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let registry = Arc::new(config.registry().context("invalid agent roster")?);
        let tracker = StatusTracker::new(&registry);
        Ok(Self {
            config,
            registry,
            post_store,
            agent_service,
            tracker,
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Returns a handle that can be used to trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind the configured status address and run until shutdown.
    pub async fn run(&self) -> Result<()> {
        let bind_addr = self.config.status.bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind status server to {bind_addr}"))?;
        self.run_with_listener(listener).await
    }

    /// Run using a pre-bound listener (blocking until shutdown).
    ///
    /// Tests bind `127.0.0.1:0` and pass the listener in.
    pub async fn run_with_listener(&self, listener: tokio::net::TcpListener) -> Result<()> {
        let settings = SchedulerSettings::from_config(&self.config);
        let router = status_router(StatusState {
            tracker: self.tracker.clone(),
            registry: self.registry.clone(),
            min_post_interval: settings.min_post_interval,
        });

        let bind_addr = listener.local_addr()?;
        let shutdown = self.shutdown.clone();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.wait().await })
                .await
            {
                error!(error = %e, "status server error");
            }
        });
        info!(
            %bind_addr,
            post_store = %self.config.post_store.base_url,
            agent_service = %self.config.agent_service.base_url,
            "status server listening"
        );

        let mut scheduler = AgentScheduler::new(
            self.registry.clone(),
            self.post_store.clone(),
            self.agent_service.clone(),
            self.tracker.clone(),
            settings,
        );
        // Runs inline until the shutdown signal fires.
        scheduler.run(self.shutdown.clone()).await;

        server.await.context("status server task panicked")?;
        info!("daemon stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::{InMemoryPostStore, RecordingAgentService};

    #[test]
    fn rejects_invalid_config() {
        let mut config = Config::default();
        config.scheduler.tick_interval_secs = 0;
        let result = Daemon::with_collaborators(
            config,
            Arc::new(InMemoryPostStore::new()),
            Arc::new(RecordingAgentService::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tracker_starts_with_roster() {
        let daemon = Daemon::with_collaborators(
            Config::default(),
            Arc::new(InMemoryPostStore::new()),
            Arc::new(RecordingAgentService::new()),
        )
        .unwrap();
        let snap = daemon.tracker().snapshot().await;
        assert_eq!(snap.agent_status.len(), daemon.registry().len());
    }
}
