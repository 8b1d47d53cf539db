use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ag_core::agents::{AgentProfile, AgentRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// TickPhase
// ---------------------------------------------------------------------------

/// Where the scheduler loop currently is.
///
/// ```text
/// Idle -> HealthChecking -> Forwarding -> RateLimitCheck
///      -> (Publishing | Skipped) -> Sleeping -> Idle ...
/// ```
///
/// `Stopped` is only entered after a shutdown signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TickPhase {
    #[default]
    Idle,
    HealthChecking,
    Forwarding,
    RateLimitCheck,
    Publishing,
    Skipped,
    Sleeping,
    Stopped,
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDetails {
    pub role: String,
    pub description: String,
    pub avatar: String,
}

impl From<&AgentProfile> for AgentDetails {
    fn from(profile: &AgentProfile) -> Self {
        Self {
            role: profile.role.clone(),
            description: profile.description.clone(),
            avatar: profile.avatar.clone(),
        }
    }
}

/// Per-agent counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub count: u64,
    pub last_post_time: Option<DateTime<Utc>>,
    pub role: String,
    pub description: String,
    pub avatar: String,
}

impl AgentStats {
    fn new(profile: &AgentProfile) -> Self {
        Self {
            count: 0,
            last_post_time: None,
            role: profile.role.clone(),
            description: profile.description.clone(),
            avatar: profile.avatar.clone(),
        }
    }
}

/// Point-in-time copy of everything the scheduler tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub last_post_time: Option<DateTime<Utc>>,
    pub last_agent: Option<String>,
    pub last_agent_details: Option<AgentDetails>,
    pub total_posts_created: u64,
    pub total_posts_processed: u64,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub phase: TickPhase,
    pub agent_status: BTreeMap<String, AgentStats>,
}

impl StatusSnapshot {
    /// Sum of per-agent counts; equals `total_posts_created`.
    pub fn per_agent_total(&self) -> u64 {
        self.agent_status.values().map(|s| s.count).sum()
    }
}

// ---------------------------------------------------------------------------
// StatusTracker
// ---------------------------------------------------------------------------

/// Shared, lock-protected scheduler status.
///
/// Cloning yields another handle to the same state. The scheduler loop is
/// the only writer; the status endpoint reads through [`snapshot`], which
/// copies under the read lock and therefore never observes a half-applied
/// update.
///
/// [`snapshot`]: StatusTracker::snapshot
#[derive(Debug, Clone)]
pub struct StatusTracker {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusTracker {
    /// Fresh status with every registered agent at zero.
    pub fn new(registry: &AgentRegistry) -> Self {
        Self::starting_at(registry, Utc::now())
    }

    pub fn starting_at(registry: &AgentRegistry, started_at: DateTime<Utc>) -> Self {
        let agent_status = registry
            .all()
            .iter()
            .map(|p| (p.name.clone(), AgentStats::new(p)))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot {
                last_post_time: None,
                last_agent: None,
                last_agent_details: None,
                total_posts_created: 0,
                total_posts_processed: 0,
                last_error: None,
                started_at,
                phase: TickPhase::Idle,
                agent_status,
            })),
        }
    }

    /// A publish for `agent` succeeded at `at`.
    ///
    /// `last_post_time` never moves backwards, even if `at` is older than a
    /// previously recorded success.
    pub async fn record_success(&self, agent: &AgentProfile, at: DateTime<Utc>) {
        let mut s = self.inner.write().await;
        let latest = s.last_post_time.map_or(at, |prev| prev.max(at));
        s.last_post_time = Some(latest);
        s.last_agent = Some(agent.name.clone());
        s.last_agent_details = Some(AgentDetails::from(agent));
        s.total_posts_created += 1;
        s.last_error = None;

        let stats = s
            .agent_status
            .entry(agent.name.clone())
            .or_insert_with(|| AgentStats::new(agent));
        stats.count += 1;
        stats.last_post_time = Some(stats.last_post_time.map_or(at, |prev| prev.max(at)));
    }

    /// Remember the most recent failure. Counters are left alone.
    pub async fn record_error(&self, message: impl Into<String>) {
        self.inner.write().await.last_error = Some(message.into());
    }

    pub async fn record_processed(&self, count: u64) {
        self.inner.write().await.total_posts_processed += count;
    }

    pub async fn set_phase(&self, phase: TickPhase) {
        self.inner.write().await.phase = phase;
    }

    pub async fn last_post_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_post_time
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().await.clone()
    }
}

// ---------------------------------------------------------------------------
// Rate-limit arithmetic
// ---------------------------------------------------------------------------

/// Time left before the next publish is allowed.
///
/// Zero when nothing was ever published or `min_interval` has fully elapsed.
/// A `last_post` in the future (clock step) counts as zero elapsed time.
pub fn next_post_in(
    last_post: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    min_interval: Duration,
) -> Duration {
    let Some(last) = last_post else {
        return Duration::ZERO;
    };
    let elapsed = now
        .signed_duration_since(last)
        .to_std()
        .unwrap_or(Duration::ZERO);
    min_interval.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(vec![
            AgentProfile::new("A", "Role A", "Desc A", "a")
                .with_templates(["{emoji}"])
                .with_emojis(["x"]),
            AgentProfile::new("B", "Role B", "Desc B", "b")
                .with_templates(["{emoji}"])
                .with_emojis(["y"]),
        ])
        .unwrap()
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn fresh_tracker_lists_every_agent() {
        let tracker = StatusTracker::starting_at(&registry(), t(0));
        let snap = tracker.snapshot().await;
        assert_eq!(snap.agent_status.len(), 2);
        assert_eq!(snap.total_posts_created, 0);
        assert_eq!(snap.started_at, t(0));
        assert_eq!(snap.phase, TickPhase::Idle);
        assert!(snap.last_post_time.is_none());
    }

    #[tokio::test]
    async fn success_updates_totals_and_clears_error() {
        let reg = registry();
        let tracker = StatusTracker::new(&reg);
        tracker.record_error("boom").await;
        tracker.record_success(&reg.all()[0], t(10)).await;

        let snap = tracker.snapshot().await;
        assert_eq!(snap.total_posts_created, 1);
        assert_eq!(snap.last_agent.as_deref(), Some("A"));
        assert_eq!(snap.last_agent_details.unwrap().role, "Role A");
        assert_eq!(snap.last_post_time, Some(t(10)));
        assert_eq!(snap.agent_status["A"].count, 1);
        assert_eq!(snap.agent_status["A"].last_post_time, Some(t(10)));
        assert_eq!(snap.agent_status["B"].count, 0);
        assert!(snap.last_error.is_none());
    }

    #[tokio::test]
    async fn error_keeps_counters() {
        let reg = registry();
        let tracker = StatusTracker::new(&reg);
        tracker.record_success(&reg.all()[1], t(1)).await;
        tracker.record_processed(3).await;
        tracker.record_error("downstream down").await;

        let snap = tracker.snapshot().await;
        assert_eq!(snap.total_posts_created, 1);
        assert_eq!(snap.total_posts_processed, 3);
        assert_eq!(snap.agent_status["B"].count, 1);
        assert_eq!(snap.last_error.as_deref(), Some("downstream down"));
    }

    #[tokio::test]
    async fn last_post_time_never_goes_backwards() {
        let reg = registry();
        let tracker = StatusTracker::new(&reg);
        tracker.record_success(&reg.all()[0], t(100)).await;
        tracker.record_success(&reg.all()[0], t(50)).await;
        assert_eq!(tracker.last_post_time().await, Some(t(100)));
        assert_eq!(tracker.snapshot().await.total_posts_created, 2);
    }

    #[tokio::test]
    async fn per_agent_sum_matches_total() {
        let reg = registry();
        let tracker = StatusTracker::new(&reg);
        for i in 0..7 {
            tracker.record_success(&reg.all()[i % 2], t(i as i64)).await;
        }
        let snap = tracker.snapshot().await;
        assert_eq!(snap.total_posts_created, 7);
        assert_eq!(snap.per_agent_total(), 7);
    }

    #[test]
    fn next_post_in_cases() {
        let min = Duration::from_secs(60);
        assert_eq!(next_post_in(None, t(0), min), Duration::ZERO);
        assert_eq!(next_post_in(Some(t(0)), t(30), min), Duration::from_secs(30));
        assert_eq!(next_post_in(Some(t(0)), t(60), min), Duration::ZERO);
        assert_eq!(next_post_in(Some(t(0)), t(61), min), Duration::ZERO);
        assert_eq!(next_post_in(Some(t(10)), t(0), min), min);
    }

    #[test]
    fn phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TickPhase::RateLimitCheck).unwrap(),
            "\"rate_limit_check\""
        );
    }
}
