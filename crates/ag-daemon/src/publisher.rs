use std::sync::Arc;

use ag_core::agents::{AgentProfile, EMOJI_PLACEHOLDER};
use ag_core::types::NewPost;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::clients::PostStore;

/// A post the store accepted on an agent's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub id: String,
    pub created_at: Option<String>,
    pub agent: String,
    pub content: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("failed to publish for {agent}: {reason}")]
pub struct PublishError {
    pub agent: String,
    pub reason: String,
}

/// Pick a template and an emoji and fill every `{emoji}` placeholder.
///
/// `None` only for a profile with no templates or no emojis, which a
/// validated registry never contains.
pub fn compose_message<R: Rng + ?Sized>(profile: &AgentProfile, rng: &mut R) -> Option<String> {
    let template = profile.templates.choose(rng)?;
    let emoji = profile.emojis.choose(rng)?;
    Some(template.replace(EMOJI_PLACEHOLDER, emoji))
}

/// Formats and submits agent posts to the post store.
///
/// Publishing never touches the status tracker; the scheduler records the
/// outcome.
#[derive(Clone)]
pub struct PostPublisher {
    store: Arc<dyn PostStore>,
    agent_version: String,
}

impl PostPublisher {
    pub fn new(store: Arc<dyn PostStore>, agent_version: impl Into<String>) -> Self {
        Self {
            store,
            agent_version: agent_version.into(),
        }
    }

    pub fn agent_version(&self) -> &str {
        &self.agent_version
    }

    pub async fn publish<R: Rng + ?Sized>(
        &self,
        profile: &AgentProfile,
        rng: &mut R,
    ) -> Result<PublishedPost, PublishError> {
        let content = compose_message(profile, rng).ok_or_else(|| PublishError {
            agent: profile.name.clone(),
            reason: "agent has no templates or emojis".into(),
        })?;

        let request = NewPost {
            content,
            agent: profile.name.clone(),
            role: profile.role.clone(),
            avatar: profile.avatar.clone(),
            agent_version: self.agent_version.clone(),
        };
        debug!(agent = %profile.name, content = %request.content, "submitting agent post");

        let stored = self
            .store
            .create_post(&request)
            .await
            .map_err(|e| PublishError {
                agent: profile.name.clone(),
                reason: e.to_string(),
            })?;

        info!(
            agent = %profile.name,
            role = %profile.role,
            post_id = %stored.id,
            content = %request.content,
            "agent created a new post"
        );

        Ok(PublishedPost {
            id: stored.id,
            created_at: stored.created_at,
            agent: profile.name.clone(),
            content: request.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::InMemoryPostStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn agent_a() -> AgentProfile {
        AgentProfile::new("AgentA", "Greeter", "Says hi", "A")
            .with_templates(["Hi {emoji}"])
            .with_emojis(["!"])
    }

    #[test]
    fn compose_substitutes_placeholder() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(compose_message(&agent_a(), &mut rng).as_deref(), Some("Hi !"));
    }

    #[test]
    fn compose_replaces_every_placeholder() {
        let profile = AgentProfile::new("B", "r", "d", "b")
            .with_templates(["{emoji} twice {emoji}"])
            .with_emojis(["*"]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            compose_message(&profile, &mut rng).as_deref(),
            Some("* twice *")
        );
    }

    #[test]
    fn compose_is_deterministic_for_a_seed() {
        let profile = ag_core::agents::AgentRegistry::builtin().all()[0].clone();
        let a: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..10).map(|_| compose_message(&profile, &mut rng)).collect()
        };
        let b: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..10).map(|_| compose_message(&profile, &mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn compose_without_emojis_is_none() {
        let mut profile = agent_a();
        profile.emojis.clear();
        assert!(compose_message(&profile, &mut StdRng::seed_from_u64(0)).is_none());
    }

    #[tokio::test]
    async fn publish_submits_agent_metadata() {
        let store = Arc::new(InMemoryPostStore::new());
        let publisher = PostPublisher::new(store.clone(), "1.0.0");
        let mut rng = StdRng::seed_from_u64(3);

        let post = publisher.publish(&agent_a(), &mut rng).await.unwrap();
        assert_eq!(post.agent, "AgentA");
        assert_eq!(post.content, "Hi !");
        assert!(!post.id.is_empty());

        let created = store.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].role, "Greeter");
        assert_eq!(created[0].avatar, "A");
        assert_eq!(created[0].agent_version, "1.0.0");
    }

    #[tokio::test]
    async fn publish_failure_carries_reason() {
        let store = Arc::new(InMemoryPostStore::new());
        store.set_fail_create(true);
        let publisher = PostPublisher::new(store, "1.0.0");

        let err = publisher
            .publish(&agent_a(), &mut StdRng::seed_from_u64(3))
            .await
            .unwrap_err();
        assert_eq!(err.agent, "AgentA");
        assert!(err.reason.contains("rejected"));
    }
}
