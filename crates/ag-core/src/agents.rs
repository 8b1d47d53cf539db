use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder substituted with a randomly chosen emoji when a template is
/// turned into post text.
pub const EMOJI_PLACEHOLDER: &str = "{emoji}";

// ---------------------------------------------------------------------------
// AgentProfile
// ---------------------------------------------------------------------------

/// A named posting persona.
///
/// Profiles are plain data: they never change after the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub role: String,
    pub description: String,
    pub avatar: String,
    pub templates: Vec<String>,
    pub emojis: Vec<String>,
}

impl AgentProfile {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        description: impl Into<String>,
        avatar: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            description: description.into(),
            avatar: avatar.into(),
            templates: Vec::new(),
            emojis: Vec::new(),
        }
    }

    pub fn with_templates<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.templates = templates.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_emojis<I, S>(mut self, emojis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emojis = emojis.into_iter().map(Into::into).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("agent registry is empty")]
    Empty,
    #[error("duplicate agent name: {0}")]
    DuplicateName(String),
    #[error("agent {0:?} has no message templates")]
    NoTemplates(String),
    #[error("agent {0:?} has no emoji choices")]
    NoEmojis(String),
    #[error("agent name must not be blank")]
    BlankName,
}

// ---------------------------------------------------------------------------
// AgentRegistry
// ---------------------------------------------------------------------------

/// Read-only roster of agents, fixed at process start.
///
/// Construction validates the roster so the scheduler can pick an agent,
/// a template and an emoji without ever hitting an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRegistry {
    agents: Vec<AgentProfile>,
}

impl AgentRegistry {
    /// Build a registry from an explicit roster.
    pub fn new(agents: Vec<AgentProfile>) -> Result<Self, RegistryError> {
        if agents.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for agent in &agents {
            if agent.name.trim().is_empty() {
                return Err(RegistryError::BlankName);
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(RegistryError::DuplicateName(agent.name.clone()));
            }
            if agent.templates.is_empty() {
                return Err(RegistryError::NoTemplates(agent.name.clone()));
            }
            if agent.emojis.is_empty() {
                return Err(RegistryError::NoEmojis(agent.name.clone()));
            }
        }

        Ok(Self { agents })
    }

    /// The default roster shipped with the scheduler.
    pub fn builtin() -> Self {
        Self {
            agents: builtin_agents(),
        }
    }

    /// All profiles, in roster order.
    pub fn all(&self) -> &[AgentProfile] {
        &self.agents
    }

    pub fn get(&self, name: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_agents() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new(
            "Tech Enthusiast",
            "AI Technology Expert",
            "Passionate about the latest AI developments and tools",
            "🤖",
        )
        .with_templates([
            "Just discovered an amazing AI tool! {emoji}",
            "The future of AI is looking bright! {emoji}",
            "Check out this cool tech development! {emoji}",
        ])
        .with_emojis(["🤖", "💻", "🚀", "⚡"]),
        AgentProfile::new(
            "Community Builder",
            "Community Manager",
            "Focused on building and engaging the AI community",
            "🤝",
        )
        .with_templates([
            "Let's connect and share our AI experiences! {emoji}",
            "What's your favorite AI tool? {emoji}",
            "Join our growing community! {emoji}",
        ])
        .with_emojis(["🤝", "🌟", "💡", "🎯"]),
        AgentProfile::new(
            "AI Explorer",
            "AI Researcher",
            "Exploring the frontiers of artificial intelligence",
            "🔍",
        )
        .with_templates([
            "Exploring new AI frontiers! {emoji}",
            "The possibilities with AI are endless! {emoji}",
            "Learning something new about AI every day! {emoji}",
        ])
        .with_emojis(["🔍", "🎓", "💫", "🌌"]),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
