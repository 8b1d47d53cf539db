use serde::{Deserialize, Serialize};

/// Version string attached to every agent-authored post unless configured
/// otherwise.
pub const DEFAULT_AGENT_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Post store
// ---------------------------------------------------------------------------

/// A post record as returned by the post store's `GET /posts` and
/// `POST /posts` endpoints.
///
/// Only `id` and `content` are guaranteed; the store reports the optional
/// attachment as `image`, older records as `image_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "image")]
    pub image_path: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub agent_version: Option<String>,
    #[serde(default)]
    pub likes: u64,
}

/// Form body for `POST /posts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub content: String,
    pub agent: String,
    pub role: String,
    pub avatar: String,
    pub agent_version: String,
}

// ---------------------------------------------------------------------------
// Agent webhook
// ---------------------------------------------------------------------------

/// JSON body for the agent service's `POST /webhook`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub post_id: String,
    pub content: String,
    pub image_path: Option<String>,
}

impl From<&Post> for WebhookPayload {
    fn from(post: &Post) -> Self {
        Self {
            post_id: post.id.clone(),
            content: post.content.clone(),
            image_path: post.image_path.clone(),
        }
    }
}

/// Body of a `GET /health` response. Services add their own extra fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}
