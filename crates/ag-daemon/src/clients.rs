//! HTTP clients for the two collaborators the scheduler talks to.
//!
//! The scheduler only sees the [`PostStore`] and [`AgentService`] traits so
//! tests can swap in the in-memory doubles from [`mock`].

use std::time::Duration;

use ag_core::types::{HealthStatus, NewPost, Post, WebhookPayload};
use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Transport-level failures talking to a collaborator.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, DNS failure, timeout and the like.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The collaborator answered with a non-2xx status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// A 2xx response whose body did not match the expected shape.
    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// Raised by the in-memory doubles.
    #[error("{0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// The post store's CRUD surface, as far as the scheduler needs it.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// `GET /posts`: every post currently stored.
    async fn list_posts(&self) -> Result<Vec<Post>, ClientError>;

    /// `POST /posts`: create a post, returning the stored record.
    async fn create_post(&self, post: &NewPost) -> Result<Post, ClientError>;
}

/// The agent webhook service.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// `GET /health`.
    async fn health(&self) -> Result<HealthStatus, ClientError>;

    /// `POST /webhook`: hand a post over for analysis.
    async fn forward(&self, payload: &WebhookPayload) -> Result<(), ClientError>;
}

// ---------------------------------------------------------------------------
// reqwest implementations
// ---------------------------------------------------------------------------

/// Build the shared reqwest client. `None` leaves requests without a
/// timeout, so a hung collaborator stalls the tick.
pub fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder().user_agent(concat!(
        "agora-scheduler/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(ClientError::Build)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

async fn send(
    url: &str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, ClientError> {
    let resp = request.send().await.map_err(|source| ClientError::Http {
        url: url.to_string(),
        source,
    })?;

    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        url: url.to_string(),
        status,
        body,
    })
}

/// Post store client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPostStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPostStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PostStore for HttpPostStore {
    async fn list_posts(&self) -> Result<Vec<Post>, ClientError> {
        let url = join_url(&self.base_url, "/posts");
        let resp = send(&url, self.client.get(&url)).await?;
        resp.json()
            .await
            .map_err(|source| ClientError::Decode { url, source })
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, ClientError> {
        let url = join_url(&self.base_url, "/posts");
        let resp = send(&url, self.client.post(&url).form(post)).await?;
        resp.json()
            .await
            .map_err(|source| ClientError::Decode { url, source })
    }
}

/// Agent webhook client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAgentService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgentService {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AgentService for HttpAgentService {
    async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = join_url(&self.base_url, "/health");
        let resp = send(&url, self.client.get(&url)).await?;
        resp.json()
            .await
            .map_err(|source| ClientError::Decode { url, source })
    }

    async fn forward(&self, payload: &WebhookPayload) -> Result<(), ClientError> {
        let url = join_url(&self.base_url, "/webhook");
        send(&url, self.client.post(&url).json(payload)).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory doubles
// ---------------------------------------------------------------------------

pub mod mock {
    //! In-memory collaborators for tests and local dry runs.

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    use super::*;

    /// A post store kept in a `Vec`, with switchable failure modes.
    #[derive(Debug, Default)]
    pub struct InMemoryPostStore {
        posts: Mutex<Vec<Post>>,
        created: Mutex<Vec<NewPost>>,
        next_id: AtomicUsize,
        fail_list: AtomicBool,
        fail_create: AtomicBool,
    }

    impl InMemoryPostStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed posts with the given ids and generic content.
        pub fn with_posts<I, S>(ids: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let store = Self::new();
            for id in ids {
                let id = id.into();
                store.push(Post {
                    id: id.clone(),
                    content: format!("post {id}"),
                    image_path: None,
                    created_at: None,
                    agent: None,
                    role: None,
                    avatar: None,
                    agent_version: None,
                    likes: 0,
                });
            }
            store
        }

        pub fn push(&self, post: Post) {
            self.posts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(post);
        }

        pub fn set_fail_list(&self, fail: bool) {
            self.fail_list.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_create(&self, fail: bool) {
            self.fail_create.store(fail, Ordering::SeqCst);
        }

        /// Every `create_post` request accepted so far.
        pub fn created(&self) -> Vec<NewPost> {
            self.created
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl PostStore for InMemoryPostStore {
        async fn list_posts(&self) -> Result<Vec<Post>, ClientError> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(ClientError::Unavailable("post store is down".into()));
            }
            Ok(self
                .posts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone())
        }

        async fn create_post(&self, post: &NewPost) -> Result<Post, ClientError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(ClientError::Unavailable("post store rejected the post".into()));
            }
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let stored = Post {
                id: format!("created-{n}"),
                content: post.content.clone(),
                image_path: None,
                created_at: Some(chrono::Utc::now().to_rfc3339()),
                agent: Some(post.agent.clone()),
                role: Some(post.role.clone()),
                avatar: Some(post.avatar.clone()),
                agent_version: Some(post.agent_version.clone()),
                likes: 0,
            };
            self.created
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(post.clone());
            // Agent posts do not appear in listings; tests control those.
            Ok(stored)
        }
    }

    /// An agent service that records forwarded payloads.
    #[derive(Debug)]
    pub struct RecordingAgentService {
        healthy: AtomicBool,
        forwarded: Mutex<Vec<WebhookPayload>>,
        failing_posts: Mutex<HashSet<String>>,
    }

    impl Default for RecordingAgentService {
        fn default() -> Self {
            Self {
                healthy: AtomicBool::new(true),
                forwarded: Mutex::new(Vec::new()),
                failing_posts: Mutex::new(HashSet::new()),
            }
        }
    }

    impl RecordingAgentService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }

        /// Make forwarding of `post_id` fail.
        pub fn fail_post(&self, post_id: impl Into<String>) {
            self.failing_posts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(post_id.into());
        }

        /// Every forward attempt so far, failed ones included.
        pub fn forwarded(&self) -> Vec<WebhookPayload> {
            self.forwarded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn forwarded_ids(&self) -> Vec<String> {
            self.forwarded().into_iter().map(|p| p.post_id).collect()
        }
    }

    #[async_trait]
    impl AgentService for RecordingAgentService {
        async fn health(&self) -> Result<HealthStatus, ClientError> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(HealthStatus {
                    status: "healthy".into(),
                    version: Some("1.0.0".into()),
                })
            } else {
                Err(ClientError::Unavailable("agent service is down".into()))
            }
        }

        async fn forward(&self, payload: &WebhookPayload) -> Result<(), ClientError> {
            self.forwarded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(payload.clone());
            let failing = self
                .failing_posts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&payload.post_id);
            if failing {
                return Err(ClientError::Unavailable(format!(
                    "webhook rejected post {}",
                    payload.post_id
                )));
            }
            Ok(())
        }
    }
}
