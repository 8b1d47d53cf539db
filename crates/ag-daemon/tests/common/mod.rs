//! Fake post store and agent webhook served by axum on ephemeral ports.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ag_core::types::{NewPost, Post, WebhookPayload};
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Form, Json, Router,
};
use serde_json::{json, Value};

#[derive(Default)]
pub struct FakeBackend {
    pub posts: Mutex<Vec<Post>>,
    pub created: Mutex<Vec<NewPost>>,
    pub webhooks: Mutex<Vec<WebhookPayload>>,
    pub healthy: Mutex<bool>,
}

impl FakeBackend {
    pub fn with_posts(ids: &[&str]) -> Arc<Self> {
        let backend = Self {
            healthy: Mutex::new(true),
            ..Self::default()
        };
        {
            let mut posts = backend.posts.lock().unwrap();
            for id in ids {
                posts.push(Post {
                    id: id.to_string(),
                    content: format!("content of {id}"),
                    image_path: None,
                    created_at: None,
                    agent: None,
                    role: None,
                    avatar: None,
                    agent_version: None,
                    likes: 0,
                });
            }
        }
        Arc::new(backend)
    }

    pub fn created(&self) -> Vec<NewPost> {
        self.created.lock().unwrap().clone()
    }

    pub fn webhook_ids(&self) -> Vec<String> {
        self.webhooks
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.post_id.clone())
            .collect()
    }
}

async fn list_posts(State(backend): State<Arc<FakeBackend>>) -> Json<Value> {
    // Served with the `image` key the way the real store spells it.
    let posts: Vec<Value> = backend
        .posts
        .lock()
        .unwrap()
        .iter()
        .map(|p| json!({ "id": p.id, "content": p.content, "image": p.image_path }))
        .collect();
    Json(Value::Array(posts))
}

async fn create_post(
    State(backend): State<Arc<FakeBackend>>,
    Form(post): Form<NewPost>,
) -> (StatusCode, Json<Value>) {
    let mut created = backend.created.lock().unwrap();
    created.push(post.clone());
    let id = format!("agent-{}", created.len());
    (
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "content": post.content,
            "agent": post.agent,
            "created_at": "2024-01-01T00:00:00Z",
        })),
    )
}

async fn health(State(backend): State<Arc<FakeBackend>>) -> (StatusCode, Json<Value>) {
    if *backend.healthy.lock().unwrap() {
        (StatusCode::OK, Json(json!({ "status": "healthy", "version": "test" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy" })),
        )
    }
}

async fn webhook(
    State(backend): State<Arc<FakeBackend>>,
    Json(payload): Json<WebhookPayload>,
) -> Json<Value> {
    backend.webhooks.lock().unwrap().push(payload);
    Json(json!({ "status": "accepted" }))
}

/// Serve both collaborators from one router; returns the base URL.
pub async fn start_fake_backend(backend: Arc<FakeBackend>) -> String {
    let router = Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/health", get(health))
        .route("/webhook", axum::routing::post(webhook))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to ephemeral port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
