mod common;

use std::time::Duration;

use ag_core::config::Config;
use ag_daemon::daemon::Daemon;
use ag_daemon::status::TickPhase;
use common::{dead_url, start_fake_backend, FakeBackend};
use serde_json::Value;

fn config_for(post_store: &str, agent_service: &str) -> Config {
    let mut config = Config::default();
    config.post_store.base_url = post_store.to_string();
    config.agent_service.base_url = agent_service.to_string();
    config.scheduler.tick_interval_secs = 1;
    config.scheduler.request_timeout_secs = 5;
    config.scheduler.rng_seed = Some(7);
    config
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn daemon_forwards_publishes_and_serves_status() {
    let backend = FakeBackend::with_posts(&["a", "b"]);
    let base = start_fake_backend(backend.clone()).await;

    let daemon = Daemon::new(config_for(&base, &base)).unwrap();
    let tracker = daemon.tracker().clone();
    let shutdown = daemon.shutdown_handle();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let status_url = format!("http://{}/status", listener.local_addr().unwrap());
    let task = tokio::spawn(async move { daemon.run_with_listener(listener).await });

    wait_until(|| {
        let tracker = tracker.clone();
        async move {
            let snap = tracker.snapshot().await;
            snap.total_posts_created == 1 && snap.total_posts_processed == 2
        }
    })
    .await;

    assert_eq!(backend.webhook_ids(), vec!["a", "b"]);
    let created = backend.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].agent_version, "1.0.0");

    let body: Value = reqwest::get(&status_url).await.unwrap().json().await.unwrap();
    assert_eq!(body["total_posts_created"], 1);
    assert_eq!(body["total_posts_processed"], 2);
    assert_eq!(body["last_agent"], created[0].agent.as_str());

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("daemon stopped")
        .expect("task ok")
        .expect("run ok");
    assert_eq!(tracker.snapshot().await.phase, TickPhase::Stopped);
}

#[tokio::test]
async fn daemon_survives_unreachable_collaborators() {
    let dead = dead_url().await;
    let daemon = Daemon::new(config_for(&dead, &dead)).unwrap();
    let tracker = daemon.tracker().clone();
    let shutdown = daemon.shutdown_handle();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let task = tokio::spawn(async move { daemon.run_with_listener(listener).await });

    wait_until(|| {
        let tracker = tracker.clone();
        async move { tracker.snapshot().await.last_error.is_some() }
    })
    .await;

    let snap = tracker.snapshot().await;
    assert_eq!(snap.total_posts_created, 0);
    assert_eq!(snap.total_posts_processed, 0);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("daemon stopped")
        .expect("task ok")
        .expect("run ok");
}
