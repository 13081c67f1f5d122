//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ethics_monitor::config::MonitorConfig;
use ethics_monitor::lifecycle::{self, Running};
use ethics_monitor::security::FieldCipher;
use ethics_monitor::service::NewUser;
use ethics_monitor::storage::{Backend, Changes, StoreError, StoreResult, Tables};
use serde_json::{json, Value};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct-horse-battery";

/// A valid config listening on an ephemeral loopback port, in-memory store.
pub fn test_config() -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.auth.jwt_secret = SECRET.to_string();
    config.encryption.key = FieldCipher::generate_key();
    config
}

pub fn new_user(username: &str, role: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.org"),
        password: PASSWORD.to_string(),
        role: Some(role.to_string()),
    }
}

pub fn temp_store_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("ethics-{tag}-{}.jsonl", uuid::Uuid::new_v4()))
}

/// Every audit record in a journal, in commit order.
pub fn journal_audit(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .flat_map(|line| {
            let commit: Value = serde_json::from_str(line).unwrap();
            commit["audit"].as_array().cloned().unwrap_or_default()
        })
        .collect()
}

/// Rewrite the journal in place, passing every audit record through `edit`.
/// Records for which `edit` returns false are dropped.
pub fn rewrite_journal_audit(path: &std::path::Path, mut edit: impl FnMut(&mut Value) -> bool) {
    let mut out = String::new();
    for line in std::fs::read_to_string(path).unwrap().lines() {
        let mut commit: Value = serde_json::from_str(line).unwrap();
        if let Some(records) = commit.get_mut("audit").and_then(Value::as_array_mut) {
            records.retain_mut(|r| edit(r));
        }
        out.push_str(&serde_json::to_string(&commit).unwrap());
        out.push('\n');
    }
    std::fs::write(path, out).unwrap();
}

/// Backend whose commits fail while `fail` is set.
pub struct FlakyBackend {
    pub fail: Arc<AtomicBool>,
}

impl Backend for FlakyBackend {
    fn load(&self) -> StoreResult<Option<Tables>> {
        Ok(None)
    }

    fn commit(&self, _changes: &Changes) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Backend("injected commit failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// A running server plus an HTTP client pointed at it.
pub struct TestServer {
    pub running: Running,
    pub base: String,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start(config: MonitorConfig) -> Self {
        let running = lifecycle::start(&config).await.unwrap();
        let base = format!("http://{}", running.local_addr);
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap();
        Self { running, base, client }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn register(&self, username: &str, role: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.post(self.url("/users")).json(&json!({
            "username": username,
            "email": format!("{username}@example.org"),
            "password": PASSWORD,
            "role": role,
        }));
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        req.send().await.unwrap()
    }

    pub async fn login(&self, username: &str) -> String {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200, "login failed for {username}");
        let body: Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}
