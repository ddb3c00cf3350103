//! Shared fixtures: a local axum token endpoint, a scripted prompter and an
//! in-memory sink.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Json, Router};
use google_photos_auth::auth::{CredentialBundle, CredentialSink, OAuthConfig, REQUIRED_SCOPE};
use google_photos_auth::{AuthError, Prompter, Result};
use tokio::net::TcpListener;

/// The sample bundle used across tests, far-future expiry
pub fn sample_bundle() -> CredentialBundle {
    CredentialBundle {
        client_id: Some("123-abc.apps.googleusercontent.com".to_string()),
        client_secret: Some("GOCSPX-secret".to_string()),
        access_token: Some("ya29.current".to_string()),
        refresh_token: Some("1//refresh".to_string()),
        scope: Some(REQUIRED_SCOPE.to_string()),
        token_type: Some("Bearer".to_string()),
        expiry_date: Some(9_999_999_999_999),
        ..Default::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("google_photos_auth=debug")
        .with_test_writer()
        .try_init();
}

/// Form fields of one token request
pub type TokenRequest = HashMap<String, String>;

#[derive(Clone)]
struct EndpointState {
    status: StatusCode,
    body: Arc<serde_json::Value>,
    requests: Arc<Mutex<Vec<TokenRequest>>>,
}

async fn token(
    State(state): State<EndpointState>,
    Form(form): Form<TokenRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.requests.lock().unwrap().push(form);
    (state.status, Json(state.body.as_ref().clone()))
}

/// Token endpoint on 127.0.0.1 answering every POST with a fixed response
pub struct MockTokenEndpoint {
    url: String,
    requests: Arc<Mutex<Vec<TokenRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl MockTokenEndpoint {
    pub async fn start(status: u16, body: serde_json::Value) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = EndpointState {
            status: StatusCode::from_u16(status).unwrap(),
            body: Arc::new(body),
            requests: requests.clone(),
        };
        let app = Router::new().route("/token", post(token)).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/token", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            url,
            requests,
            task,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> OAuthConfig {
        OAuthConfig::with_token_url(self.url.clone())
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<TokenRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Value of `key` in the `index`-th request
    pub fn form_value(&self, index: usize, key: &str) -> Option<String> {
        self.requests().get(index)?.get(key).cloned()
    }
}

impl Drop for MockTokenEndpoint {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Answers prompts from a script and records what was shown
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    confirms: VecDeque<bool>,
    inputs: VecDeque<String>,
    pub notes: Vec<(String, String)>,
    pub warnings: Vec<String>,
    pub successes: Vec<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(confirms: &[bool], inputs: &[&str]) -> Self {
        Self {
            confirms: confirms.iter().copied().collect(),
            inputs: inputs.iter().map(|s| (*s).to_string()).collect(),
            ..Default::default()
        }
    }

    /// Confirms everything and supplies id, secret and code
    pub fn happy(code: &str) -> Self {
        Self::new(
            &[true, true, true],
            &["123-abc.apps.googleusercontent.com", "GOCSPX-secret", code],
        )
    }

    /// Consent URL shown by the authorize step
    pub fn consent_url(&self) -> Option<String> {
        self.notes
            .iter()
            .find(|(title, _)| title.starts_with("Open the following URL"))
            .and_then(|(_, body)| body.lines().next())
            .map(str::to_string)
    }
}

impl Prompter for ScriptedPrompter {
    fn intro(&mut self, _title: &str) -> Result<()> {
        Ok(())
    }

    fn note(&mut self, title: &str, body: &str) -> Result<()> {
        self.notes.push((title.to_string(), body.to_string()));
        Ok(())
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        self.asked.push(message.to_string());
        self.confirms
            .pop_front()
            .ok_or_else(|| AuthError::invalid_config("script ran out of confirmations"))
    }

    fn input(&mut self, message: &str) -> Result<String> {
        self.asked.push(message.to_string());
        self.inputs
            .pop_front()
            .ok_or_else(|| AuthError::invalid_config("script ran out of inputs"))
    }

    fn warn(&mut self, message: &str) -> Result<()> {
        self.warnings.push(message.to_string());
        Ok(())
    }

    fn success(&mut self, message: &str) -> Result<()> {
        self.successes.push(message.to_string());
        Ok(())
    }
}

/// Keeps every stored bundle in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub stored: Arc<Mutex<Vec<CredentialBundle>>>,
}

impl RecordingSink {
    pub fn bundles(&self) -> Vec<CredentialBundle> {
        self.stored.lock().unwrap().clone()
    }
}

impl CredentialSink for RecordingSink {
    fn store(&self, bundle: &CredentialBundle) -> Result<Vec<PathBuf>> {
        self.stored.lock().unwrap().push(bundle.clone());
        Ok(vec![PathBuf::from("memory")])
    }
}
