//! Integration tests for the interactive authorization flow: confirmation
//! handling, code exchange and env file persistence.

mod common;

use common::{MockTokenEndpoint, RecordingSink, ScriptedPrompter, init_tracing};
use google_photos_auth::auth::{
    CredentialBundle, CredentialSource, EnvFileSink, EnvSource, PkceChallenge, REQUIRED_SCOPE,
};
use google_photos_auth::flow::CONFIRM_MESSAGE;
use google_photos_auth::{AuthError, AuthorizationFlow};
use serde_json::json;
use tempfile::TempDir;

const VAR: &str = "GOOGLE_PHOTOS_FLOW_TEST_TOKEN";

fn granted(access_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "refresh_token": "1//refresh",
        "expires_in": 3599,
        "scope": REQUIRED_SCOPE,
        "token_type": "Bearer",
        "id_token": "eyJhbGciOi",
    })
}

fn latest_in(path: &std::path::Path) -> CredentialBundle {
    let raw = EnvSource::new(VAR)
        .with_env_file(path)
        .read()
        .unwrap()
        .unwrap();
    CredentialBundle::from_json(&raw).unwrap()
}

// ============================================================================
// Aborts
// ============================================================================

#[tokio::test]
async fn test_declined_confirmation_writes_nothing() {
    let endpoint = MockTokenEndpoint::start(200, granted("ya29.unused")).await;

    for declined_at in 0..3 {
        let mut confirms = vec![true; declined_at];
        confirms.push(false);

        let sink = RecordingSink::default();
        let flow = AuthorizationFlow::new(endpoint.config(), sink.clone());
        let mut prompter = ScriptedPrompter::new(&confirms, &[]);

        let err = flow.run(&mut prompter).await.unwrap_err();
        match err {
            AuthError::UserAborted(msg) => {
                assert_eq!(msg, "Please read and follow the instructions");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(prompter.asked.len(), declined_at + 1);
        assert!(prompter.asked.iter().all(|q| q == CONFIRM_MESSAGE));
        assert!(sink.bundles().is_empty());
    }
    assert!(endpoint.requests().is_empty());
}

#[tokio::test]
async fn test_declined_confirmation_leaves_env_files_untouched() {
    let dir = TempDir::new().unwrap();
    let env = dir.path().join(".env");
    std::fs::write(&env, "EXISTING=1\n").unwrap();

    let endpoint = MockTokenEndpoint::start(200, granted("ya29.unused")).await;
    let sink = EnvFileSink::discover(dir.path(), VAR).unwrap();
    let flow = AuthorizationFlow::new(endpoint.config(), sink);

    let mut prompter = ScriptedPrompter::new(&[true, true, false], &[]);
    assert!(flow.run(&mut prompter).await.is_err());
    assert_eq!(std::fs::read_to_string(&env).unwrap(), "EXISTING=1\n");
}

// ============================================================================
// Successful exchange
// ============================================================================

#[tokio::test]
async fn test_success_appends_to_every_env_file() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "EXISTING=1\n").unwrap();
    std::fs::write(dir.path().join(".env.local"), "").unwrap();

    let endpoint = MockTokenEndpoint::start(200, granted("ya29.first")).await;
    let sink = EnvFileSink::discover(dir.path(), VAR).unwrap();
    let flow = AuthorizationFlow::new(endpoint.config(), sink);

    let mut prompter = ScriptedPrompter::happy("4/0AX4XfWh");
    let outcome = flow.run(&mut prompter).await.unwrap();

    assert_eq!(
        outcome.targets,
        [dir.path().join(".env"), dir.path().join(".env.local")]
    );
    assert!(outcome.bundle.is_valid());
    assert_eq!(
        outcome.bundle.client_id.as_deref(),
        Some("123-abc.apps.googleusercontent.com")
    );
    assert_eq!(outcome.bundle.extra.get("id_token"), Some(&json!("eyJhbGciOi")));
    assert_eq!(prompter.successes.len(), 1);
    assert!(prompter.warnings.is_empty());

    for target in &outcome.targets {
        let lines = std::fs::read_to_string(target).unwrap();
        let assignments = lines.lines().filter(|l| l.starts_with(VAR)).count();
        assert_eq!(assignments, 1, "{}", target.display());
        assert_eq!(latest_in(target), outcome.bundle);
    }
    assert!(std::fs::read_to_string(dir.path().join(".env")).unwrap().starts_with("EXISTING=1\n"));

    // Code exchange carried the client credentials and the PKCE verifier
    assert_eq!(endpoint.requests().len(), 1);
    assert_eq!(endpoint.form_value(0, "grant_type").as_deref(), Some("authorization_code"));
    assert_eq!(endpoint.form_value(0, "code").as_deref(), Some("4/0AX4XfWh"));
    assert_eq!(endpoint.form_value(0, "client_secret").as_deref(), Some("GOCSPX-secret"));
    assert_eq!(endpoint.form_value(0, "redirect_uri").as_deref(), Some("http://localhost"));

    let verifier = endpoint.form_value(0, "code_verifier").unwrap();
    let consent_url = reqwest::Url::parse(&prompter.consent_url().unwrap()).unwrap();
    let challenge = consent_url
        .query_pairs()
        .find(|(k, _)| k == "code_challenge")
        .map(|(_, v)| v.into_owned());
    assert_eq!(
        challenge.as_deref(),
        Some(PkceChallenge::from_verifier(verifier).challenge())
    );
}

#[tokio::test]
async fn test_success_without_env_files_creates_dot_env() {
    let dir = TempDir::new().unwrap();
    let endpoint = MockTokenEndpoint::start(200, granted("ya29.first")).await;
    let sink = EnvFileSink::discover(dir.path(), VAR).unwrap();
    let flow = AuthorizationFlow::new(endpoint.config(), sink);

    let outcome = flow.run(&mut ScriptedPrompter::happy("code")).await.unwrap();

    let env = dir.path().join(".env");
    assert_eq!(outcome.targets, [env.clone()]);
    assert_eq!(latest_in(&env).access_token.as_deref(), Some("ya29.first"));
}

#[tokio::test]
async fn test_repeated_runs_append_and_last_wins() {
    let dir = TempDir::new().unwrap();
    let env = dir.path().join(".env");

    for access_token in ["ya29.first", "ya29.second"] {
        let endpoint = MockTokenEndpoint::start(200, granted(access_token)).await;
        let sink = EnvFileSink::discover(dir.path(), VAR).unwrap();
        let flow = AuthorizationFlow::new(endpoint.config(), sink);
        flow.run(&mut ScriptedPrompter::happy("code")).await.unwrap();
    }

    let content = std::fs::read_to_string(&env).unwrap();
    assert_eq!(content.lines().filter(|l| l.starts_with(VAR)).count(), 2);
    assert_eq!(latest_in(&env).access_token.as_deref(), Some("ya29.second"));
}

#[tokio::test]
async fn test_redirect_url_is_accepted_as_code() {
    let endpoint = MockTokenEndpoint::start(200, granted("ya29.first")).await;
    let flow = AuthorizationFlow::new(endpoint.config(), RecordingSink::default());

    let mut prompter =
        ScriptedPrompter::happy("http://localhost/?code=4/0AX4XfWh&scope=photoslibrary.readonly");
    flow.run(&mut prompter).await.unwrap();

    assert_eq!(endpoint.form_value(0, "code").as_deref(), Some("4/0AX4XfWh"));
}

#[tokio::test]
async fn test_incomplete_grant_is_saved_with_warning() {
    // No refresh token returned, e.g. consent was not forced
    let endpoint = MockTokenEndpoint::start(
        200,
        json!({
            "access_token": "ya29.first",
            "expires_in": 3599,
            "scope": REQUIRED_SCOPE,
            "token_type": "Bearer",
        }),
    )
    .await;
    let sink = RecordingSink::default();
    let flow = AuthorizationFlow::new(endpoint.config(), sink.clone());

    let mut prompter = ScriptedPrompter::happy("code");
    let outcome = flow.run(&mut prompter).await.unwrap();

    assert!(!outcome.bundle.is_valid());
    assert_eq!(prompter.warnings.len(), 1);
    assert_eq!(sink.bundles().len(), 1);
}

// ============================================================================
// Failures and validation
// ============================================================================

#[tokio::test]
async fn test_rejected_code_is_token_exchange_failed() {
    let dir = TempDir::new().unwrap();
    let endpoint = MockTokenEndpoint::start(
        400,
        json!({
            "error": "invalid_grant",
            "error_description": "Malformed auth code.",
        }),
    )
    .await;
    let sink = EnvFileSink::discover(dir.path(), VAR).unwrap();
    let flow = AuthorizationFlow::new(endpoint.config(), sink);

    let err = flow
        .run(&mut ScriptedPrompter::happy("bad"))
        .await
        .unwrap_err();
    assert!(matches!(&err, AuthError::TokenExchangeFailed(_)));
    assert_eq!(err.to_string(), "Malformed auth code.");
    assert!(!dir.path().join(".env").exists());
}

#[tokio::test]
async fn test_empty_input_is_asked_again() {
    let endpoint = MockTokenEndpoint::start(200, granted("ya29.first")).await;
    let sink = RecordingSink::default();
    let flow = AuthorizationFlow::new(endpoint.config(), sink.clone());

    let mut prompter = ScriptedPrompter::new(
        &[true, true, true],
        &["", "  ", "client-id", "", "secret", "", "code"],
    );
    flow.run(&mut prompter).await.unwrap();

    // Two blank client ids, one blank secret, one blank code
    assert_eq!(prompter.warnings.len(), 4);
    assert!(prompter.warnings[0].contains("Client ID is required"));
    assert!(prompter.warnings[1].contains("Client ID is required"));
    assert!(prompter.warnings[2].contains("Client Secret is required"));
    assert!(prompter.warnings[3].contains("Code is required"));
    assert_eq!(prompter.asked.iter().filter(|q| *q == "Client ID:").count(), 3);

    let bundles = sink.bundles();
    assert_eq!(bundles[0].client_id.as_deref(), Some("client-id"));
    assert_eq!(bundles[0].client_secret.as_deref(), Some("secret"));
    assert_eq!(endpoint.form_value(0, "code").as_deref(), Some("code"));
}
