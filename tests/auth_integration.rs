use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use linear_auth::auth::{OAuthClient, OAuthEndpoints, TokenRefresher};
use linear_auth::commands::auth::{complete_oauth_login, login_with_api_key};
use linear_auth::config::{config_path, load_config, OAuthSettings};
use linear_auth::{
    AuthError, CliContext, CliContextBuilder, Credential, CredentialKey, CredentialSource,
    CredentialStore, EnvOverrides, MemoryStore, OAuthTokenPair, SessionRequest, TokenManager,
    WorkspaceContext,
};

fn endpoints(server: &MockServer) -> OAuthEndpoints {
    OAuthEndpoints {
        authorize_url: format!("{}/oauth/authorize", server.uri()),
        token_url: format!("{}/oauth/token", server.uri()),
        revoke_url: format!("{}/oauth/revoke", server.uri()),
    }
}

fn env_for(server: &MockServer) -> EnvOverrides {
    EnvOverrides {
        api_url: Some(format!("{}/graphql", server.uri())),
        client_id: Some("client-123".to_string()),
        client_secret: Some("secret-456".to_string()),
        ..EnvOverrides::default()
    }
}

fn oauth_client(server: &MockServer) -> OAuthClient {
    OAuthClient::new(&OAuthSettings::default(), &env_for(server), 5)
        .unwrap()
        .with_endpoints(endpoints(server))
}

fn context(dir: &TempDir, server: &MockServer, store: Arc<MemoryStore>) -> CliContext {
    CliContextBuilder::new()
        .with_config_dir(dir.path())
        .with_env(env_for(server))
        .with_store(store)
        .with_oauth_endpoints(endpoints(server))
        .build()
        .unwrap()
}

fn viewer_body() -> serde_json::Value {
    json!({
        "data": {
            "viewer": {
                "id": "user-1",
                "name": "Ada Lovelace",
                "email": "ada@acme.test",
                "organization": { "id": "org-acme", "name": "Acme Inc", "urlKey": "acme" }
            }
        }
    })
}

#[tokio::test]
async fn test_refresh_success_parses_token_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-2",
            "refresh_token": "rt-2",
            "expires_in": 86399,
            "token_type": "Bearer",
            "scope": "read write"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = oauth_client(&server).refresh("rt-1").await.unwrap();

    assert_eq!(token.access_token, "at-2");
    assert_eq!(token.refresh_token.as_deref(), Some("rt-2"));
    assert_eq!(token.expires_in, Some(86399));
}

#[tokio::test]
async fn test_refresh_error_classification() {
    let cases = [
        (400, json!({"error": "invalid_grant"}), "invalid"),
        (401, json!({}), "invalid"),
        (400, json!({"error": "invalid_client"}), "oauth"),
        (429, json!({"error": "rate_limited"}), "transient"),
        (503, json!({}), "transient"),
    ];

    for (status, body, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;

        let err = oauth_client(&server).refresh("rt-1").await.unwrap_err();
        let kind = match err {
            AuthError::InvalidCredential(_) => "invalid",
            AuthError::OAuth(_) => "oauth",
            AuthError::TransientNetworkError(_) => "transient",
            other => panic!("status {}: unexpected {:?}", status, other),
        };
        assert_eq!(kind, expected, "status {}", status);
    }
}

#[tokio::test]
async fn test_unreachable_token_endpoint_is_transient() {
    let server = MockServer::start().await;
    let client = oauth_client(&server);
    drop(server);

    let err = client.refresh("rt-1").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_token_manager_refreshes_against_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-new",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let key = CredentialKey::new("org-acme", "default");
    store
        .put(
            &key,
            &Credential::OAuth(OAuthTokenPair {
                access_token: "at-old".to_string(),
                refresh_token: "rt-old".to_string(),
                expires_at: Utc::now() + Duration::minutes(2),
                workspace_id: "org-acme".to_string(),
            }),
        )
        .unwrap();
    let tokens = TokenManager::new(store.clone(), Arc::new(oauth_client(&server)), Duration::minutes(5));

    let credential = tokens.acquire(&key).await.unwrap();

    let pair = credential.as_oauth().unwrap();
    assert_eq!(pair.access_token, "at-new");
    assert_eq!(pair.refresh_token, "rt-old");
    assert_eq!(store.get(&key).unwrap(), credential);
}

#[tokio::test]
async fn test_api_key_login_records_workspace() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "lin_api_0123456789abcdef"))
        .respond_with(ResponseTemplate::new(200).set_body_json(viewer_body()))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let mut ctx = context(&dir, &server, store.clone());

    let outcome = login_with_api_key(&mut ctx, "lin_api_0123456789abcdef", None)
        .await
        .unwrap();

    assert_eq!(outcome.workspace.id, "org-acme");
    assert_eq!(outcome.workspace.name, "acme");
    assert_eq!(outcome.source, CredentialSource::Store);
    assert_eq!(outcome.viewer.email, "ada@acme.test");

    let stored = store.get(&CredentialKey::new("org-acme", "default")).unwrap();
    assert_eq!(stored.as_api_key(), Some("lin_api_0123456789abcdef"));

    let config = load_config(&config_path(dir.path())).unwrap();
    assert_eq!(config.default_workspace.as_deref(), Some("org-acme"));
    assert_eq!(config.workspaces[0].profiles, vec!["default".to_string()]);
    assert!(config.api_key.is_none());

    // The stored key now backs a session without any flag or env credential.
    let session = ctx.session(&SessionRequest::new()).await.unwrap();
    let viewer = ctx.client_for(&session.credential).unwrap().get_viewer().await.unwrap();
    assert_eq!(viewer.id, "user-1");
}

#[tokio::test]
async fn test_rejected_api_key_is_not_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let mut ctx = context(&dir, &server, store.clone());

    let err = login_with_api_key(&mut ctx, "lin_api_revoked_key_000", Some("Acme"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredential(_)));
    assert!(store.is_empty());
    assert!(ctx.config().workspaces.is_empty());
}

#[tokio::test]
async fn test_oauth_code_exchange_stores_pair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-oauth",
            "refresh_token": "rt-oauth",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer at-oauth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(viewer_body()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let mut ctx = context(&dir, &server, store.clone());

    let outcome = complete_oauth_login(&mut ctx, "the-code", Some("Work"))
        .await
        .unwrap();

    assert_eq!(outcome.workspace.name, "Work");
    let stored = store.get(&CredentialKey::new("org-acme", "default")).unwrap();
    let pair = stored.as_oauth().unwrap();
    assert_eq!(pair.access_token, "at-oauth");
    assert_eq!(pair.refresh_token, "rt-oauth");
    assert_eq!(pair.workspace_id, "org-acme");
    assert!(pair.expires_at > Utc::now() + Duration::minutes(55));
}

#[tokio::test]
async fn test_rejected_access_token_is_refreshed_and_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer at-revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-fresh",
            "refresh_token": "rt-2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer at-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(viewer_body()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let key = CredentialKey::new("org-acme", "default");
    store
        .put(
            &key,
            &Credential::OAuth(OAuthTokenPair {
                access_token: "at-revoked".to_string(),
                refresh_token: "rt-1".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
                workspace_id: "org-acme".to_string(),
            }),
        )
        .unwrap();
    let mut ctx = context(&dir, &server, store.clone());
    ctx.update_config(|c| {
        c.upsert_workspace(WorkspaceContext::new("org-acme", "acme"), "default");
        c.default_workspace = Some("org-acme".to_string());
    })
    .unwrap();

    let mut session = ctx.session(&SessionRequest::new()).await.unwrap();
    let viewer = ctx.viewer(&mut session).await.unwrap();

    assert_eq!(viewer.id, "user-1");
    assert_eq!(session.authorization_header(), "Bearer at-fresh");
    let stored = store.get(&key).unwrap();
    assert_eq!(stored.as_oauth().unwrap().refresh_token, "rt-2");
}

#[tokio::test]
async fn test_rejected_api_key_is_not_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, &server, Arc::new(MemoryStore::new()));

    let mut session = ctx
        .session(&SessionRequest::new().api_key("lin_api_revoked_key_000"))
        .await
        .unwrap();
    let err = ctx.viewer(&mut session).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredential(_)));
}

#[tokio::test]
async fn test_authorization_url_carries_state_and_client() {
    let server = MockServer::start().await;
    let client = oauth_client(&server);
    let state = OAuthClient::new_state();

    let url = client.authorization_url(&state).unwrap();

    assert!(url.starts_with(&format!("{}/oauth/authorize?", server.uri())));
    assert!(url.contains("client_id=client-123"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains(&format!("state={}", state)));
}
