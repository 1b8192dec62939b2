use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use clap::ArgMatches;
use colored::*;
use tracing::{info, warn};

use crate::auth::oauth::expires_in_or_default;
use crate::auth::{CallbackListener, CredentialSource, OAuthClient, TokenState};
use crate::cli_context::CliContext;
use crate::constants::CALLBACK_TIMEOUT_SECS;
use crate::error::{AuthError, AuthResult, ErrorContext};
use crate::formatting::auth::{
    print_connection, print_connection_error, print_not_authenticated, print_status,
    print_verbose_details, print_workspaces, StatusReport,
};
use crate::logging::get_log_file_path;
use crate::models::{Credential, OAuthTokenPair, Viewer, WorkspaceContext};

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub workspace: WorkspaceContext,
    pub viewer: Viewer,
    pub source: CredentialSource,
}

pub enum StatusOutcome {
    NotAuthenticated(String),
    Authenticated(StatusReport),
}

pub async fn handle_auth(ctx: &mut CliContext, matches: &ArgMatches) -> AuthResult<()> {
    let workspace = matches.get_one::<String>("workspace").map(|s| s.as_str());

    match matches.subcommand() {
        Some(("login", sub)) => handle_login(ctx, sub, workspace).await,
        Some(("status", sub)) => handle_status(ctx, workspace, sub.get_flag("verbose")).await,
        Some(("refresh", _)) => handle_refresh(ctx, workspace).await,
        Some(("logout", _)) => handle_logout(ctx, workspace).await,
        Some(("reset", _)) => handle_reset(ctx).await,
        Some(("switch-workspace", sub)) => {
            let name = sub
                .get_one::<String>("name")
                .ok_or_else(|| AuthError::Config("Workspace name is required".to_string()))?;
            let ws = switch_workspace(ctx, name)?;
            println!("{} Switched to workspace {}", "✓".green(), ws.name.bold());
            Ok(())
        }
        Some(("list-workspaces", _)) => {
            let active = ctx.facade().resolve_workspace(workspace).ok().map(|w| w.id);
            print_workspaces(&ctx.config().workspaces, active.as_deref());
            Ok(())
        }
        _ => Err(AuthError::Config(
            "Unknown auth command. Use 'linear auth --help' for usage information.".to_string(),
        )),
    }
}

async fn handle_login(ctx: &mut CliContext, matches: &ArgMatches, name: Option<&str>) -> AuthResult<()> {
    let outcome = match matches.get_one::<String>("api-key") {
        Some(api_key) => login_with_api_key(ctx, api_key, name).await?,
        None => {
            login_with_oauth(ctx, name, |url| {
                println!("Open this URL in your browser to authorize the Linear CLI:\n");
                println!("  {}\n", url.cyan());
                println!("{}", "Waiting for authorization...".dimmed());
            })
            .await?
        }
    };

    println!(
        "{} Logged in as {} ({}) to {}",
        "✓".green(),
        outcome.viewer.name.bold(),
        outcome.viewer.email,
        outcome.workspace.name.bold()
    );
    if outcome.source == CredentialSource::ConfigFile {
        println!(
            "{}",
            "Warning: credential store unavailable, API key saved in plaintext in the config file."
                .yellow()
        );
    }
    Ok(())
}

/// Validate `api_key` against the viewer query and persist it.
pub async fn login_with_api_key(
    ctx: &mut CliContext,
    api_key: &str,
    name: Option<&str>,
) -> AuthResult<LoginOutcome> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(AuthError::InvalidCredential("API key is empty".to_string()));
    }
    let credential = Credential::api_key(api_key);
    let viewer = ctx.client_for(&credential)?.get_viewer().await?;
    remember_login(ctx, credential, viewer, name)
}

/// Run the browser authorization code flow. `show_url` receives the
/// authorize URL once the callback listener is ready.
pub async fn login_with_oauth<F>(
    ctx: &mut CliContext,
    name: Option<&str>,
    show_url: F,
) -> AuthResult<LoginOutcome>
where
    F: FnOnce(&str),
{
    if !ctx.oauth().is_configured() {
        return Err(AuthError::Config(
            "OAuth is not configured. Set LINEAR_CLIENT_ID and LINEAR_CLIENT_SECRET, or log in with --api-key".to_string(),
        ));
    }

    let state = OAuthClient::new_state();
    let url = ctx.oauth().authorization_url(&state)?;
    let listener = CallbackListener::bind(ctx.oauth().redirect_uri()).await?;
    show_url(&url);

    let code = listener
        .wait_for_code(&state, StdDuration::from_secs(CALLBACK_TIMEOUT_SECS))
        .await?;
    complete_oauth_login(ctx, &code, name).await
}

/// Exchange an authorization code, discover the organization and persist.
pub async fn complete_oauth_login(
    ctx: &mut CliContext,
    code: &str,
    name: Option<&str>,
) -> AuthResult<LoginOutcome> {
    let token = ctx.oauth().exchange_code(code).await?;
    let expires_in = expires_in_or_default(&token);
    if token.refresh_token.is_none() {
        warn!("Token response has no refresh token; re-login will be needed on expiry");
    }

    let mut pair = OAuthTokenPair {
        access_token: token.access_token,
        refresh_token: token.refresh_token.unwrap_or_default(),
        expires_at: Utc::now() + Duration::seconds(expires_in),
        workspace_id: String::new(),
    };
    let viewer = ctx
        .client_for(&Credential::OAuth(pair.clone()))?
        .get_viewer()
        .await?;
    pair.workspace_id = viewer.organization.id.clone();

    remember_login(ctx, Credential::OAuth(pair), viewer, name)
}

fn remember_login(
    ctx: &mut CliContext,
    credential: Credential,
    viewer: Viewer,
    name: Option<&str>,
) -> AuthResult<LoginOutcome> {
    let org = &viewer.organization;
    let display_name = name
        .map(str::to_string)
        .or_else(|| ctx.config().find_workspace(&org.id).map(|w| w.name.clone()))
        .unwrap_or_else(|| org.url_key.clone());

    let mut workspace = WorkspaceContext::new(org.id.clone(), display_name);
    workspace.url_key = Some(org.url_key.clone());

    let key = ctx.facade().key_for(&workspace);
    let source = ctx.store_credential(&key, &credential)?;

    let profile = ctx.profile().to_string();
    let id = workspace.id.clone();
    ctx.update_config(|c| {
        c.upsert_workspace(workspace, &profile);
        c.default_workspace = Some(id.clone());
    })?;
    info!(workspace = %org.id, kind = credential.kind(), "Login complete");

    let workspace = ctx
        .config()
        .find_workspace(&org.id)
        .cloned()
        .context("workspace missing after login")?;
    Ok(LoginOutcome {
        workspace,
        viewer,
        source,
    })
}

/// Inspect the active credential without touching the network.
pub fn status(ctx: &CliContext, workspace: Option<&str>) -> AuthResult<StatusOutcome> {
    let env = ctx.facade().env();
    if env.access_token.is_some() || env.api_key.is_some() {
        let credential = match env.access_token.as_deref() {
            Some(token) => Credential::OAuth(OAuthTokenPair {
                access_token: token.to_string(),
                refresh_token: env.refresh_token.clone().unwrap_or_default(),
                expires_at: Utc::now() + Duration::hours(1),
                workspace_id: String::new(),
            }),
            None => Credential::api_key(env.api_key.clone().unwrap_or_default()),
        };
        let ws = ctx
            .facade()
            .resolve_workspace(workspace)
            .unwrap_or_else(|_| WorkspaceContext::ephemeral());
        return Ok(StatusOutcome::Authenticated(StatusReport {
            workspace: ws,
            profile: ctx.profile().to_string(),
            credential,
            source: CredentialSource::Environment,
            state: TokenState::Valid,
        }));
    }

    let ws = match ctx.facade().resolve_workspace(workspace) {
        Ok(ws) => ws,
        Err(AuthError::NoActiveWorkspace) => {
            return Ok(match plaintext_report(ctx, WorkspaceContext::ephemeral()) {
                Some(report) => StatusOutcome::Authenticated(report),
                None => StatusOutcome::NotAuthenticated("No workspace configured.".to_string()),
            });
        }
        Err(e) => return Err(e),
    };

    let key = ctx.facade().key_for(&ws);
    let state = match ctx.tokens().state(&key) {
        Ok(state) => state,
        Err(AuthError::StoreUnavailable(reason)) => {
            warn!("Credential store unavailable: {}", reason);
            return match plaintext_report(ctx, ws) {
                Some(report) => Ok(StatusOutcome::Authenticated(report)),
                None => Err(AuthError::StoreUnavailable(reason)),
            };
        }
        Err(e) => return Err(e),
    };

    if state == TokenState::Unauthenticated {
        let reason = format!("No credential stored for {} (profile {}).", ws.name, ctx.profile());
        return Ok(match plaintext_report(ctx, ws) {
            Some(report) => StatusOutcome::Authenticated(report),
            None => StatusOutcome::NotAuthenticated(reason),
        });
    }

    let credential = ctx.store().get(&key)?;
    Ok(StatusOutcome::Authenticated(StatusReport {
        workspace: ws,
        profile: ctx.profile().to_string(),
        credential,
        source: CredentialSource::Store,
        state,
    }))
}

fn plaintext_report(ctx: &CliContext, workspace: WorkspaceContext) -> Option<StatusReport> {
    let api_key = ctx.config().api_key.clone()?;
    Some(StatusReport {
        workspace,
        profile: ctx.profile().to_string(),
        credential: Credential::api_key(api_key),
        source: CredentialSource::ConfigFile,
        state: TokenState::Valid,
    })
}

async fn handle_status(ctx: &mut CliContext, workspace: Option<&str>, verbose: bool) -> AuthResult<()> {
    let mut report = match status(ctx, workspace)? {
        StatusOutcome::NotAuthenticated(reason) => {
            print_not_authenticated(&reason);
            return Ok(());
        }
        StatusOutcome::Authenticated(report) => report,
    };

    if !verbose {
        print_status(&report);
        return Ok(());
    }

    let connection = ctx.client_for(&report.credential)?.test_connection().await;
    if let Err(AuthError::InvalidCredential(_)) = &connection {
        report.state = TokenState::Expired;
    }
    print_status(&report);

    let log_path = get_log_file_path().map(|p| p.display().to_string());
    print_verbose_details(
        ctx.store().name(),
        &ctx.config_path().display().to_string(),
        log_path.as_deref(),
    );
    match connection {
        Ok(test) => print_connection(&test),
        Err(e) => print_connection_error(&e.to_string()),
    }
    Ok(())
}

/// Force a refresh of the active workspace's OAuth pair.
pub async fn refresh(ctx: &CliContext, workspace: Option<&str>) -> AuthResult<(WorkspaceContext, Credential)> {
    let ws = ctx.facade().resolve_workspace(workspace)?;
    let key = ctx.facade().key_for(&ws);
    match ctx.tokens().force_refresh(&key).await {
        Ok(credential) => Ok((ws, credential)),
        Err(AuthError::NotFound(_)) | Err(AuthError::AuthenticationRequired { .. }) => {
            Err(AuthError::AuthenticationRequired { workspace: ws.name })
        }
        Err(e) => Err(e),
    }
}

async fn handle_refresh(ctx: &mut CliContext, workspace: Option<&str>) -> AuthResult<()> {
    let (ws, credential) = refresh(ctx, workspace).await?;
    match credential {
        Credential::ApiKey { .. } => {
            println!("API keys do not expire; nothing to refresh for {}.", ws.name.bold());
        }
        Credential::OAuth(pair) => {
            println!(
                "{} Token refreshed for {}; expires {}",
                "✓".green(),
                ws.name.bold(),
                pair.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
    Ok(())
}

/// Remove the active key's credential. Succeeds when nothing is stored.
pub async fn logout(ctx: &mut CliContext, workspace: Option<&str>) -> AuthResult<Option<WorkspaceContext>> {
    let ws = match ctx.facade().resolve_workspace(workspace) {
        Ok(ws) => ws,
        Err(AuthError::NoActiveWorkspace) => {
            clear_plaintext_key(ctx)?;
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let key = ctx.facade().key_for(&ws);

    match ctx.store().get(&key) {
        Ok(Credential::OAuth(pair)) => ctx.oauth().revoke(&pair.access_token).await,
        Ok(Credential::ApiKey { .. }) | Err(AuthError::NotFound(_)) => {}
        Err(AuthError::InvalidCredential(reason)) => {
            warn!(key = %key, "Discarding unreadable credential: {}", reason);
        }
        Err(AuthError::StoreUnavailable(reason)) if ctx.config().api_key.is_some() => {
            warn!("Credential store unavailable ({}); clearing plaintext key only", reason);
            clear_plaintext_key(ctx)?;
            return Ok(Some(ws));
        }
        Err(e) => return Err(e),
    }

    ctx.store().delete(&key)?;
    clear_plaintext_key(ctx)?;
    info!(key = %key, "Logged out");
    Ok(Some(ws))
}

fn clear_plaintext_key(ctx: &mut CliContext) -> AuthResult<()> {
    if ctx.config().api_key.is_some() {
        ctx.update_config(|c| c.api_key = None)?;
    }
    Ok(())
}

async fn handle_logout(ctx: &mut CliContext, workspace: Option<&str>) -> AuthResult<()> {
    match logout(ctx, workspace).await? {
        Some(ws) => println!("{} Logged out of {}", "✓".green(), ws.name.bold()),
        None => println!("{} Logged out", "✓".green()),
    }
    Ok(())
}

/// Delete every stored credential and forget all workspaces.
/// Returns the number of credentials removed from the store.
pub fn reset(ctx: &mut CliContext) -> AuthResult<usize> {
    let mut removed = 0;
    for ws in &ctx.config().workspaces {
        for profile in &ws.profiles {
            let key = crate::models::CredentialKey::new(ws.id.clone(), profile.clone());
            let existed = match ctx.store().get(&key) {
                Ok(_) | Err(AuthError::InvalidCredential(_)) => true,
                Err(AuthError::NotFound(_)) => false,
                Err(e) => return Err(e),
            };
            ctx.store().delete(&key)?;
            if existed {
                removed += 1;
            }
        }
    }

    ctx.update_config(|c| {
        c.workspaces.clear();
        c.default_workspace = None;
        c.api_key = None;
    })?;
    info!(removed, "Authentication state reset");
    Ok(removed)
}

async fn handle_reset(ctx: &mut CliContext) -> AuthResult<()> {
    let removed = reset(ctx)?;
    println!(
        "{} Removed {} stored credential(s) and all workspace settings",
        "✓".green(),
        removed
    );
    Ok(())
}

/// Make `name` the default workspace.
pub fn switch_workspace(ctx: &mut CliContext, name: &str) -> AuthResult<WorkspaceContext> {
    let ws = ctx
        .config()
        .find_workspace(name)
        .cloned()
        .ok_or_else(|| AuthError::UnknownWorkspace(name.to_string()))?;
    let id = ws.id.clone();
    ctx.update_config(|c| c.default_workspace = Some(id))?;
    info!(workspace = %ws.id, "Default workspace switched");
    Ok(ws)
}
