use clap::ArgMatches;
use colored::*;
use tracing::debug;

use crate::auth::SessionRequest;
use crate::cli_context::CliContext;
use crate::error::AuthResult;

pub async fn handle_whoami(ctx: &CliContext, matches: &ArgMatches) -> AuthResult<()> {
    let mut request = SessionRequest::new();
    if let Some(workspace) = matches.get_one::<String>("workspace") {
        request = request.workspace(workspace);
    }
    if let Some(api_key) = matches.get_one::<String>("api-key") {
        request = request.api_key(api_key);
    }

    let mut session = ctx.session(&request).await?;
    debug!(key = %session.key(), source = %session.source, "Session resolved");
    let user = ctx.viewer(&mut session).await?;

    println!("Logged in as: {} ({})", user.name.bold(), user.email);
    println!("User ID: {}", user.id);
    println!(
        "Organization: {} {}",
        user.organization.name,
        format!("({})", user.organization.url_key).dimmed()
    );
    println!("Credential: {} via {}", session.credential.kind(), session.source);

    Ok(())
}
