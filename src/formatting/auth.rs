use chrono::Utc;
use colored::*;

use super::utils::*;
use crate::auth::{CredentialSource, TokenState};
use crate::client::ConnectionTest;
use crate::models::{Credential, WorkspaceContext};

/// Everything `auth status` shows about the active credential.
#[derive(Debug)]
pub struct StatusReport {
    pub workspace: WorkspaceContext,
    pub profile: String,
    pub credential: Credential,
    pub source: CredentialSource,
    pub state: TokenState,
}

pub fn print_not_authenticated(reason: &str) {
    println!("{} {}", "✗".red(), "Not authenticated".bold());
    println!("  {}", reason.dimmed());
    println!("  Run {} to get started.", "linear auth login".cyan());
}

pub fn print_status(report: &StatusReport) {
    let workspace = if report.workspace.is_ephemeral() {
        "(none, credential from environment)".dimmed().to_string()
    } else {
        format!("{} {}", report.workspace.name.bold(), format!("({})", report.workspace.id).dimmed())
    };

    println!("{} {}", "✓".green(), "Authenticated".bold());
    println!("  {:<12} {}", "Workspace:", workspace);
    println!("  {:<12} {}", "Profile:", report.profile);
    println!("  {:<12} {} {}", "Credential:", report.credential.kind(), report.credential.masked().dimmed());
    println!("  {:<12} {}", "Source:", report.source);
    println!("  {:<12} {}", "State:", format_state(report.state));

    match &report.credential {
        Credential::OAuth(pair) => {
            println!(
                "  {:<12} {} {}",
                "Expires:",
                pair.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
                format!("({})", format_expiry(pair.expires_at, Utc::now())).dimmed()
            );
        }
        Credential::ApiKey { .. } => {
            println!("  {:<12} {}", "Expires:", "never".dimmed());
        }
    }
}

pub fn print_verbose_details(store: &str, config_path: &str, log_path: Option<&str>) {
    println!("  {:<12} {}", "Store:", store);
    println!("  {:<12} {}", "Config:", config_path);
    if let Some(path) = log_path {
        println!("  {:<12} {}", "Log file:", path);
    }
}

pub fn print_connection(test: &ConnectionTest) {
    println!(
        "  {:<12} {} as {} ({}) in {} ms",
        "Connection:",
        "ok".green(),
        test.viewer.name,
        test.viewer.email,
        test.response_time.as_millis()
    );
    println!("  {:<12} {}", "Organization:", test.viewer.organization.name);
}

pub fn print_connection_error(message: &str) {
    println!("  {:<12} {} {}", "Connection:", "failed".red(), message.dimmed());
}

pub fn print_workspaces(workspaces: &[WorkspaceContext], active_id: Option<&str>) {
    if workspaces.is_empty() {
        println!("{}", "No workspaces configured.".dimmed());
        return;
    }

    println!("{}", "─".repeat(72).dimmed());
    println!(
        "  {:<24} {:<28} {:<16}",
        "Name".bold(),
        "ID".bold(),
        "Profiles".bold()
    );
    println!("{}", "─".repeat(72).dimmed());

    for ws in workspaces {
        let active = active_id == Some(ws.id.as_str());
        let marker = if active { "*".green().bold() } else { " ".normal() };
        let name = if active { ws.name.green().bold() } else { ws.name.normal() };
        println!(
            "{} {:<24} {:<28} {:<16}",
            marker,
            name,
            ws.id.dimmed(),
            ws.profiles.join(", ")
        );
    }
}
