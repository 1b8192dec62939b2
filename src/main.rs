use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;

use linear_auth::cli_context::CliContext;
use linear_auth::commands::auth::handle_auth;
use linear_auth::commands::whoami::handle_whoami;
use linear_auth::error::{AuthError, AuthResult};
use linear_auth::logging;

fn build_cli() -> Command {
    Command::new("linear")
        .about("Linear CLI - Interact with Linear's API from the command line")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("workspace")
                .long("workspace")
                .short('w')
                .value_name("NAME")
                .help("Workspace to use (id, name or url key); display name for 'auth login'")
                .global(true),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("NAME")
                .help("Credential profile within the workspace")
                .global(true),
        )
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.json and the encrypted credential file")
                .global(true),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Print debug logs to stderr")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("auth")
                .about("Manage authentication")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("login")
                        .about("Log in with an API key or through the browser (OAuth)")
                        .arg(
                            Arg::new("api-key")
                                .long("api-key")
                                .value_name("KEY")
                                .help("Personal API key; omit to use OAuth"),
                        ),
                )
                .subcommand(
                    Command::new("status")
                        .about("Show the active credential")
                        .arg(
                            Arg::new("verbose")
                                .long("verbose")
                                .short('v')
                                .help("Include storage details and a live connection test")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(Command::new("refresh").about("Refresh the OAuth access token now"))
                .subcommand(
                    Command::new("logout").about("Remove the credential for the active workspace"),
                )
                .subcommand(
                    Command::new("reset").about("Remove every stored credential and workspace"),
                )
                .subcommand(
                    Command::new("switch-workspace")
                        .about("Set the default workspace")
                        .arg(
                            Arg::new("name")
                                .value_name("NAME")
                                .help("Workspace id, name or url key")
                                .required(true)
                                .index(1),
                        ),
                )
                .subcommand(Command::new("list-workspaces").about("List known workspaces")),
        )
        .subcommand(
            Command::new("whoami")
                .about("Show the authenticated user")
                .arg(
                    Arg::new("api-key")
                        .long("api-key")
                        .value_name("KEY")
                        .help("Use this API key for this invocation only"),
                ),
        )
}

async fn run(matches: &ArgMatches) -> AuthResult<()> {
    let config_dir = matches.get_one::<String>("config-dir").map(PathBuf::from);
    let profile = matches.get_one::<String>("profile").cloned();
    let mut ctx = CliContext::load(config_dir.as_deref(), profile)?;

    match matches.subcommand() {
        Some(("auth", sub_matches)) => handle_auth(&mut ctx, sub_matches).await,
        Some(("whoami", sub_matches)) => handle_whoami(&ctx, sub_matches).await,
        _ => Err(AuthError::Config(
            "Unknown command. Use 'linear --help' for available commands.".to_string(),
        )),
    }
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    if let Err(e) = logging::init_logging(matches.get_flag("debug")) {
        eprintln!("Warning: could not initialize logging: {}", e);
    }
    std::panic::set_hook(Box::new(|info| {
        logging::log_panic_info(info);
        eprintln!("{}", info);
    }));

    if let Err(e) = run(&matches).await {
        tracing::error!("{}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        eprintln!("{}", e.hint().yellow());
        process::exit(e.exit_code());
    }
}
