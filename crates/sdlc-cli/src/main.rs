use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sdlc_cli::exit_error::ExitError;
use sdlc_cli::output::OutputFormat;
use sdlc_cli::commands;

#[derive(Parser)]
#[command(name = "sdlc", version, about = "Client for the SDLC orchestration control plane daemon")]
struct Cli {
    /// Path to sdlcd's Unix domain socket. Defaults to SDLC_SOCKET_PATH, or
    /// the daemon's own default under the platform data directory.
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clone a repo, detect its IaC framework, and provision it.
    Deploy {
        repo_url: String,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long)]
        sub_path: Option<String>,
    },
    /// Run an AI-generated HTTP verification pass against a deployed stack.
    SanityTest {
        repo_url: String,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long)]
        sub_path: Option<String>,
        /// Stack info JSON (base URL, discovered endpoints, auth) to verify against.
        #[arg(long)]
        stack_info: String,
    },
    /// Generate and push a code repair for a failing deployment.
    Fix {
        repo_url: String,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long)]
        sub_path: Option<String>,
        #[arg(long)]
        fix_instructions: String,
        #[arg(long)]
        stack_info: Option<String>,
    },
    /// Run the full deploy/verify/repair loop to completion.
    SdlcDeploy {
        repo_url: String,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long)]
        sub_path: Option<String>,
    },
    /// Fetch the current status of a session by id.
    Status { session_id: String },
    /// List sessions, optionally filtered by phase.
    List {
        #[arg(long)]
        phase: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    let socket = cli.socket;
    let format = cli.output;
    match cli.command {
        Command::Deploy { repo_url, branch, sub_path } => {
            commands::deploy(socket, repo_url, branch, sub_path, format).await
        }
        Command::SanityTest { repo_url, branch, sub_path, stack_info } => {
            commands::sanity_test(socket, repo_url, branch, sub_path, stack_info, format).await
        }
        Command::Fix { repo_url, branch, sub_path, fix_instructions, stack_info } => {
            commands::fix(socket, repo_url, branch, sub_path, fix_instructions, stack_info, format).await
        }
        Command::SdlcDeploy { repo_url, branch, sub_path } => {
            commands::sdlc_deploy(socket, repo_url, branch, sub_path, format).await
        }
        Command::Status { session_id } => commands::status(socket, session_id, format).await,
        Command::List { phase } => commands::list(socket, phase, format).await,
    }
}
