use anyhow::Result;
use clap::{Parser, Subcommand};

mod azure;
mod cmd;
mod mcp;
mod ops;
mod tools;
mod utils;

use cmd::{ExecArgs, ListArgs, ServeArgs};

/// Azure CLI MCP - Azure CLI operations as MCP tools
///
/// Command layout:
///   azure-cli-mcp [serve]                               MCP server on stdio (default)
///   azure-cli-mcp list [--json]                         registered operations
///   azure-cli-mcp call <operation> [--param k=v ...]    invoke one operation directly
///
/// Global flags:
///   -v / -vv          Increase verbosity (logs go to stderr; RUST_LOG overrides)
///   -q / --quiet      Errors only
///   --max-output N    Capture bound for command output, in bytes (default 10 MiB)
///
/// The `az` executable is looked up at the platform's install locations first,
/// then on PATH (`which az` / `where az`).
///
/// Examples:
///   azure-cli-mcp
///   azure-cli-mcp list --json
///   azure-cli-mcp call azure_resource_list --param resourceGroup=MyRG
///   azure-cli-mcp call azure_cli --param 'command=group show --name "My RG"'
#[derive(Parser, Debug)]
#[command(
    name = "azure-cli-mcp",
    version,
    author,
    about = "Azure CLI MCP - Azure CLI operations as MCP tools",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Maximum bytes captured per output stream of a command
    #[arg(
        long = "max-output",
        global = true,
        value_name = "BYTES",
        default_value_t = azure::DEFAULT_MAX_OUTPUT
    )]
    max_output: usize,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the MCP server on stdio
    Serve(ServeArgs),

    /// List registered operations
    List(ListArgs),

    /// Invoke one operation and print its result
    Call(ExecArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    if cli.max_output == 0 {
        eprintln!("Invalid --max-output: must be greater than zero");
        std::process::exit(2);
    }

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => cmd::execute_serve(args, cli.max_output),
        Commands::List(args) => cmd::execute_list(args, cli.max_output),
        Commands::Call(args) => cmd::execute_exec(args, cli.max_output),
    }
}
