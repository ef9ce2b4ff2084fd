use std::path::PathBuf;

use clap::Parser;
use packrun_mcp_server::run_main;

/// MCP server exposing package-manager tools for a JS/TS project, with a
/// background task supervisor for long-running scripts.
#[derive(Parser)]
#[command(name = "packrun-mcp-server", version)]
struct Cli {
    /// Project directory used when a tool call does not pass `cwd`.
    /// Defaults to the server's working directory.
    #[arg(long, value_name = "DIR")]
    project_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_main(cli.project_root).await?;
    Ok(())
}
