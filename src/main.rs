use clap::Parser;
use std::sync::Arc;
use tc_license_manager::utils::logger;
use tc_license_manager::{ConnectionArgs, LicenseClient, McpServer, ToolRegistry};

#[derive(Debug, Parser)]
#[command(name = "tc-license-mcp")]
#[command(about = "MCP server for managing Thunder Client seat licenses", version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[arg(long, short, help = "Enable verbose output")]
    verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    let config = match cli.connection.resolve() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    tracing::debug!("Resolved config: {:?}", config);

    let client = LicenseClient::new(config)?;
    let registry = ToolRegistry::for_license_api(Arc::new(client));
    let server = McpServer::new(registry);

    if let Err(e) = server.run_stdio().await {
        tracing::error!("Server stopped with error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
