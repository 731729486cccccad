use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tc_license_manager::utils::logger;
use tc_license_manager::{
    ConnectionArgs, LicenseApi, LicenseClient, LicenseListing, LicenseRecord, OperationResult,
};

#[derive(Debug, Parser)]
#[command(name = "tc-license")]
#[command(about = "Add, list and remove Thunder Client seat licenses", version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Grant licenses to the given email addresses
    Add {
        #[arg(required = true)]
        emails: Vec<String>,
    },
    /// Revoke licenses from the given email addresses
    Remove {
        #[arg(required = true)]
        emails: Vec<String>,
    },
    /// List licenses; all pages unless --page is given
    List {
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        page: Option<u32>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);

    let config = match cli.connection.resolve() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    let client = LicenseClient::new(config)?;

    let succeeded = match cli.command {
        Command::Add { emails } => print_json(&client.add_license(&emails).await)?,
        Command::Remove { emails } => print_json(&client.remove_license(&emails).await)?,
        Command::List { page, format } => {
            let result = client.get_licenses(page).await;
            match (format, &result) {
                (OutputFormat::Table, OperationResult::Success { data, message }) => {
                    print_table(data);
                    eprintln!("✅ {}", message);
                    true
                }
                _ => print_json(&result)?,
            }
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

fn print_json<T: Serialize>(result: &OperationResult<T>) -> anyhow::Result<bool> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(result.is_success())
}

fn print_table(listing: &LicenseListing) {
    let licenses = listing.licenses();
    let width = licenses
        .iter()
        .map(|l| l.email().unwrap_or("-").len())
        .max()
        .unwrap_or(0)
        .max("EMAIL".len());

    println!("{:<width$}  {:<10}  CREATED", "EMAIL", "STATUS", width = width);
    for license in licenses {
        println!(
            "{:<width$}  {:<10}  {}",
            license.email().unwrap_or("-"),
            license.status().unwrap_or("-"),
            created_column(license),
            width = width
        );
    }
}

fn created_column(license: &LicenseRecord) -> String {
    match (license.created_at_utc(), license.created_at()) {
        (Some(ts), _) => ts.format("%Y-%m-%d %H:%M").to_string(),
        (None, Some(serde_json::Value::String(raw))) => raw.clone(),
        (None, Some(raw)) => raw.to_string(),
        (None, None) => "-".to_string(),
    }
}
