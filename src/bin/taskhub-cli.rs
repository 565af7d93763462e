use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "taskhub-cli")]
#[command(about = "Operator CLI for the taskhub admin surface", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Bearer token issued by the identity provider
    #[arg(short, long, conflicts_with = "role")]
    token: Option<String>,

    /// Role to assert via x-user-role (header identity mode only)
    #[arg(short, long)]
    role: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or change the live configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Per-group bulkhead load
    Metrics,
    /// Service and datastore health
    Health,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Merge a JSON document into the recognized sections
    Patch { json: String },
    /// Replace the whole configuration from a JSON or TOML file
    Replace { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }
    if let Some(role) = &cli.role {
        headers.insert("x-user-role", HeaderValue::from_str(role)?);
    }

    let request = match cli.command {
        Commands::Config { action: ConfigAction::Show } => client.get(format!("{}/config", cli.url)),
        Commands::Config { action: ConfigAction::Patch { json } } => {
            let body: Value = serde_json::from_str(&json)?;
            client.patch(format!("{}/config", cli.url)).json(&body)
        }
        Commands::Config { action: ConfigAction::Replace { file } } => {
            let text = std::fs::read_to_string(&file)?;
            let body: Value = if file.extension().is_some_and(|ext| ext == "toml") {
                serde_json::to_value(toml::from_str::<toml::Value>(&text)?)?
            } else {
                serde_json::from_str(&text)?
            };
            client.put(format!("{}/config", cli.url)).json(&body)
        }
        Commands::Metrics => client.get(format!("{}/bulkhead/metrics", cli.url)),
        Commands::Health => client.get(format!("{}/health", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: taskhub returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
