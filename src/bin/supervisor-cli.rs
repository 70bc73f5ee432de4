use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "supervisor-cli")]
#[command(about = "Query a running DNS HA supervisor over its status endpoint", long_about = None)]
struct Cli {
    #[arg(short, long, env = "SUPERVISOR_URL", default_value = "http://127.0.0.1:8888")]
    url: String,

    /// Bearer token for admin routes.
    #[arg(short, long, env = "SUPERVISOR_ADMIN_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process liveness
    Live,
    /// Whether this node answers DNS
    Ready,
    /// Summary health (non-zero exit unless healthy)
    Health,
    /// Full report with per-service breaker state
    Detailed,
    /// Full report, regardless of health
    Status,
    /// Close a circuit breaker (all when no service is given)
    Reset { service: Option<String> },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Live => client.get(format!("{}/live", base)).send().await?,
        Commands::Ready => client.get(format!("{}/ready", base)).send().await?,
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Detailed => client.get(format!("{}/health/detailed", base)).send().await?,
        Commands::Status => client.get(format!("{}/status", base)).send().await?,
        Commands::Reset { service } => {
            let Some(token) = cli.token.as_deref() else {
                eprintln!("Error: reset requires --token or SUPERVISOR_ADMIN_TOKEN");
                return Ok(ExitCode::from(2));
            };
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
            let url = match service {
                Some(id) => format!("{}/admin/reset/{}", base, id),
                None => format!("{}/admin/reset", base),
            };
            client.post(url).headers(headers).send().await?
        }
    };

    print_response(res).await
}

/// Print the body and map the HTTP status to an exit code.
async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }

    if status.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Error: supervisor returned status {}", status);
        Ok(ExitCode::FAILURE)
    }
}
