use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the h3 reverse proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long)]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy system status
    Status,
    /// Show the upstream tree with health and failure counts
    Upstreams,
    /// Start active health checking
    Start,
    /// Stop active health checking
    Stop,
    /// Enable or disable active/passive checks
    Checks {
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        passive: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path, body) = match cli.command {
        Commands::Status => (Method::GET, "/admin/status", None),
        Commands::Upstreams => (Method::GET, "/admin/upstreams", None),
        Commands::Start => (Method::POST, "/admin/health-check/start", None),
        Commands::Stop => (Method::POST, "/admin/health-check/stop", None),
        Commands::Checks { active, passive } => (
            Method::PUT,
            "/admin/checks",
            Some(json!({ "active": active, "passive": passive })),
        ),
    };

    let mut request = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }

    print_response(request.send().await?).await
}

#[derive(Debug, thiserror::Error)]
#[error("admin API returned status {status}: {body}")]
struct AdminApiError {
    status: StatusCode,
    body: String,
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body = res.text().await?;
    let json = parse_response(status, &body)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// A non-success status is an error carrying the response text.
fn parse_response(status: StatusCode, body: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if !status.is_success() {
        return Err(AdminApiError {
            status,
            body: body.to_string(),
        }
        .into());
    }
    Ok(serde_json::from_str(body)?)
}
