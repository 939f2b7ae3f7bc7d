use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "fleet-breaker-cli")]
#[command(about = "Operator CLI for fleet-breaker circuit breakers", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "FLEET_BREAKER_ADMIN_API_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service and store connectivity
    Status,
    /// List breakers known to the service instance
    List,
    /// Show one breaker's state
    Show { name: String },
    /// Clear a breaker's failures and open state fleet-wide
    Reset { name: String },
    /// Force a breaker open for one cooldown fleet-wide
    Trip { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = Url::parse(&cli.url)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, url) = match &cli.command {
        Commands::Status => (Method::GET, endpoint(&base, &["status"])?),
        Commands::List => (Method::GET, endpoint(&base, &["admin", "breakers"])?),
        Commands::Show { name } => (
            Method::GET,
            endpoint(&base, &["admin", "breakers", name.as_str()])?,
        ),
        Commands::Reset { name } => (
            Method::POST,
            endpoint(&base, &["admin", "breakers", name.as_str(), "reset"])?,
        ),
        Commands::Trip { name } => (
            Method::POST,
            endpoint(&base, &["admin", "breakers", name.as_str(), "trip"])?,
        ),
    };

    let res = client.request(method, url).headers(headers).send().await?;
    print_response(res).await
}

/// Append percent-encoded path segments; breaker names contain spaces and slashes.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| format!("base url '{}' cannot carry a path", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
