use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "ethics-cli")]
#[command(about = "Management CLI for the Digital Ethics Monitor", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000", env = "ETHICS_URL")]
    url: String,

    /// Bearer token from `ethics-cli login`.
    #[arg(short, long, env = "ETHICS_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange credentials for a session token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Check server liveness
    Health,
    /// List recent audit records
    Audit {
        #[arg(long)]
        event_type: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Verify audit ledger integrity
    Verify,
    /// Show the security report
    Report,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    }

    let res = match cli.command {
        Commands::Login { username, password } => {
            client
                .post(format!("{}/auth/login", cli.url))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/health", cli.url)).send().await?,
        Commands::Audit { event_type, limit } => {
            let mut query = Vec::new();
            if let Some(t) = event_type {
                query.push(("event_type", t));
            }
            if let Some(l) = limit {
                query.push(("limit", l.to_string()));
            }
            client
                .get(format!("{}/audit", cli.url))
                .query(&query)
                .headers(headers)
                .send()
                .await?
        }
        Commands::Verify => {
            client
                .get(format!("{}/audit/verify", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Report => {
            client
                .get(format!("{}/ethics/security-report", cli.url))
                .headers(headers)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {status}");
        if let Some(retry) = res.headers().get(reqwest::header::RETRY_AFTER) {
            eprintln!("Retry after: {}s", retry.to_str().unwrap_or("?"));
        }
        if let Ok(text) = res.text().await {
            eprintln!("Response: {text}");
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
