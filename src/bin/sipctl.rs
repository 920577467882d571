use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "sipctl")]
#[command(about = "Management CLI for the SIP application router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "SIPCTL_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check router status
    Status,
    /// List deployed applications
    Apps,
    /// Show one application in detail
    Show { app: String },
    /// Undeploy an application
    Undeploy { app: String },
    /// Resolve a request against an application
    Resolve {
        app: String,
        /// SIP method, e.g. INVITE
        method: String,
        /// Request URI, e.g. sip:alice@example.com
        uri: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Header as `Name: value`; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Add an application listener
    AddListener { app: String, listener: String },
    /// Remove an application listener
    RemoveListener { app: String, listener: String },
    /// Append a mapping rule read from a JSON file
    AddMapping { app: String, rule: PathBuf },
    /// Remove a mapping rule read from a JSON file
    RemoveMapping { app: String, rule: PathBuf },
    /// Set the concurrency control mode (none, sas, sip_session, application_session)
    Concurrency { app: String, mode: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = reqwest::Client::builder().default_headers(headers).build()?;
    let app_url = |app: &str| format!("{}/admin/applications/{}", cli.url, app);

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)).send().await?,
        Commands::Apps => client.get(format!("{}/admin/applications", cli.url)).send().await?,
        Commands::Show { app } => client.get(app_url(&app)).send().await?,
        Commands::Undeploy { app } => client.delete(app_url(&app)).send().await?,
        Commands::Resolve { app, method, uri, from, to, headers } => {
            let headers = headers
                .iter()
                .map(|h| parse_header(h))
                .collect::<Result<Vec<_>, _>>()?;
            let body = json!({
                "method": method,
                "uri": uri,
                "from": from,
                "to": to,
                "headers": headers,
            });
            client.post(format!("{}/resolve", app_url(&app))).json(&body).send().await?
        }
        Commands::AddListener { app, listener } => {
            client
                .post(format!("{}/listeners", app_url(&app)))
                .json(&json!({ "listener": listener }))
                .send()
                .await?
        }
        Commands::RemoveListener { app, listener } => {
            client.delete(format!("{}/listeners/{}", app_url(&app), listener)).send().await?
        }
        Commands::AddMapping { app, rule } => {
            let rule: Value = serde_json::from_str(&std::fs::read_to_string(rule)?)?;
            client.post(format!("{}/mappings", app_url(&app))).json(&rule).send().await?
        }
        Commands::RemoveMapping { app, rule } => {
            let rule: Value = serde_json::from_str(&std::fs::read_to_string(rule)?)?;
            client.delete(format!("{}/mappings", app_url(&app))).json(&rule).send().await?
        }
        Commands::Concurrency { app, mode } => {
            client
                .put(format!("{}/concurrency", app_url(&app)))
                .json(&json!({ "mode": mode }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header must be `Name: value`, got '{raw}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
