use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{Map, Value};

#[derive(Parser)]
#[command(name = "telemetry-cli")]
#[command(about = "Management CLI for the admin telemetry service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Bearer token; admin commands need a token with admin rights
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service status and queue depth
    Status,
    /// Show logging pipeline statistics
    Telemetry,
    /// List active performance thresholds
    Thresholds,
    /// Emit one log entry through the HTTP emit API
    Emit {
        /// application, error, system, performance or audit
        category: String,

        #[arg(short, long)]
        message: String,

        /// Extra field as key=value; values are parsed as JSON when possible
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
    }

    let admin_path = match &cli.command {
        Commands::Status => Some("status"),
        Commands::Telemetry => Some("telemetry"),
        Commands::Thresholds => Some("thresholds"),
        Commands::Emit { .. } => None,
    };

    if let Some(path) = admin_path {
        let res = client
            .get(format!("{}/admin/{}", cli.url, path))
            .headers(headers)
            .send()
            .await?;
        return print_response(res).await;
    }

    if let Commands::Emit {
        category,
        message,
        fields,
    } = cli.command
    {
        let mut body: Map<String, Value> = fields.into_iter().collect();
        body.insert("message".to_string(), Value::String(message));

        let res = client
            .post(format!("{}/api/logs/{}", cli.url, category))
            .headers(headers)
            .json(&body)
            .send()
            .await?;
        if res.status().is_success() {
            println!("Accepted ({})", res.status());
        } else {
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
