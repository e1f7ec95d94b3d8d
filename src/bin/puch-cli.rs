use clap::{Parser, Subcommand};
use futures_util::{stream, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "puch-cli")]
#[command(about = "Drive and inspect the green and red services", long_about = None)]
struct Cli {
    /// Base URL of the service to talk to.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a burst of requests and tally the status codes
    Hammer {
        /// Path to request, e.g. /puch-with-cb or /puched
        #[arg(short, long, default_value = "/puch-with-cb")]
        path: String,

        #[arg(short = 'n', long, default_value_t = 100)]
        requests: usize,

        #[arg(short, long, default_value_t = 10)]
        concurrency: usize,
    },
    /// Show red's circuit breaker state and counts
    Breaker,
    /// Show green's load state
    Load,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Hammer {
            path,
            requests,
            concurrency,
        } => {
            hammer(&client, &format!("{}{}", base, path), requests, concurrency).await;
        }
        Commands::Breaker => {
            let res = client.get(format!("{}/breaker", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Load => {
            let res = client.get(format!("{}/state", base)).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn hammer(client: &reqwest::Client, url: &str, requests: usize, concurrency: usize) {
    let started = Instant::now();
    let results: Vec<Result<u16, String>> = stream::iter(0..requests)
        .map(|_| async move {
            client
                .get(url)
                .send()
                .await
                .map(|res| res.status().as_u16())
                .map_err(|e| e.to_string())
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    let elapsed = started.elapsed();

    let mut by_status: BTreeMap<u16, usize> = BTreeMap::new();
    let mut errors = 0;
    for result in &results {
        match result {
            Ok(status) => *by_status.entry(*status).or_default() += 1,
            Err(_) => errors += 1,
        }
    }

    println!("{} requests to {} in {:.2?}", requests, url, elapsed);
    for (status, count) in &by_status {
        println!("  {}: {}", status, count);
    }
    if errors > 0 {
        println!("  transport errors: {}", errors);
        if let Some(Err(first)) = results.iter().find(|r| r.is_err()) {
            eprintln!("  first error: {}", first);
        }
    }
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
