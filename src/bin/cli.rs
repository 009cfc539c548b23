//! httpkv CLI Client
//!
//! Command-line interface for interacting with an httpkv server.

use std::io::Write;

use clap::{Parser, Subcommand};
use reqwest::{StatusCode, Url};

/// httpkv CLI
#[derive(Parser, Debug)]
#[command(name = "httpkv-cli")]
#[command(about = "CLI for the httpkv key-value store")]
struct Args {
    /// Server base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Shared secret
    #[arg(short, long, env = "AUTHKEY", hide_env_values = true)]
    auth_key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(message) = run(args).await {
        eprintln!("error: {}", message);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    let client = reqwest::Client::new();

    match args.command {
        Commands::Get { key } => {
            let url = endpoint(&args.server, &args.auth_key, &key)?;
            let response = client.get(url).send().await.map_err(|e| e.to_string())?;
            check_status(response.status())?;

            let body = response.bytes().await.map_err(|e| e.to_string())?;
            let mut stdout = std::io::stdout();
            stdout.write_all(&body).map_err(|e| e.to_string())?;
            stdout.write_all(b"\n").map_err(|e| e.to_string())?;
        }
        Commands::Set { key, value } => {
            let url = endpoint(&args.server, &args.auth_key, &key)?;
            let response = client
                .put(url)
                .body(value)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            check_status(response.status())?;
            println!("OK");
        }
    }

    Ok(())
}

/// `{server}/api/{auth_key}/{key}`, with each segment percent-encoded
fn endpoint(server: &str, auth_key: &str, key: &str) -> Result<Url, String> {
    let mut url = Url::parse(server).map_err(|e| format!("invalid server URL: {}", e))?;
    url.path_segments_mut()
        .map_err(|_| format!("server URL cannot be a base: {}", server))?
        .pop_if_empty()
        .extend(["api", auth_key, key]);
    Ok(url)
}

fn check_status(status: StatusCode) -> Result<(), String> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::UNAUTHORIZED => Err("unauthorized".to_string()),
        StatusCode::NOT_FOUND => Err("not found".to_string()),
        other => Err(format!("unexpected status {}", other)),
    }
}
