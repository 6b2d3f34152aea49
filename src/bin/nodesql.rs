use clap::{Parser, Subcommand};
use log::{error, info};
use nodesql::crypto::ClientKeyPair;
use nodesql::{ClientConfig, Consistency, DatabaseClient, QueryOptions};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the client configuration file (TOML)
    #[arg(short, long, default_value = "nodesql.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every configured node and print its health
    Health,
    /// Execute a single statement and print the result as JSON
    Query {
        /// SQL text with $1, $2, ... placeholders
        sql: String,
        /// Parameters as a JSON array
        #[arg(long, default_value = "[]")]
        params: String,
        /// Read with eventual consistency
        #[arg(long)]
        eventual: bool,
        /// Override the per-attempt timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Generate a new signing key pair
    Keygen,
}

fn handle_keygen() -> Result<(), Box<dyn std::error::Error>> {
    let keypair = ClientKeyPair::generate();
    println!("private_key = \"{}\"", keypair.secret_key_hex());
    println!("# public key: {}", keypair.public_key().to_hex());
    Ok(())
}

async fn handle_health(client: &DatabaseClient) -> Result<(), Box<dyn std::error::Error>> {
    let healthy = client.refresh_health().await;
    let snapshot = client.health_snapshot();
    for node in &client.config().nodes {
        match snapshot.get(node) {
            Some(h) if h.healthy => println!("{}  healthy  {}ms", node, h.latency_ms),
            Some(_) => println!("{}  unhealthy", node),
            None => println!("{}  unknown", node),
        }
    }
    info!("{}/{} nodes healthy", healthy, client.config().nodes.len());
    Ok(())
}

async fn handle_query(
    client: &DatabaseClient,
    sql: &str,
    params: &str,
    eventual: bool,
    timeout_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let params: Vec<Value> = serde_json::from_str(params)
        .map_err(|e| format!("--params must be a JSON array: {}", e))?;

    let mut options = QueryOptions::new();
    if eventual {
        options = options.with_consistency(Consistency::Eventual);
    }
    if let Some(ms) = timeout_ms {
        options = options.with_timeout_ms(ms);
    }

    client.initialize().await?;
    let result = client.query(sql, &params, options).await;
    client.close().await;

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Commands::Keygen = cli.command {
        return handle_keygen();
    }

    let config = ClientConfig::from_toml_file(&cli.config)?;
    let client = DatabaseClient::new(config)?;

    let outcome = match &cli.command {
        Commands::Health => handle_health(&client).await,
        Commands::Query {
            sql,
            params,
            eventual,
            timeout_ms,
        } => handle_query(&client, sql, params, *eventual, *timeout_ms).await,
        Commands::Keygen => Ok(()),
    };
    if let Err(e) = &outcome {
        error!("{}", e);
    }
    outcome
}
