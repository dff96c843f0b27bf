//! Basic usage example

use secretconf::{Configurable, Loader};
use std::time::Duration;

#[derive(Debug, Default, Configurable)]
struct Config {
    // Required field: loaded from DATABASE_URL environment variable
    #[conf("env:DATABASE_URL")]
    pub database_url: String,

    // With default value
    #[conf("env:SERVER_ADDR default:'127.0.0.1:8080'")]
    pub server_addr: String,

    // Numeric type
    #[conf("env:MAX_CONNECTIONS default:10")]
    pub max_connections: u32,

    // Durations use humantime syntax
    #[conf("env:REQUEST_TIMEOUT default:30s")]
    pub request_timeout: Duration,

    // Boolean type
    #[conf("env:DEBUG_MODE default:false")]
    pub debug_mode: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set environment variables for demonstration
    std::env::set_var("DATABASE_URL", "postgres://localhost/mydb");
    std::env::set_var("SERVER_ADDR", "0.0.0.0:3000");

    // Load configuration
    let config: Config = Loader::new().load_default().await?;

    println!("Configuration loaded:");
    println!("  Database URL: {}", config.database_url);
    println!("  Server Address: {}", config.server_addr);
    println!("  Max Connections: {}", config.max_connections);
    println!("  Request Timeout: {:?}", config.request_timeout);
    println!("  Debug Mode: {}", config.debug_mode);

    Ok(())
}
