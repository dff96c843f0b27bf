//! File-based secrets example

use secretconf::{Configurable, Loader};
use std::io::Write;
use tempfile::NamedTempFile;

#[derive(Debug, Default, Configurable)]
struct Config {
    // Loaded from API_KEY, or from the file named by API_KEY_FILE
    #[conf("env:API_KEY")]
    pub api_key: String,

    #[conf("env:DATABASE_PASSWORD")]
    pub database_password: String,

    // Regular environment variable
    #[conf("env:DATABASE_HOST")]
    pub database_host: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Save API key to file
    let mut api_key_file = NamedTempFile::new()?;
    writeln!(api_key_file, "super_secret_api_key_12345")?;

    // Save database password to file
    let mut db_password_file = NamedTempFile::new()?;
    writeln!(db_password_file, "db_password_67890")?;

    // Set environment variables (with _FILE suffix)
    std::env::set_var("API_KEY_FILE", api_key_file.path());
    std::env::set_var("DATABASE_PASSWORD_FILE", db_password_file.path());
    std::env::set_var("DATABASE_HOST", "localhost");

    // Load configuration
    let loader = Loader::builder().env_file_fallback(true).build();
    let config: Config = loader.load_default().await?;

    println!("Configuration loaded from files:");
    println!("  API Key: {}", config.api_key);
    println!("  Database Password: {}", config.database_password);
    println!("  Database Host: {}", config.database_host);

    Ok(())
}
