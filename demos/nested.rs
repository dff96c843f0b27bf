//! Nested records example
//!
//! A JSON blob fills the record, then the record's own tags override
//! individual fields.

use secretconf::{Configurable, Loader, StaticProvider};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, Configurable)]
struct Database {
    pub host: String,
    pub port: u16,

    #[serde(default)]
    #[conf("env:DATABASE_PASSWORD provider:db-password")]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Configurable)]
struct Telemetry {
    pub endpoint: String,
}

#[derive(Debug, Default, Configurable)]
struct Config {
    #[conf("env:DATABASE_JSON provider:db-config", nested)]
    pub database: Database,

    // Optional record; the XML default fills it when TELEMETRY_XML is unset
    #[conf("env:TELEMETRY_XML format:xml default:'<Telemetry><endpoint>http://localhost:4317</endpoint></Telemetry>'", nested)]
    pub telemetry: Option<Telemetry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::env::set_var("DATABASE_PASSWORD", "env-password");

    let secrets = StaticProvider::new()
        .with("db-config", r#"{"host":"db.internal","port":5432}"#)
        .with("db-password", "vault-password");

    let loader = Loader::builder()
        .provider("vault", secrets)
        .default_backend("vault")
        .build();

    let config: Config = loader.load_default().await?;

    println!("Database:");
    println!("  Host: {}", config.database.host);
    println!("  Port: {}", config.database.port);
    println!("  Password: {}", config.database.password);
    if let Some(telemetry) = &config.telemetry {
        println!("Telemetry endpoint: {}", telemetry.endpoint);
    }

    Ok(())
}
