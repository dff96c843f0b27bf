//! Secret provider example
//!
//! Environment variables win; provider keys are the fallback. Every failed
//! attempt is reported together.

use secretconf::{Configurable, Loader, Provider, StaticProvider};

/// A provider that derives secrets from the key, standing in for a real
/// secret manager client.
struct EchoVault;

#[async_trait::async_trait]
impl Provider for EchoVault {
    async fn fetch(&self, key: &str) -> anyhow::Result<String> {
        match key.strip_prefix("prod/") {
            Some(name) => Ok(format!("vault-secret-for-{name}")),
            None => anyhow::bail!("access denied for {key}"),
        }
    }
}

#[derive(Debug, Default, Configurable)]
struct Config {
    // Default backend
    #[conf("env:API_KEY provider:api-key")]
    pub api_key: String,

    // Explicit backend
    #[conf("provider:database-password backend:vault")]
    pub database_password: String,

    #[conf("env:SIGNING_KEY provider:signing-key backend:vault")]
    pub signing_key: String,

    #[conf("provider:missing backend:gcp")]
    pub gcp_token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loader = Loader::builder()
        .env_lookup(|name: &str| match name {
            "API_KEY" => Some("from-environment".to_string()),
            _ => None,
        })
        .provider("aws", StaticProvider::new().with("api-key", "from-aws"))
        .provider("vault", EchoVault)
        .default_backend("aws")
        .provider_prefix(|| "prod/".to_string())
        .build();

    let mut config = Config::default();
    match loader.load(&mut config).await {
        Ok(()) => println!("All fields resolved"),
        Err(errors) => {
            println!("{} field(s) failed:", errors.len());
            for field in errors.fields() {
                println!("  {}", field.path);
                for attempt in &field.attempts {
                    println!("    - {attempt}");
                }
            }
        }
    }

    println!("Configuration:");
    println!("  API Key: {}", config.api_key);
    println!("  Database Password: {}", config.database_password);
    println!("  Signing Key: {}", config.signing_key);

    Ok(())
}
