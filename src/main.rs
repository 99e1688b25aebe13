use std::path::PathBuf;

use extern_msg::config::{IngestConfig, StoreConfig};
use extern_msg::error::ConfigError;
use extern_msg::ingest;
use extern_msg::store::LibSqlGateway;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let file = std::env::var("EXTERN_MSG_FILE")
        .map(PathBuf::from)
        .map_err(|_| ConfigError::MissingRequired {
            key: "EXTERN_MSG_FILE".to_string(),
            hint: "export EXTERN_MSG_FILE=/path/to/messages.csv".to_string(),
        })?;
    let ingest_config = IngestConfig::from_env()?;
    let store_config = StoreConfig::from_env()?;

    eprintln!("extern-msg v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   File: {}", file.display());
    eprintln!("   Database: {}", store_config.db_path.display());

    let store = LibSqlGateway::new_local(&store_config.db_path).await?;
    let mut messages = ingest::from_file(&file, &ingest_config)?;

    match ingest::send_all(&store, &mut messages).await {
        Ok(()) => {
            eprintln!("   Sent {} messages", messages.len());
            Ok(())
        }
        Err(e) => {
            for (index, failure) in &e.failures {
                eprintln!("   Message {index}: {failure}");
            }
            eprintln!(
                "   Sent {} of {} messages",
                messages.len() - e.failures.len(),
                messages.len()
            );
            Err(e.into())
        }
    }
}
