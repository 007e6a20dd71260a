use clap::Parser;
use tracing_subscriber::EnvFilter;

use gridstore::cli::Args;
use gridstore::store::{GridStore, StoreConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = match &args.url {
        Some(url) => StoreConfig::from_url(url),
        None => StoreConfig::resolve()?,
    };

    let store = GridStore::new(config);
    store.connect().await?;

    let result = args.command.run(&store).await;
    store.close().await;

    let output = result?;
    println!("{}", output);
    Ok(())
}
