use trellis::config::TrellisConfig;
use trellis::http::LdpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("Trellis LDP server v{}", trellis::version());
    println!("=================================");

    let config = match std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TRELLIS_CONFIG").ok())
    {
        Some(path) => TrellisConfig::from_file(&path)
            .map_err(|e| anyhow::anyhow!("configuration {}: {}", path, e))?,
        None => TrellisConfig::default(),
    };

    let bundle = trellis::default_bundle(config).await?;
    LdpServer::new(bundle)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    Ok(())
}
