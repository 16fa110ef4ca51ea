use anyhow::Result;
use clap::Parser;
use ideascope::cli::Args;
use ideascope::launch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = args.into_config()?;

    let default_level = if config.verbose {
        "ideascope=debug"
    } else {
        "ideascope=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let request = args.load_request()?;
    let result = launch(&config, &request).await?;

    tracing::info!(
        "🎯 {} → {:?} ({:.0}/100)",
        result.idea_id,
        result.strategy.verdict,
        result.strategy.overall_score
    );
    Ok(())
}
