use clap::Parser;
use metasync_cli::commands::Commands;
use metasync_config::ConfigLoader;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "metasync")]
#[command(about = "Track running min/max/count metadata for metrics", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (JSON); falls back to METASYNC_CONFIG, then defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    metasync_utils::tracing::init()
        .map_err(|e| eyre::eyre!("failed to initialize tracing: {e}"))?;

    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.path(path);
    }
    let config = loader.load()?;

    cli.command.execute(&config).await
}
