use clap::Subcommand;
use metasync_config::Config;

pub mod delete;
pub mod ingest;
pub mod inspect;

#[derive(Subcommand)]
pub enum Commands {
    /// Read `<metric> <value>` lines from stdin until EOF or Ctrl-C, then
    /// flush everything and exit
    Ingest,

    /// Print the persisted metadata of one metric as JSON
    Show {
        /// Metric name
        metric: String,
    },

    /// Print every persisted metadata record, one JSON object per line
    List,

    /// Remove a metric and every record derived from it
    Delete {
        /// Metric name
        metric: String,
    },
}

impl Commands {
    pub async fn execute(self, config: &Config) -> eyre::Result<()> {
        match self {
            Commands::Ingest => ingest::execute(config).await,
            Commands::Show { metric } => inspect::show(config, &metric).await,
            Commands::List => inspect::list(config).await,
            Commands::Delete { metric } => delete::execute(config, &metric).await,
        }
    }
}
