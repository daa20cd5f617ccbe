//! Streaming ingestion of observations

use metasync_cache::{MetaService, ObserveOutcome};
use metasync_config::Config;
use metasync_core::{Error, Result};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Counts reported when ingestion ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub observed: usize,
    pub created: usize,
    pub skipped: usize,
}

/// Split a `<metric> <value>` line. Blank lines and `#` comments yield `None`
/// without being counted as malformed.
pub fn parse_line(line: &str) -> Option<std::result::Result<(&str, f64), String>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = line.split_whitespace();
    let (Some(metric), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Some(Err(format!("expected '<metric> <value>', got '{line}'")));
    };
    Some(
        value
            .parse::<f64>()
            .map(|value| (metric, value))
            .map_err(|e| format!("invalid value '{value}' for {metric}: {e}")),
    )
}

/// Feed every line of `reader` to `service` until EOF or until `shutdown`
/// completes
pub async fn ingest<R, S>(
    service: &MetaService,
    reader: R,
    shutdown: S,
) -> Result<IngestSummary>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = reader.lines();
    let mut summary = IngestSummary::default();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            () = &mut shutdown => {
                tracing::info!("interrupted, stopping ingestion");
                break;
            }
        };
        let line = line.map_err(|e| Error::io("<stdin>", "read line", e))?;
        let Some(line) = line else {
            break;
        };

        match parse_line(&line) {
            None => {}
            Some(Err(reason)) => {
                tracing::warn!(%reason, "skipping malformed line");
                summary.skipped += 1;
            }
            Some(Ok((metric, value))) => match service.observe(metric, value).await {
                Ok(ObserveOutcome::Created) => {
                    summary.observed += 1;
                    summary.created += 1;
                }
                Ok(ObserveOutcome::Updated) => summary.observed += 1,
                Ok(ObserveOutcome::Ignored) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping observation");
                    summary.skipped += 1;
                }
            },
        }
    }

    Ok(summary)
}

pub async fn execute(config: &Config) -> eyre::Result<()> {
    let service = crate::open_service(config)?;
    service.load().await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let summary = ingest(&service, BufReader::new(tokio::io::stdin()), shutdown).await;

    // Drain even when reading failed, so accepted observations are not lost
    let drained = service.drain_and_stop().await;
    let summary = summary?;
    tracing::info!(
        observed = summary.observed,
        created = summary.created,
        skipped = summary.skipped,
        "ingestion finished"
    );
    drained?;
    Ok(())
}
