//! Read-only views of the persisted metadata

use metasync_config::Config;
use metasync_store::MetaStore;

pub async fn show(config: &Config, metric: &str) -> eyre::Result<()> {
    let store = crate::open_store(config);
    let Some(record) = store.read(metric).await? else {
        eyre::bail!("no metadata for metric '{metric}'");
    };
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

pub async fn list(config: &Config) -> eyre::Result<()> {
    let store = crate::open_store(config);
    let mut records = store.scan().await?;
    records.sort_by(|a, b| a.id.cmp(&b.id));

    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    tracing::debug!(count = records.len(), "listed metric metadata");
    Ok(())
}
