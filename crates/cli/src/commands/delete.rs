use metasync_config::Config;

pub async fn execute(config: &Config, metric: &str) -> eyre::Result<()> {
    let service = crate::open_service(config)?;
    let report = service.delete_metric(metric).await?;

    if !report.meta_removed && report.observations_removed == 0 && report.windows_removed == 0 {
        tracing::warn!(%metric, "nothing stored for metric");
    }
    println!(
        "deleted {metric}: metadata {}, {} observation(s), {} window(s)",
        if report.meta_removed { "removed" } else { "absent" },
        report.observations_removed,
        report.windows_removed
    );
    Ok(())
}
