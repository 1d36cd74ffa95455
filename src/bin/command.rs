use anyhow::{Context, Result};
use report_exporter::app::App;
use report_exporter::conf;
use report_exporter::storage::S3Storage;
use report_exporter::trigger::Trigger;
use report_exporter::warehouse::AthenaWarehouse;

/// Run the report queries on Athena once and upload their results to
/// S3, without waiting for a queue event.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    conf::init().await?;

    let app = App::from_env()?;
    let sdk_config = conf::aws_service_config()?;
    let warehouse = AthenaWarehouse::new(sdk_config, &app.settings);
    let storage = S3Storage::new(sdk_config);
    let trigger = Trigger::Manual;

    app.handle(&trigger, &warehouse, &storage)
        .await
        .with_context(|| format!("Failed to handle trigger {:?}", &trigger))?;

    Ok(())
}
