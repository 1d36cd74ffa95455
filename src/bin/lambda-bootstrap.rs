use anyhow::{anyhow, Context, Result};
use aws_lambda_events::event::sqs::SqsEvent;
use lambda_runtime::{run, service_fn, LambdaEvent};
use report_exporter::app::App;
use report_exporter::conf;
use report_exporter::storage::S3Storage;
use report_exporter::trigger::Trigger;
use report_exporter::warehouse::AthenaWarehouse;
use tracing::{info, instrument};

/// Export every report once per delivered queue event. The event's
/// messages are not read.
#[instrument(skip_all, fields(request_id = %event.context.request_id))]
async fn function_handler(event: LambdaEvent<SqsEvent>) -> Result<()> {
    let trigger = Trigger::from_event(&event);
    info!("Triggered by {:?}", trigger);
    let app = App::from_env()?;
    let sdk_config = conf::aws_service_config()?;
    let warehouse = AthenaWarehouse::new(sdk_config, &app.settings);
    let storage = S3Storage::new(sdk_config);
    app.handle(&trigger, &warehouse, &storage)
        .await
        .with_context(|| format!("Failed to handle trigger {:?}", &trigger))
}

/// Run an AWS Lambda function that listens to SQS events and, for
/// each one, runs the report queries on Athena and uploads their
/// results to S3 as CSV files.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    conf::init().await?;

    run(service_fn(function_handler))
        .await
        .map_err(|e| anyhow!("{:?}", e))
}
