use anyhow::{anyhow, Context, Result};
use aws_lambda_events::event::s3::S3Event;
use grade_functions::trigger::ObjectTrigger;
use grade_functions::{app, init_logging};
use lambda_runtime::{run, service_fn, LambdaEvent};
use tracing::instrument;

/// Ingest every object announced by the S3 event, one after the
/// other. The first failure fails the whole invocation.
#[instrument(skip(event), fields(request_id = %event.context.request_id))]
async fn function_handler(event: LambdaEvent<S3Event>) -> Result<()> {
    let app = app::current();
    for trigger in ObjectTrigger::from_event(&event.payload, &app.settings.container_name) {
        app.handle(&trigger)
            .await
            .with_context(|| format!("Failed to ingest object {:?}", &trigger))?;
    }
    Ok(())
}

/// Run an AWS Lambda function that listens to object-created events
/// on the student files container, and writes the rows of each
/// uploaded CSV file into the grades table.
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    app::init().await?;

    run(service_fn(function_handler))
        .await
        .map_err(|e| anyhow!("{:?}", e))
}
