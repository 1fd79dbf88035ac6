use anyhow::{anyhow, Result};
use aws_lambda_events::event::sqs::SqsEvent;
use grade_functions::conf::TaskSettings;
use grade_functions::init_logging;
use grade_functions::tasks::TaskLogger;
use lambda_runtime::{run, service_fn, LambdaEvent};
use tracing::instrument;

/// Log every task message of the SQS event.
#[instrument(skip_all, fields(request_id = %event.context.request_id))]
async fn function_handler(logger: &TaskLogger, event: LambdaEvent<SqsEvent>) -> Result<()> {
    logger.handle_event(&event.payload);
    Ok(())
}

/// Run an AWS Lambda function that listens to the task queue and
/// writes each message to the log.
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let logger = TaskLogger::new(TaskSettings::from_env()?)?;

    run(service_fn(|event| function_handler(&logger, event)))
        .await
        .map_err(|e| anyhow!("{:?}", e))
}
