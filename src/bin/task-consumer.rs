use anyhow::{anyhow, Context, Result};
use aws_sdk_sqs::{types::DeleteMessageBatchRequestEntry, Client};
use core::time::Duration;
use grade_functions::conf::TaskSettings;
use grade_functions::tasks::TaskLogger;
use grade_functions::{client, init_logging};
use std::env::var;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// The minimum time to wait between ticks, in milliseconds.
const BASE_LAPSE_TIME: u64 = 300;

/// The base of the exponential backoff sequence.
const BACKOFF_BASE: u64 = 2;

/// The maximum amount of milliseconds to sleep between ticks. Set to
/// the equivalent of 20 minutes.
const MAX_SLEEP: u64 = 1200000;

/// Wrapper structure that executes successive SQS consumption cycles:
/// receive messages, log their bodies, and finally delete them.
struct TaskConsumer {
    queue_url: String,
    visibility_timeout: i32,
    max_number_of_messages: i32,
    client: Client,
    logger: TaskLogger,
    backoff: u32,
}

impl TaskConsumer {
    /// Record a success and wait a little while.
    async fn pass(&mut self) {
        self.backoff = 0;
        sleep(Duration::from_millis(BASE_LAPSE_TIME)).await;
    }

    /// Record a failure and wait a while.
    async fn fail(&mut self) {
        sleep(Duration::from_millis(std::cmp::min(
            BASE_LAPSE_TIME.saturating_mul(BACKOFF_BASE.saturating_pow(self.backoff)),
            MAX_SLEEP,
        )))
        .await;
        self.backoff = self.backoff.saturating_add(1);
    }

    /// Perform a single pass of the SQS consumption cycle.
    #[instrument(skip(self))]
    pub async fn tick(&mut self) {
        let result = match self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .visibility_timeout(self.visibility_timeout)
            .max_number_of_messages(self.max_number_of_messages)
            .wait_time_seconds(30)
            .send()
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Error while consuming messages from SQS queue: {:?}", e);
                return self.fail().await;
            }
        };

        let messages = result.messages().unwrap_or_default();
        if messages.is_empty() {
            return self.pass().await;
        }
        for message in messages {
            match message.body() {
                Some(body) => self.logger.log_task(body),
                None => warn!("Ignoring message {:?} without a body", message.message_id()),
            }
        }

        let delete_result = self
            .client
            .delete_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(
                messages
                    .iter()
                    .map(|message| {
                        DeleteMessageBatchRequestEntry::builder()
                            .set_id(message.message_id().map(String::from))
                            .set_receipt_handle(message.receipt_handle().map(String::from))
                            .build()
                    })
                    .collect(),
            ))
            .send()
            .await;
        let result = match delete_result {
            Ok(result) => result,
            Err(e) => {
                warn!("Couldn't delete SQS messages: {:?}", e);
                return self.fail().await;
            }
        };
        let failed = result.failed().unwrap_or_default().len();
        if failed > 0 {
            warn!(
                "Couldn't delete some SQS messages: {:?} out of {:?} weren't deleted",
                failed,
                messages.len()
            );
        }
        self.pass().await;
    }
}

/// Consume the task queue outside of Lambda, logging each message and
/// deleting it afterwards.
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let settings = TaskSettings::from_env()?;

    let visibility_timeout = var("SQS_VISIBILITY_TIMEOUT")
        .unwrap_or(String::from("30"))
        .parse::<i32>()
        .context("SQS_VISIBILITY_TIMEOUT must be a number")?;
    let max_number_of_messages = var("SQS_MAX_NUMBER_OF_MESSAGES")
        .unwrap_or(String::from("1"))
        .parse::<i32>()
        .context("SQS_MAX_NUMBER_OF_MESSAGES must be a number")?;
    let config =
        client::sdk_config(settings.storage_connection.as_deref(), settings.account()).await;
    let sqs_client = Client::new(&config);
    let queue_url = sqs_client
        .get_queue_url()
        .queue_name(&settings.queue_name)
        .send()
        .await
        .with_context(|| format!("Failed to resolve the URL of queue {:?}", settings.queue_name))?
        .queue_url()
        .map(String::from)
        .ok_or_else(|| anyhow!("Queue {:?} has no URL", settings.queue_name))?;
    info!("Consuming tasks from {}", queue_url);

    let mut consumer = TaskConsumer {
        queue_url,
        visibility_timeout,
        max_number_of_messages,
        client: sqs_client,
        logger: TaskLogger::new(settings)?,
        backoff: 0,
    };

    // Listen for abort signals
    let (stop_processing, mut should_stop) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("CTRL-C");
            let _ = stop_processing.send(());
        }
    });

    // Continuously receive messages and log each one
    loop {
        tokio::select! {
            _ = consumer.tick() => (),
            _ = &mut should_stop => break
        }
    }
    Ok(())
}
