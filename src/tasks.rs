//! The task logger: writes every queued task message to the log.

use crate::conf::TaskSettings;
use anyhow::Result;
use aws_lambda_events::event::sqs::{SqsEvent, SqsMessage};
use tracing::{info, instrument, warn};

/// Logs the messages of a single queue.
#[derive(Debug)]
pub struct TaskLogger {
    settings: TaskSettings,
}

impl TaskLogger {
    /// Builds a logger from validated settings.
    pub fn new(settings: TaskSettings) -> Result<Self> {
        settings.validate()?;
        Ok(TaskLogger { settings })
    }

    pub fn queue_name(&self) -> &str {
        &self.settings.queue_name
    }

    /// Write a task message to the log, untouched.
    pub fn log_task(&self, body: &str) {
        info!("Processing task: {}", body);
    }

    /// Whether a message delivered from the given source comes from
    /// the configured queue. Messages with no source count as such.
    fn is_own_queue(&self, event_source_arn: Option<&str>) -> bool {
        match event_source_arn {
            Some(arn) => arn.rsplit(':').next() == Some(self.queue_name()),
            None => true,
        }
    }

    /// Log a single delivered message. Messages from an unexpected
    /// queue are still logged, with a warning, since the runtime
    /// acknowledges them either way. Returns whether it was logged.
    pub fn handle_message(&self, message: &SqsMessage) -> bool {
        if !self.is_own_queue(message.event_source_arn.as_deref()) {
            warn!(
                "Message {:?} comes from {:?}; expected queue {:?}",
                message.message_id,
                message.event_source_arn,
                self.queue_name()
            );
        }
        match &message.body {
            Some(body) => {
                self.log_task(body);
                true
            }
            None => {
                warn!("Ignoring message {:?} without a body", message.message_id);
                false
            }
        }
    }

    /// Log every message of a queue event. Returns how many messages
    /// were logged.
    #[instrument(skip_all, fields(messages = event.records.len()))]
    pub fn handle_event(&self, event: &SqsEvent) -> usize {
        event
            .records
            .iter()
            .filter(|message| self.handle_message(message))
            .count()
    }
}
