//! Serverless handlers for a small grade-keeping app: a CSV ingestor
//! fed by object uploads, and a logger for queued task messages.

pub mod app;
pub mod client;
pub mod conf;
pub mod ingest;
pub mod parse;
pub mod record;
pub mod store;
pub mod tasks;
pub mod trigger;

#[cfg(test)]
mod test_support;

/// Install the log formatter shared by every binary. The hosting
/// runtime timestamps each line already.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
}
