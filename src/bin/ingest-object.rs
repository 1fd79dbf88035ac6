use anyhow::{Context, Result};
use grade_functions::trigger::ObjectTrigger;
use grade_functions::{app, init_logging};
use std::env::var;

/// Ingest a single object from the student files container, named by
/// the `OBJECT_KEY` environment variable.
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    app::init().await?;

    let key = var("OBJECT_KEY").context("OBJECT_KEY is required")?;
    let trigger = ObjectTrigger {
        bucket: app::current().settings.container_name.clone(),
        key,
    };

    app::current()
        .handle(&trigger)
        .await
        .with_context(|| format!("Failed to ingest object {:?}", &trigger))?;

    Ok(())
}
