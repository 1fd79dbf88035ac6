//! Defines the read-only ingestion state, built once per process
//! from settings.

use crate::client;
use crate::conf::IngestSettings;
use crate::ingest::Ingestor;
use crate::store::DynamoTable;
use crate::trigger::ObjectTrigger;
use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use tracing::{info, instrument};

/// An App is an initialized ingestion state: validated settings and
/// the clients for the object and table services.
pub struct App {
    /// The original settings.
    pub settings: IngestSettings,

    /// The client used to read uploaded objects.
    pub objects: aws_sdk_s3::Client,

    /// The ingestor writing into the destination table.
    pub ingestor: Ingestor<DynamoTable>,
}

impl App {
    /// Initialize an App instance given a settings struct. Consumes
    /// the settings struct.
    pub async fn new(settings: IngestSettings) -> Result<Self> {
        settings.validate()?;
        let config = client::sdk_config(
            settings.storage_connection.as_deref(),
            Some((
                settings.storage_account_name.as_str(),
                settings.storage_account_key.as_str(),
            )),
        )
        .await;
        let objects = aws_sdk_s3::Client::new(&config);
        let table = DynamoTable::new(
            aws_sdk_dynamodb::Client::new(&config),
            settings.table_name.clone(),
        );
        Ok(App {
            settings,
            objects,
            ingestor: Ingestor::new(table),
        })
    }

    /// Handle an invocation trigger: fetch the object and ingest its
    /// rows.
    #[instrument(skip(self))]
    pub async fn handle(&self, trigger: &ObjectTrigger) -> Result<usize> {
        info!("Ingesting into table {:?}", self.ingestor.store().table_name());
        let contents = client::fetch_object(&self.objects, &trigger.bucket, &trigger.key).await?;
        self.ingestor.ingest(&contents).await
    }
}

/// Global App instance.
static CURRENT: OnceCell<App> = OnceCell::new();

/// Initialize the global App instance.
pub async fn init() -> Result<()> {
    let settings = IngestSettings::from_env()?;
    let app = App::new(settings).await?;
    CURRENT
        .set(app)
        .map_err(|_| anyhow!("app::CURRENT was already initialized"))
}

/// Get the current App instance, or panic if it hasn't been
/// initialized.
pub fn current() -> &'static App {
    CURRENT.get().expect("app is not initialized")
}
