//! Defines configuration as read from the environment.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;

/// Valid table names, following the table service's naming rules.
static TABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,255}$").expect("valid table name regex"));

/// Valid container (bucket) names.
static CONTAINER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$").expect("valid bucket regex"));

/// Valid queue names.
static QUEUE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]{1,80}$").expect("valid queue name regex"));

/// Default `table_name` value.
fn default_table_name() -> String {
    String::from("StudentGrades")
}

/// Default `container_name` value.
fn default_container_name() -> String {
    String::from("student-files")
}

/// Default `queue_name` value.
fn default_queue_name() -> String {
    String::from("taskqueue")
}

/// The CSV ingestor reads uploaded objects from a container and
/// writes one entity per row into a table. The configuration must be
/// given as environment variables.
#[derive(Deserialize)]
pub struct IngestSettings {
    /// The storage account identity, used as the access key id for
    /// the storage services.
    pub storage_account_name: String,

    /// The storage account credential, used as the secret access key.
    pub storage_account_key: String,

    /// The destination table. Created on demand.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// The container (bucket) whose new objects trigger an ingestion.
    /// Events for any other container are ignored.
    #[serde(default = "default_container_name")]
    pub container_name: String,

    /// Overrides the storage endpoint, e.g. to point at a local
    /// emulator. A bare host gets `https://` prepended.
    #[serde(default)]
    pub storage_connection: Option<String>,
}

impl IngestSettings {
    /// Read the settings from the process environment and validate
    /// them.
    pub fn from_env() -> Result<Self> {
        let settings: Self = envy::from_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every field eagerly, so that a misconfigured handler
    /// fails at startup instead of on its first event.
    pub fn validate(&self) -> Result<()> {
        if self.storage_account_name.trim().is_empty() {
            return Err(anyhow!("STORAGE_ACCOUNT_NAME must not be blank"));
        }
        if self.storage_account_key.trim().is_empty() {
            return Err(anyhow!("STORAGE_ACCOUNT_KEY must not be blank"));
        }
        if !TABLE_NAME_RE.is_match(&self.table_name) {
            return Err(anyhow!("TABLE_NAME {:?} is not a valid table name", self.table_name));
        }
        if !CONTAINER_NAME_RE.is_match(&self.container_name) {
            return Err(anyhow!(
                "CONTAINER_NAME {:?} is not a valid container name",
                self.container_name
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for IngestSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestSettings")
            .field("storage_account_name", &self.storage_account_name)
            .field("storage_account_key", &"<redacted>")
            .field("table_name", &self.table_name)
            .field("container_name", &self.container_name)
            .field("storage_connection", &self.storage_connection)
            .finish()
    }
}

/// The task logger only needs to know which queue it serves. The
/// account fields are used by the standalone consumer, which talks to
/// the queue service itself.
#[derive(Deserialize)]
pub struct TaskSettings {
    /// The queue whose messages are logged.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    #[serde(default)]
    pub storage_connection: Option<String>,

    #[serde(default)]
    pub storage_account_name: Option<String>,

    #[serde(default)]
    pub storage_account_key: Option<String>,
}

impl TaskSettings {
    /// Read the settings from the process environment and validate
    /// them.
    pub fn from_env() -> Result<Self> {
        let settings: Self = envy::from_env()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !QUEUE_NAME_RE.is_match(&self.queue_name) {
            return Err(anyhow!("QUEUE_NAME {:?} is not a valid queue name", self.queue_name));
        }
        Ok(())
    }

    /// The static account credentials, if both halves are given.
    pub fn account(&self) -> Option<(&str, &str)> {
        match (&self.storage_account_name, &self.storage_account_key) {
            (Some(name), Some(key)) => Some((name.as_str(), key.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for TaskSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSettings")
            .field("queue_name", &self.queue_name)
            .field("storage_connection", &self.storage_connection)
            .field("storage_account_name", &self.storage_account_name)
            .field(
                "storage_account_key",
                &self.storage_account_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest_vars(pairs: &[(&str, &str)]) -> Result<IngestSettings> {
        let settings: IngestSettings = envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (String::from(*k), String::from(*v))),
        )?;
        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn ingest_settings_apply_defaults() {
        let settings = ingest_vars(&[
            ("STORAGE_ACCOUNT_NAME", "school"),
            ("STORAGE_ACCOUNT_KEY", "secret"),
        ])
        .unwrap();
        assert_eq!(settings.table_name, "StudentGrades");
        assert_eq!(settings.container_name, "student-files");
        assert!(settings.storage_connection.is_none());
    }

    #[test]
    fn ingest_settings_require_account_name_and_key() {
        assert!(ingest_vars(&[("STORAGE_ACCOUNT_KEY", "secret")]).is_err());
        assert!(ingest_vars(&[("STORAGE_ACCOUNT_NAME", "school")]).is_err());
        assert!(ingest_vars(&[
            ("STORAGE_ACCOUNT_NAME", "  "),
            ("STORAGE_ACCOUNT_KEY", "secret"),
        ])
        .is_err());
    }

    #[test]
    fn ingest_settings_reject_invalid_table_name() {
        let result = ingest_vars(&[
            ("STORAGE_ACCOUNT_NAME", "school"),
            ("STORAGE_ACCOUNT_KEY", "secret"),
            ("TABLE_NAME", "no spaces allowed"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn ingest_settings_reject_invalid_container_name() {
        let result = ingest_vars(&[
            ("STORAGE_ACCOUNT_NAME", "school"),
            ("STORAGE_ACCOUNT_KEY", "secret"),
            ("CONTAINER_NAME", "Student_Files"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn ingest_settings_debug_hides_the_key() {
        let settings = ingest_vars(&[
            ("STORAGE_ACCOUNT_NAME", "school"),
            ("STORAGE_ACCOUNT_KEY", "hunter2"),
        ])
        .unwrap();
        let printed = format!("{:?}", settings);
        assert!(printed.contains("school"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn task_settings_default_to_taskqueue() {
        let settings: TaskSettings = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        settings.validate().unwrap();
        assert_eq!(settings.queue_name, "taskqueue");
        assert!(settings.account().is_none());
    }

    #[test]
    fn task_settings_need_both_account_halves() {
        let settings: TaskSettings = envy::from_iter(vec![(
            String::from("STORAGE_ACCOUNT_NAME"),
            String::from("school"),
        )])
        .unwrap();
        assert!(settings.account().is_none());
    }

    #[test]
    fn task_settings_reject_invalid_queue_name() {
        let settings: TaskSettings = envy::from_iter(vec![(
            String::from("QUEUE_NAME"),
            String::from("task queue"),
        )])
        .unwrap();
        assert!(settings.validate().is_err());
    }
}
