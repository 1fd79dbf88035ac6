//! Defines the rows read from uploaded files and the entities written
//! to the table.

use serde::Deserialize;
use uuid::Uuid;

/// The partition shared by every grade entity.
pub const PARTITION_KEY: &str = "Grades";

/// A single data row of an uploaded CSV file. Cells are kept as text,
/// grades included.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CsvRecord {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Subject")]
    pub subject: String,

    #[serde(rename = "Grade")]
    pub grade: String,
}

/// A persisted grade. Entities are only ever created, never updated
/// or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeEntity {
    pub partition_key: String,

    /// Unique per entity and unrelated to the row contents.
    pub row_key: String,

    pub name: String,
    pub subject: String,
    pub grade: String,
}

impl GradeEntity {
    /// Builds a new entity from a record, under a freshly generated
    /// row key.
    pub fn new(record: &CsvRecord) -> Self {
        GradeEntity {
            partition_key: String::from(PARTITION_KEY),
            row_key: Uuid::new_v4().to_string(),
            name: record.name.clone(),
            subject: record.subject.clone(),
            grade: record.grade.clone(),
        }
    }
}
