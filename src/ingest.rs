//! The CSV ingestor: turns an uploaded file into one grade entity per
//! row.
//!
//! An invocation is all-or-nothing up to the first insert. A malformed
//! file is rejected before the table is touched, but an insert failure
//! leaves the rows inserted before it in place. Redelivering the same
//! file inserts those rows again under new row keys, so ingestion is
//! at-least-once per row.

use crate::parse;
use crate::record::GradeEntity;
use crate::store::TableStore;
use anyhow::{Context, Result};
use tracing::{info, instrument};

/// Writes the rows of uploaded files into a table store.
pub struct Ingestor<S> {
    store: S,
}

impl<S: TableStore> Ingestor<S> {
    pub fn new(store: S) -> Self {
        Ingestor { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingest the contents of a single uploaded object. Rows are
    /// inserted one at a time, in file order, and the first failure
    /// aborts the rest. Returns the number of inserted entities.
    #[instrument(skip_all, fields(bytes = contents.len()))]
    pub async fn ingest(&self, contents: &[u8]) -> Result<usize> {
        info!("Processing CSV upload...");
        let records = parse::parse_object(contents).context("Failed to parse uploaded CSV")?;

        self.store
            .ensure_table()
            .await
            .context("Failed to prepare the destination table")?;

        for (index, record) in records.iter().enumerate() {
            let entity = GradeEntity::new(record);
            self.store
                .insert(&entity)
                .await
                .with_context(|| format!("Failed to insert data row {}", index + 1))?;
        }

        info!("Inserted {} records.", records.len());
        Ok(records.len())
    }
}
