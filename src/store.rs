//! Defines the table store the grades are written to, and its
//! DynamoDB implementation.

use crate::record::GradeEntity;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::Client;
use core::time::Duration;
use std::collections::HashMap;
use tokio::time::sleep;
use tracing::{info, instrument};

/// Attribute holding the partition key.
pub const PARTITION_KEY_ATTRIBUTE: &str = "PartitionKey";

/// Attribute holding the row key.
pub const ROW_KEY_ATTRIBUTE: &str = "RowKey";

/// Time to wait between table status checks, in milliseconds.
const TABLE_POLL_INTERVAL: u64 = 500;

/// How many times the table status is checked before giving up on
/// it becoming active. Amounts to one minute.
const TABLE_POLL_ATTEMPTS: u32 = 120;

/// A destination for grade entities.
#[async_trait]
pub trait TableStore {
    /// Make sure the table exists and can take writes. A table that
    /// already exists is not an error.
    async fn ensure_table(&self) -> Result<()>;

    /// Insert a single entity. Existing entities are never
    /// overwritten.
    async fn insert(&self, entity: &GradeEntity) -> Result<()>;
}

/// Converts an entity into a DynamoDB item. Every field is stored as
/// a string.
pub fn to_item(entity: &GradeEntity) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            String::from(PARTITION_KEY_ATTRIBUTE),
            AttributeValue::S(entity.partition_key.clone()),
        ),
        (
            String::from(ROW_KEY_ATTRIBUTE),
            AttributeValue::S(entity.row_key.clone()),
        ),
        (String::from("Name"), AttributeValue::S(entity.name.clone())),
        (
            String::from("Subject"),
            AttributeValue::S(entity.subject.clone()),
        ),
        (String::from("Grade"), AttributeValue::S(entity.grade.clone())),
    ])
}

/// Whether a table creation failed only because the table is
/// already there.
fn is_already_exists<R>(error: &SdkError<CreateTableError, R>) -> bool {
    matches!(
        error,
        SdkError::ServiceError(se) if se.err().is_resource_in_use_exception()
    )
}

/// A DynamoDB table keyed by partition and row key.
pub struct DynamoTable {
    client: Client,
    table_name: String,
}

impl DynamoTable {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        DynamoTable {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Issue the table creation call. Returns whether the table was
    /// created by this call.
    async fn create_table(&self) -> Result<bool> {
        let result = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(PARTITION_KEY_ATTRIBUTE)
                    .key_type(KeyType::Hash)
                    .build(),
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ROW_KEY_ATTRIBUTE)
                    .key_type(KeyType::Range)
                    .build(),
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(PARTITION_KEY_ATTRIBUTE)
                    .attribute_type(ScalarAttributeType::S)
                    .build(),
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ROW_KEY_ATTRIBUTE)
                    .attribute_type(ScalarAttributeType::S)
                    .build(),
            )
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_already_exists(&e) => Ok(false),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to create table {:?}", self.table_name))),
        }
    }

    /// Poll the table description until it reports the table as
    /// active.
    async fn wait_until_active(&self) -> Result<()> {
        for _ in 0..TABLE_POLL_ATTEMPTS {
            let response = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .with_context(|| format!("Failed to describe table {:?}", self.table_name))?;
            if response.table().and_then(|t| t.table_status()) == Some(&TableStatus::Active) {
                return Ok(());
            }
            sleep(Duration::from_millis(TABLE_POLL_INTERVAL)).await;
        }
        Err(anyhow!(
            "Table {:?} did not become active after {} status checks",
            self.table_name,
            TABLE_POLL_ATTEMPTS
        ))
    }
}

#[async_trait]
impl TableStore for DynamoTable {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn ensure_table(&self) -> Result<()> {
        if self.create_table().await? {
            info!("Created table");
        } else {
            info!("Table already exists");
        }
        self.wait_until_active().await
    }

    async fn insert(&self, entity: &GradeEntity) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_item(entity)))
            .condition_expression(format!("attribute_not_exists({})", ROW_KEY_ATTRIBUTE))
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to insert entity {:?} into table {:?}",
                    entity.row_key, self.table_name
                )
            })?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CsvRecord;
    use aws_sdk_dynamodb::types::error::{LimitExceededException, ResourceInUseException};

    #[test]
    fn existing_table_counts_as_created() {
        let error = SdkError::service_error(
            CreateTableError::ResourceInUseException(
                ResourceInUseException::builder()
                    .message("Table already exists: StudentGrades")
                    .build(),
            ),
            (),
        );
        assert!(is_already_exists(&error));
    }

    #[test]
    fn other_creation_failures_are_errors() {
        let error = SdkError::service_error(
            CreateTableError::LimitExceededException(
                LimitExceededException::builder()
                    .message("Too many tables")
                    .build(),
            ),
            (),
        );
        assert!(!is_already_exists(&error));
    }

    #[test]
    fn items_hold_keys_and_fields_as_strings() {
        let entity = GradeEntity::new(&CsvRecord {
            name: String::from("Lin"),
            subject: String::from("Science"),
            grade: String::from("88"),
        });
        let item = to_item(&entity);
        assert_eq!(item.len(), 5);
        assert_eq!(
            item.get("PartitionKey"),
            Some(&AttributeValue::S(String::from("Grades")))
        );
        assert_eq!(
            item.get("RowKey"),
            Some(&AttributeValue::S(entity.row_key.clone()))
        );
        assert_eq!(item.get("Name"), Some(&AttributeValue::S(String::from("Lin"))));
        assert_eq!(
            item.get("Subject"),
            Some(&AttributeValue::S(String::from("Science")))
        );
        assert_eq!(item.get("Grade"), Some(&AttributeValue::S(String::from("88"))));
    }
}
