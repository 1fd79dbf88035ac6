//! Defines a _trigger_, the input for a single ingestion. Triggers
//! are built from the records of an S3 event.

use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use tracing::{instrument, warn};

/// An object that was just created in the watched container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTrigger {
    pub bucket: String,
    pub key: String,
}

/// Object keys arrive form-encoded in S3 notifications.
fn decode_key(key: &str) -> Option<String> {
    urlencoding::decode(&key.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .ok()
}

impl ObjectTrigger {
    /// Builds the trigger for one event record, if the record
    /// announces a new object in `container`.
    fn from_record(record: &S3EventRecord, container: &str) -> Option<Self> {
        let event_name = record.event_name.as_deref().unwrap_or_default();
        if !event_name.starts_with("ObjectCreated") {
            warn!("Ignoring {:?} event", event_name);
            return None;
        }
        let Some(bucket) = record.s3.bucket.name.as_deref() else {
            warn!("Ignoring {:?} event without a bucket name", event_name);
            return None;
        };
        if bucket != container {
            warn!(
                "Ignoring event for bucket {:?}; expected {:?}",
                bucket, container
            );
            return None;
        }
        let Some(raw_key) = record.s3.object.key.as_deref() else {
            warn!("Ignoring {:?} event without an object key", event_name);
            return None;
        };
        let Some(key) = decode_key(raw_key) else {
            warn!("Ignoring object with undecodable key {:?}", raw_key);
            return None;
        };
        Some(ObjectTrigger {
            bucket: String::from(bucket),
            key,
        })
    }

    /// Builds a vector of triggers from the records inside an S3
    /// event, keeping the event's order.
    #[instrument(skip(event), fields(records = event.records.len()))]
    pub fn from_event(event: &S3Event, container: &str) -> Vec<Self> {
        event
            .records
            .iter()
            .filter_map(|record| Self::from_record(record, container))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(event_name: &str, bucket: &str, key: &str) -> serde_json::Value {
        json!({
            "eventVersion": "2.0",
            "eventSource": "aws:s3",
            "awsRegion": "us-east-1",
            "eventTime": "1970-01-01T00:00:00.000Z",
            "eventName": event_name,
            "userIdentity": { "principalId": "EXAMPLE" },
            "requestParameters": { "sourceIPAddress": "127.0.0.1" },
            "responseElements": {
                "x-amz-request-id": "EXAMPLE123456789",
                "x-amz-id-2": "EXAMPLE123/5678abcdefghijklambdaisawesome/mnopqrstuvwxyzABCDEFGH"
            },
            "s3": {
                "s3SchemaVersion": "1.0",
                "configurationId": "testConfigRule",
                "bucket": {
                    "name": bucket,
                    "ownerIdentity": { "principalId": "EXAMPLE" },
                    "arn": format!("arn:aws:s3:::{}", bucket)
                },
                "object": {
                    "key": key,
                    "size": 1024,
                    "eTag": "0123456789abcdef0123456789abcdef",
                    "sequencer": "0A1B2C3D4E5F678901"
                }
            }
        })
    }

    fn event(records: Vec<serde_json::Value>) -> S3Event {
        serde_json::from_value(json!({ "Records": records })).unwrap()
    }

    #[test]
    fn keeps_created_objects_in_the_container() {
        let event = event(vec![
            record("ObjectCreated:Put", "student-files", "grades.csv"),
            record("ObjectCreated:CompleteMultipartUpload", "student-files", "more.csv"),
        ]);
        assert_eq!(
            ObjectTrigger::from_event(&event, "student-files"),
            vec![
                ObjectTrigger {
                    bucket: String::from("student-files"),
                    key: String::from("grades.csv"),
                },
                ObjectTrigger {
                    bucket: String::from("student-files"),
                    key: String::from("more.csv"),
                },
            ]
        );
    }

    #[test]
    fn ignores_other_buckets_and_removals() {
        let event = event(vec![
            record("ObjectCreated:Put", "other-files", "grades.csv"),
            record("ObjectRemoved:Delete", "student-files", "grades.csv"),
        ]);
        assert!(ObjectTrigger::from_event(&event, "student-files").is_empty());
    }

    #[test]
    fn ignores_records_without_an_object_key() {
        let mut without_key = record("ObjectCreated:Put", "student-files", "grades.csv");
        without_key["s3"]["object"]
            .as_object_mut()
            .unwrap()
            .remove("key");
        let event = event(vec![without_key]);
        assert!(ObjectTrigger::from_event(&event, "student-files").is_empty());
    }

    #[test]
    fn decodes_object_keys() {
        let event = event(vec![record(
            "ObjectCreated:Put",
            "student-files",
            "term+1/grades%20%28final%29.csv",
        )]);
        let triggers = ObjectTrigger::from_event(&event, "student-files");
        assert_eq!(triggers[0].key, "term 1/grades (final).csv");
    }
}
