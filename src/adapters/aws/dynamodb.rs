use crate::domain::video::{TransitionError, VideoRecord, VideoStatus};
use crate::ports::repository::{RepositoryError, VideoRepository};
use async_trait::async_trait;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

type Item = HashMap<String, AttributeValue>;

/// DynamoRepository implements VideoRepository for AWS DynamoDB.
///
/// Table key is `video_id`; `owner_index` is a global secondary index with
/// partition key `owner_id` and sort key `created_at`.
#[derive(Clone)]
pub struct DynamoRepository {
    client: Client,
    table_name: String,
    owner_index: String,
}

impl DynamoRepository {
    pub fn new(client: Client, table_name: String, owner_index: String) -> Self {
        Self {
            client,
            table_name,
            owner_index,
        }
    }
}

fn backend<E: std::fmt::Display>(err: E) -> RepositoryError {
    RepositoryError::Backend(err.to_string())
}

fn to_item(record: &VideoRecord) -> Item {
    HashMap::from([
        ("video_id".to_string(), AttributeValue::S(record.id.clone())),
        (
            "owner_id".to_string(),
            AttributeValue::S(record.owner_id.clone()),
        ),
        (
            "status".to_string(),
            AttributeValue::S(record.status.as_str().to_string()),
        ),
        (
            "created_at".to_string(),
            AttributeValue::S(record.created_at.to_rfc3339()),
        ),
        (
            "updated_at".to_string(),
            AttributeValue::S(record.updated_at.to_rfc3339()),
        ),
    ])
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Result<&'a String, RepositoryError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| RepositoryError::Backend(format!("item is missing `{}`", name)))
}

fn time_attr(item: &Item, name: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(string_attr(item, name)?)
        .map(|t| t.with_timezone(&Utc))
        .map_err(backend)
}

fn from_item(item: &Item) -> Result<VideoRecord, RepositoryError> {
    Ok(VideoRecord {
        id: string_attr(item, "video_id")?.clone(),
        owner_id: string_attr(item, "owner_id")?.clone(),
        status: string_attr(item, "status")?
            .parse()
            .map_err(RepositoryError::Backend)?,
        created_at: time_attr(item, "created_at")?,
        updated_at: time_attr(item, "updated_at")?,
    })
}

#[async_trait]
impl VideoRepository for DynamoRepository {
    async fn save(&self, record: &VideoRecord) -> Result<(), RepositoryError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_item(record)))
            .condition_expression("attribute_not_exists(video_id)")
            .send()
            .await
            .map_err(|e| {
                let e = e.into_service_error();
                if e.is_conditional_check_failed_exception() {
                    RepositoryError::AlreadyExists(record.id.clone())
                } else {
                    backend(e)
                }
            })?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<VideoRecord>, RepositoryError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("video_id", AttributeValue::S(id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(backend)?;

        resp.item.as_ref().map(from_item).transpose()
    }

    async fn find_by_owner_id(&self, owner_id: &str) -> Result<Vec<VideoRecord>, RepositoryError> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let resp = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(&self.owner_index)
                .key_condition_expression("owner_id = :owner")
                .expression_attribute_values(":owner", AttributeValue::S(owner_id.to_string()))
                .scan_index_forward(true)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(backend)?;

            for item in resp.items() {
                records.push(from_item(item)?);
            }
            match resp.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        Ok(records)
    }

    async fn find_by_status(
        &self,
        status: VideoStatus,
    ) -> Result<Vec<VideoRecord>, RepositoryError> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let resp = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("#status = :status")
                .expression_attribute_names("#status", "status")
                .expression_attribute_values(
                    ":status",
                    AttributeValue::S(status.as_str().to_string()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(backend)?;

            for item in resp.items() {
                records.push(from_item(item)?);
            }
            match resp.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn update_status(
        &self,
        id: &str,
        status: VideoStatus,
    ) -> Result<VideoRecord, RepositoryError> {
        // Only `processing` may move; the condition makes that atomic.
        if !VideoStatus::Processing.can_transition_to(status) {
            return Err(TransitionError {
                from: VideoStatus::Processing,
                to: status,
            }
            .into());
        }
        let now = Utc::now();

        let resp = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("video_id", AttributeValue::S(id.to_string()))
            .update_expression("SET #status = :next, updated_at = :now")
            .condition_expression("attribute_exists(video_id) AND #status = :processing")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":next", AttributeValue::S(status.as_str().to_string()))
            .expression_attribute_values(
                ":processing",
                AttributeValue::S(VideoStatus::Processing.as_str().to_string()),
            )
            .expression_attribute_values(":now", AttributeValue::S(now.to_rfc3339()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match resp {
            Ok(output) => {
                let item = output.attributes.ok_or_else(|| {
                    RepositoryError::Backend("update returned no attributes".to_string())
                })?;
                from_item(&item)
            }
            Err(e) => match e.into_service_error() {
                UpdateItemError::ConditionalCheckFailedException(_) => {
                    match self.find_by_id(id).await? {
                        Some(current) => Err(TransitionError {
                            from: current.status,
                            to: status,
                        }
                        .into()),
                        None => Err(RepositoryError::NotFound(id.to_string())),
                    }
                }
                other => Err(backend(other)),
            },
        }
    }
}
