use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_sqs::Client as SqsClient;
use chrono::{DateTime, Duration, Utc};
use domain::ChangeRecord;
use serde::{Deserialize, Serialize};
use shared::SyncError;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::dynamodb::DynamoDbClient;

/// 失敗した処理段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Normalize,
    Transform,
    Deliver,
}

/// デッドレターに添える失敗情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub stage: FailureStage,
    pub code: String,
    pub message: String,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

/// 元の変更レコードと失敗情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterMessage {
    #[serde(flatten)]
    pub record: ChangeRecord,
    #[serde(rename = "errorDetails")]
    pub error_details: Vec<FailureDetail>,
}

impl DeadLetterMessage {
    pub fn new(record: ChangeRecord, detail: FailureDetail) -> Self {
        Self {
            record,
            error_details: vec![detail],
        }
    }

    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(|e| SyncError::Serialization(e.to_string()))
    }
}

/// デッドレター出力先
///
/// 同じ `event_id` を複数回送っても1件として扱われること。
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, message: &DeadLetterMessage) -> Result<(), SyncError>;
}

/// SQS キューへのデッドレター
pub struct SqsDeadLetterQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsDeadLetterQueue {
    pub fn new(client: SqsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

}

/// FIFO キューに付ける重複排除 ID とグループ ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoParams<'a> {
    pub deduplication_id: &'a str,
    pub group_id: &'a str,
}

/// FIFO キューなら event_id で重複排除し、ソーステーブル単位でまとめる
///
/// 標準キューでは None（少なくとも1回の配信）。
pub fn fifo_params<'a>(queue_url: &str, message: &'a DeadLetterMessage) -> Option<FifoParams<'a>> {
    queue_url.ends_with(".fifo").then(|| FifoParams {
        deduplication_id: &message.record.event_id,
        group_id: &message.record.source_table,
    })
}

#[async_trait]
impl DeadLetterSink for SqsDeadLetterQueue {
    async fn send(&self, message: &DeadLetterMessage) -> Result<(), SyncError> {
        let body = message.to_json()?;

        let mut request = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body);

        if let Some(fifo) = fifo_params(&self.queue_url, message) {
            request = request
                .message_deduplication_id(fifo.deduplication_id)
                .message_group_id(fifo.group_id);
        }

        request.send().await.map_err(|e| {
            SyncError::DeadLetter(format!("Failed to send to dead-letter queue: {}", e))
        })?;

        info!(
            event_id = %message.record.event_id,
            source_table = %message.record.source_table,
            queue_url = %self.queue_url,
            "Record sent to dead-letter queue"
        );
        Ok(())
    }
}

/// DynamoDB テーブルへのデッドレター（event_id をキーに上書き）
pub struct DynamoDbDeadLetterStore {
    db: DynamoDbClient,
    retention: Duration,
}

impl DynamoDbDeadLetterStore {
    pub fn new(db: DynamoDbClient) -> Self {
        Self {
            db,
            retention: Duration::days(14),
        }
    }

    /// 保存する項目を組み立てる
    pub fn to_item(
        &self,
        message: &DeadLetterMessage,
    ) -> Result<HashMap<String, AttributeValue>, SyncError> {
        let record = &message.record;
        let mut item = HashMap::new();
        item.insert(
            "event_id".to_string(),
            AttributeValue::S(record.event_id.clone()),
        );
        item.insert(
            "source_table".to_string(),
            AttributeValue::S(record.source_table.clone()),
        );
        item.insert(
            "event_kind".to_string(),
            AttributeValue::S(record.event_kind.as_wire().to_string()),
        );
        item.insert(
            "sequence_token".to_string(),
            AttributeValue::S(record.sequence_token.clone()),
        );
        item.insert("message".to_string(), AttributeValue::S(message.to_json()?));

        if let Some(last) = message.error_details.last() {
            item.insert("error_code".to_string(), AttributeValue::S(last.code.clone()));
            item.insert(
                "attempts".to_string(),
                AttributeValue::N(last.attempts.to_string()),
            );
            item.insert(
                "failed_at".to_string(),
                AttributeValue::S(last.timestamp.to_rfc3339()),
            );
        }

        let ttl = (Utc::now() + self.retention).timestamp();
        item.insert("ttl".to_string(), AttributeValue::N(ttl.to_string()));

        Ok(item)
    }
}

#[async_trait]
impl DeadLetterSink for DynamoDbDeadLetterStore {
    async fn send(&self, message: &DeadLetterMessage) -> Result<(), SyncError> {
        let item = self.to_item(message)?;

        self.db
            .client()
            .put_item()
            .table_name(self.db.table_name())
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| {
                SyncError::DeadLetter(format!("Failed to store dead-letter item: {}", e))
            })?;

        info!(
            event_id = %message.record.event_id,
            source_table = %message.record.source_table,
            table = %self.db.table_name(),
            "Record stored in dead-letter table"
        );
        Ok(())
    }
}

/// 出力先未設定時のログ出力のみのデッドレター
#[derive(Debug, Default)]
pub struct LoggingDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LoggingDeadLetterSink {
    async fn send(&self, message: &DeadLetterMessage) -> Result<(), SyncError> {
        let body = message.to_json()?;
        error!(
            event_id = %message.record.event_id,
            source_table = %message.record.source_table,
            dead_letter = %body,
            "Dead-letter record (no destination configured)"
        );
        Ok(())
    }
}

/// 設定に応じたデッドレター出力先を生成
pub fn build_dead_letter_sink(
    target: &shared::DeadLetterTarget,
    aws_config: &aws_config::SdkConfig,
) -> Box<dyn DeadLetterSink> {
    match target {
        shared::DeadLetterTarget::Queue(url) => {
            Box::new(SqsDeadLetterQueue::new(SqsClient::new(aws_config), url.clone()))
        }
        shared::DeadLetterTarget::Table(table) => Box::new(DynamoDbDeadLetterStore::new(
            DynamoDbClient::new(aws_config, table.clone()),
        )),
        shared::DeadLetterTarget::LogOnly => {
            warn!("No dead-letter destination configured, failed records are only logged");
            Box::new(LoggingDeadLetterSink)
        }
    }
}
