use chrono::{TimeZone, Utc};
use domain::{source_table_from_identifier, ChangeRecord, DomainError, EventKind, TypedItem};
use serde::{Deserialize, Serialize};
use tracing::error;

/// DynamoDB Streams のイベント
///
/// 属性値は型タグ付きのまま保持し、解釈は正規化で行う。
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StreamRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventID")]
    pub event_id: String,
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "eventSourceARN", default)]
    pub event_source_arn: String,
    pub dynamodb: StreamData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamData {
    #[serde(default)]
    pub keys: Option<TypedItem>,
    #[serde(default)]
    pub new_image: Option<TypedItem>,
    #[serde(default)]
    pub old_image: Option<TypedItem>,
    #[serde(default)]
    pub sequence_number: Option<String>,
    #[serde(default)]
    pub approximate_creation_date_time: Option<f64>,
}

/// バッチ処理の失敗アイテム
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

/// ストリームへの応答
///
/// 失敗レコードはデッドレター済みのため、部分成功時も空で返す。
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchItemFailures {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl StreamRecord {
    pub fn into_change_record(self) -> Result<ChangeRecord, DomainError> {
        let event_kind: EventKind = self.event_name.parse()?;

        let approximate_creation_time = self
            .dynamodb
            .approximate_creation_date_time
            .and_then(|secs| Utc.timestamp_opt(secs.trunc() as i64, 0).single());

        Ok(ChangeRecord {
            event_id: self.event_id,
            event_kind,
            source_table: source_table_from_identifier(&self.event_source_arn),
            sequence_token: self.dynamodb.sequence_number.unwrap_or_default(),
            new_state: self.dynamodb.new_image,
            old_state: self.dynamodb.old_image,
            keys: self.dynamodb.keys,
            approximate_creation_time,
        })
    }
}

/// ストリームイベントを変更レコードの列に変換
///
/// 未知のイベント種別は記録を残して除外する。
pub fn change_records(event: StreamEvent) -> Vec<ChangeRecord> {
    event
        .records
        .into_iter()
        .filter_map(|record| {
            let event_id = record.event_id.clone();
            match record.into_change_record() {
                Ok(change) => Some(change),
                Err(e) => {
                    error!(event_id = %event_id, error = %e, "Skipping unsupported stream record");
                    None
                }
            }
        })
        .collect()
}
