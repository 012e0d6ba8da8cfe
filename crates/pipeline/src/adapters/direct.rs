use domain::{source_table_from_identifier, ChangeRecord};
use serde::Deserialize;
use serde_json::Value;
use shared::SyncError;

/// 直接呼び出し・Webhook 経由で受け取るバッチ
#[derive(Debug, Clone, Deserialize)]
pub struct DirectRequest {
    #[serde(default)]
    pub records: Vec<ChangeRecord>,
}

impl DirectRequest {
    /// ソースが ARN で渡された場合はテーブル名に揃える
    pub fn into_change_records(self) -> Vec<ChangeRecord> {
        self.records
            .into_iter()
            .map(|mut record| {
                record.source_table = source_table_from_identifier(&record.source_table);
                record
            })
            .collect()
    }
}

pub fn parse_value(value: Value) -> Result<Vec<ChangeRecord>, SyncError> {
    let request: DirectRequest = serde_json::from_value(value)
        .map_err(|e| SyncError::InvalidRequest(format!("Invalid direct payload: {}", e)))?;
    Ok(request.into_change_records())
}

pub fn parse_str(body: &str) -> Result<Vec<ChangeRecord>, SyncError> {
    let request: DirectRequest = serde_json::from_str(body)
        .map_err(|e| SyncError::InvalidRequest(format!("Invalid direct payload: {}", e)))?;
    Ok(request.into_change_records())
}
