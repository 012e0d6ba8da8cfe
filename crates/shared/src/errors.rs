use domain::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// パイプライン全体で使用されるエラー型
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    // レコード変換エラー
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    // 配信エラー
    #[error("Transient delivery failure: {0}")]
    TransientDelivery(String),

    #[error("Delivery rejected with status {status}: {body}")]
    ValidationDelivery { status: u16, body: String },

    #[error("Dead-letter write failed: {0}")]
    DeadLetter(String),

    // 設定・認証情報
    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // 入力
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // バッチ全体
    #[error("All {total} records in the batch failed")]
    BatchFailed { total: usize },
}

/// エラーの分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 入力側の問題（4xx相当）
    Client,
    /// サーバー側の問題（5xx相当）
    Server,
    /// 一時的なエラー（リトライ可能）
    Transient,
    /// 永続的なエラー（リトライ不可）
    Permanent,
}

/// エラーの重要度
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// エラーメタデータ
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    /// エラーコード
    pub code: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    /// リトライ可能フラグ
    pub retryable: bool,
}

impl ErrorMetadata {
    fn new(code: &str, category: ErrorCategory, severity: ErrorSeverity, retryable: bool) -> Self {
        Self {
            code: code.to_string(),
            category,
            severity,
            retryable,
        }
    }
}

impl SyncError {
    /// エラーメタデータを取得
    ///
    /// リトライ可能なのは一時的な配信失敗のみ。
    pub fn metadata(&self) -> ErrorMetadata {
        match self {
            SyncError::Domain(e) => ErrorMetadata::new(
                e.code(),
                ErrorCategory::Permanent,
                ErrorSeverity::Warning,
                false,
            ),
            SyncError::TransientDelivery(_) => ErrorMetadata::new(
                "TRANSIENT_DELIVERY",
                ErrorCategory::Transient,
                ErrorSeverity::Warning,
                true,
            ),
            SyncError::ValidationDelivery { .. } => ErrorMetadata::new(
                "VALIDATION_DELIVERY",
                ErrorCategory::Client,
                ErrorSeverity::Error,
                false,
            ),
            SyncError::DeadLetter(_) => ErrorMetadata::new(
                "DEAD_LETTER",
                ErrorCategory::Server,
                ErrorSeverity::Critical,
                false,
            ),
            SyncError::Credentials(_) => ErrorMetadata::new(
                "CREDENTIALS",
                ErrorCategory::Server,
                ErrorSeverity::Critical,
                false,
            ),
            SyncError::Configuration(_) => ErrorMetadata::new(
                "CONFIGURATION",
                ErrorCategory::Server,
                ErrorSeverity::Critical,
                false,
            ),
            SyncError::InvalidRequest(_) => ErrorMetadata::new(
                "INVALID_REQUEST",
                ErrorCategory::Client,
                ErrorSeverity::Info,
                false,
            ),
            SyncError::Serialization(_) => ErrorMetadata::new(
                "SERIALIZATION",
                ErrorCategory::Server,
                ErrorSeverity::Error,
                false,
            ),
            // バッチ全体の再送は上流のトランスポートに任せる
            SyncError::BatchFailed { .. } => ErrorMetadata::new(
                "BATCH_FAILED",
                ErrorCategory::Transient,
                ErrorSeverity::Error,
                false,
            ),
        }
    }

    /// HTTPステータスコードを取得
    pub fn http_status_code(&self) -> u16 {
        match self {
            SyncError::InvalidRequest(_) => 400,
            SyncError::Domain(_) => 422,
            SyncError::ValidationDelivery { .. } => 502,
            SyncError::TransientDelivery(_) => 503,
            _ => 500,
        }
    }

    /// 呼び出し元向けメッセージを取得
    pub fn user_message(&self) -> String {
        match self {
            SyncError::InvalidRequest(_) => "リクエストの形式が正しくありません".to_string(),
            SyncError::Domain(_) => "レコードを変換できませんでした".to_string(),
            SyncError::ValidationDelivery { .. } => "送信先がレコードを拒否しました".to_string(),
            SyncError::TransientDelivery(_) => "送信先が一時的に利用できません".to_string(),
            SyncError::BatchFailed { .. } => {
                "バッチ内のすべてのレコードが失敗しました。再送してください".to_string()
            }
            _ => "予期しないエラーが発生しました".to_string(),
        }
    }
}

/// 標準化されたエラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    /// 詳細情報（開発環境のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub request_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub context: HashMap<String, String>,
}

impl ErrorResponse {
    pub fn from_sync_error(error: &SyncError, request_id: String, include_details: bool) -> Self {
        Self {
            code: error.metadata().code,
            message: error.user_message(),
            details: include_details.then(|| error.to_string()),
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            context: HashMap::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(|e| SyncError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_delivery_is_retryable() {
        assert!(SyncError::TransientDelivery("503".to_string()).metadata().retryable);

        let non_retryable = [
            SyncError::ValidationDelivery {
                status: 400,
                body: "bad".to_string(),
            },
            SyncError::Domain(DomainError::MalformedRecord("x".to_string())),
            SyncError::Configuration("x".to_string()),
            SyncError::BatchFailed { total: 5 },
        ];
        for error in non_retryable {
            assert!(!error.metadata().retryable, "{error} should not be retryable");
        }
    }

    #[test]
    fn test_domain_error_codes_pass_through() {
        let error = SyncError::from(DomainError::MissingKey {
            table: "mmp_toledo_leads".to_string(),
            field: "lead_id".to_string(),
        });
        let metadata = error.metadata();
        assert_eq!(metadata.code, "MISSING_KEY");
        assert_eq!(metadata.category, ErrorCategory::Permanent);
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(SyncError::InvalidRequest("x".to_string()).http_status_code(), 400);
        assert_eq!(SyncError::BatchFailed { total: 1 }.http_status_code(), 500);
        assert_eq!(
            SyncError::TransientDelivery("x".to_string()).http_status_code(),
            503
        );
    }

    #[test]
    fn test_error_response_creation() {
        let error = SyncError::InvalidRequest("body is not JSON".to_string());
        let response = ErrorResponse::from_sync_error(&error, "req-123".to_string(), false);

        assert_eq!(response.code, "INVALID_REQUEST");
        assert_eq!(response.request_id, "req-123");
        assert!(response.details.is_none());
        assert!(response.to_json().unwrap().contains("INVALID_REQUEST"));
    }
}
