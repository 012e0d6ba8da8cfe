use thiserror::Error;

/// レコード単位の変換処理で発生するエラー
///
/// いずれもリトライしても結果が変わらないため、発生時点で終端失敗として扱う。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Missing unique key `{field}` for table {table}")]
    MissingKey { table: String, field: String },

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),
}

impl DomainError {
    /// エラーコード（ログ・デッドレターで使用）
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::MalformedRecord(_) => "MALFORMED_RECORD",
            DomainError::MissingKey { .. } => "MISSING_KEY",
            DomainError::UnknownEventKind(_) => "UNKNOWN_EVENT_KIND",
        }
    }
}
