use serde::{Deserialize, Serialize};

/// 配信結果の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Delivered,
    /// 再試行すれば成功しうる失敗（試行途中の判定）
    FailedRetryable,
    /// これ以上再試行しない失敗（デッドレター行き）
    FailedTerminal,
}

/// 直近のエラー内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// 1レコード分の配信結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub status: DeliveryStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorDetail>,
}

impl DeliveryOutcome {
    pub fn delivered(attempts: u32) -> Self {
        Self {
            status: DeliveryStatus::Delivered,
            attempts,
            last_error: None,
        }
    }

    pub fn terminal(attempts: u32, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::FailedTerminal,
            attempts,
            last_error: Some(ErrorDetail {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }

    pub fn is_terminal(&self) -> bool {
        self.status == DeliveryStatus::FailedTerminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_serialization() {
        let outcome = DeliveryOutcome::terminal(3, "TRANSIENT_DELIVERY", "503 Service Unavailable");
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "status": "FAILED_TERMINAL",
                "attempts": 3,
                "lastError": { "code": "TRANSIENT_DELIVERY", "message": "503 Service Unavailable" }
            })
        );
        assert!(outcome.is_terminal());
        assert!(!outcome.is_delivered());
    }
}
