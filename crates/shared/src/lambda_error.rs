use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{ErrorResponse, ErrorSeverity, SyncError};

/// API Gateway プロキシ統合のレスポンス
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl ApiGatewayResponse {
    /// JSON ボディのレスポンスを作成
    pub fn json<T: Serialize>(status_code: u16, body: &T, request_id: &str) -> Self {
        let body = serde_json::to_string(body).unwrap_or_else(|_| {
            r#"{"code":"SERIALIZATION","message":"レスポンスの生成に失敗しました"}"#.to_string()
        });

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("X-Request-ID".to_string(), request_id.to_string());

        Self {
            status_code,
            headers,
            body,
            is_base64_encoded: false,
        }
    }
}

/// Lambda関数用のエラーハンドリングユーティリティ
pub struct LambdaErrorHandler;

impl LambdaErrorHandler {
    /// SyncErrorをAPI Gateway用のレスポンスに変換
    pub fn to_api_gateway_response(
        error: &SyncError,
        request_id: Option<String>,
        include_details: bool,
    ) -> ApiGatewayResponse {
        let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let error_response =
            ErrorResponse::from_sync_error(error, request_id.clone(), include_details);

        ApiGatewayResponse::json(error.http_status_code(), &error_response, &request_id)
    }

    /// ストリーム・直接呼び出し用に Lambda エラーへ変換
    ///
    /// 呼び出しを失敗させることで上流にバッチ全体を再送させる。
    pub fn to_lambda_error(error: &SyncError) -> lambda_runtime::Error {
        let error_response = ErrorResponse::from_sync_error(error, Uuid::new_v4().to_string(), true);

        lambda_runtime::Error::from(
            error_response
                .to_json()
                .unwrap_or_else(|_| error.to_string()),
        )
    }

    /// ログに添えるエラー文脈
    pub fn error_context(entry_point: &str, request_id: &str) -> HashMap<String, String> {
        HashMap::from([
            ("entry_point".to_string(), entry_point.to_string()),
            ("request_id".to_string(), request_id.to_string()),
        ])
    }

    /// エラーをログに記録
    pub fn log_error(error: &SyncError, context: Option<HashMap<String, String>>) {
        let metadata = error.metadata();

        match metadata.severity {
            ErrorSeverity::Critical => {
                tracing::error!(
                    error = %error,
                    code = %metadata.code,
                    category = ?metadata.category,
                    retryable = metadata.retryable,
                    context = ?context,
                    "Critical error occurred"
                );
            }
            ErrorSeverity::Error => {
                tracing::error!(
                    error = %error,
                    code = %metadata.code,
                    category = ?metadata.category,
                    retryable = metadata.retryable,
                    context = ?context,
                    "Error occurred"
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error = %error,
                    code = %metadata.code,
                    category = ?metadata.category,
                    retryable = metadata.retryable,
                    context = ?context,
                    "Warning occurred"
                );
            }
            ErrorSeverity::Info => {
                tracing::info!(
                    error = %error,
                    code = %metadata.code,
                    category = ?metadata.category,
                    retryable = metadata.retryable,
                    context = ?context,
                    "Info level error occurred"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_gateway_response_creation() {
        let error = SyncError::InvalidRequest("body is not JSON".to_string());
        let response = LambdaErrorHandler::to_api_gateway_response(
            &error,
            Some("test-request-id".to_string()),
            false,
        );

        assert_eq!(response.status_code, 400);
        assert!(response.body.contains("INVALID_REQUEST"));
        assert!(!response.body.contains("body is not JSON"));
        assert_eq!(
            response.headers.get("X-Request-ID"),
            Some(&"test-request-id".to_string())
        );
    }

    #[test]
    fn test_batch_failed_response_is_500() {
        let error = SyncError::BatchFailed { total: 5 };
        let response = LambdaErrorHandler::to_api_gateway_response(&error, None, true);

        assert_eq!(response.status_code, 500);
        assert!(response.body.contains("BATCH_FAILED"));
    }

    #[test]
    fn test_lambda_error_carries_code() {
        let error = SyncError::BatchFailed { total: 3 };
        let lambda_error = LambdaErrorHandler::to_lambda_error(&error);

        assert!(lambda_error.to_string().contains("BATCH_FAILED"));
    }

    #[test]
    fn test_error_context_names_entry_point_and_request() {
        let context = LambdaErrorHandler::error_context("stream", "req-1");

        assert_eq!(context.get("entry_point"), Some(&"stream".to_string()));
        assert_eq!(context.get("request_id"), Some(&"req-1".to_string()));
        LambdaErrorHandler::log_error(&SyncError::BatchFailed { total: 2 }, Some(context));
    }

    #[test]
    fn test_response_serializes_in_proxy_shape() {
        let response = ApiGatewayResponse::json(207, &serde_json::json!({"ok": false}), "r-1");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["statusCode"], 207);
        assert_eq!(value["isBase64Encoded"], false);
        assert_eq!(value["body"], r#"{"ok":false}"#);
    }
}
