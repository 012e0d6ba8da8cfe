use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use domain::ChangeRecord;
use serde_json::json;
use shared::{ApiGatewayResponse, LambdaErrorHandler, SyncError};

use super::direct;
use crate::coordinator::BatchReport;

/// API Gateway リクエストのボディを変更レコードの列に変換
pub fn parse_request(request: &ApiGatewayProxyRequest) -> Result<Vec<ChangeRecord>, SyncError> {
    let body = request
        .body
        .as_deref()
        .filter(|body| !body.trim().is_empty())
        .ok_or_else(|| SyncError::InvalidRequest("Request body is required".to_string()))?;

    if request.is_base64_encoded {
        let decoded = STANDARD
            .decode(body.trim())
            .map_err(|e| SyncError::InvalidRequest(format!("Invalid base64 body: {}", e)))?;
        let text = String::from_utf8(decoded)
            .map_err(|e| SyncError::InvalidRequest(format!("Body is not UTF-8: {}", e)))?;
        return direct::parse_str(&text);
    }

    direct::parse_str(body)
}

pub fn request_id(request: &ApiGatewayProxyRequest) -> Option<String> {
    request.request_context.request_id.clone()
}

/// バッチ結果を HTTP レスポンスに変換
///
/// 全件成功 200、一部失敗 207、入力不正 400、全件失敗 500。
pub fn response_for(
    result: &Result<BatchReport, SyncError>,
    request_id: Option<String>,
    include_details: bool,
) -> ApiGatewayResponse {
    match result {
        Ok(report) => {
            let status = if report.failed > 0 { 207 } else { 200 };
            let body = json!({
                "success": report.failed == 0,
                "processed": report.total,
                "delivered": report.delivered,
                "failed": report.failed,
                "deadLettered": report.dead_lettered,
                "outcomes": report.outcomes,
            });
            ApiGatewayResponse::json(status, &body, request_id.as_deref().unwrap_or_default())
        }
        Err(error) => {
            LambdaErrorHandler::to_api_gateway_response(error, request_id, include_details)
        }
    }
}
