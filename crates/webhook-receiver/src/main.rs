use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use pipeline::adapters::gateway::{parse_request, request_id, response_for};
use pipeline::adapters::GATEWAY_ENTRY_POINT;
use pipeline::PipelineContext;
use shared::{init_tracing, trace_lambda_handler, ApiGatewayResponse, Config, LambdaErrorHandler};
use tracing::info;

/// API Gateway 経由で変更レコードを受け取るエントリーポイント
async fn function_handler(
    event: LambdaEvent<ApiGatewayProxyRequest>,
    context: &PipelineContext,
) -> Result<ApiGatewayResponse, Error> {
    let (payload, lambda_context) = event.into_parts();

    trace_lambda_handler!(
        "webhook-receiver",
        payload,
        lambda_context,
        |payload: ApiGatewayProxyRequest, lambda_context: lambda_runtime::Context| async move {
            let request_id = request_id(&payload).unwrap_or_else(|| lambda_context.request_id.clone());

            let result = match parse_request(&payload) {
                Ok(records) => {
                    info!(records = records.len(), "Webhook batch received");
                    context.run(GATEWAY_ENTRY_POINT, records).await
                }
                Err(e) => Err(e),
            };

            if let Err(e) = &result {
                LambdaErrorHandler::log_error(
                    e,
                    Some(LambdaErrorHandler::error_context(GATEWAY_ENTRY_POINT, &request_id)),
                );
            }

            Ok::<_, Error>(response_for(
                &result,
                Some(request_id),
                !context.config.is_production(),
            ))
        }
    )
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("設定エラー: {e}"))?;

    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("トレーシング初期化エラー: {e}");
    }

    let context = PipelineContext::from_config(config).await?;
    let context = &context;

    run(service_fn(move |event| async move {
        function_handler(event, context).await
    }))
    .await
}
