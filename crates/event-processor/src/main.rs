use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use pipeline::adapters::stream::{change_records, BatchItemFailures, StreamEvent};
use pipeline::adapters::STREAM_ENTRY_POINT;
use pipeline::PipelineContext;
use shared::{init_tracing, trace_lambda_handler, Config, LambdaErrorHandler};
use tracing::info;

/// DynamoDB Streams から呼び出されるエントリーポイント
///
/// 全件失敗時はエラーを返し、ストリームにバッチ全体を再送させる。
async fn function_handler(
    event: LambdaEvent<StreamEvent>,
    context: &PipelineContext,
) -> Result<BatchItemFailures, Error> {
    let (payload, lambda_context) = event.into_parts();

    trace_lambda_handler!(
        "event-processor",
        payload,
        lambda_context,
        |payload: StreamEvent, lambda_context: lambda_runtime::Context| async move {
            info!(records = payload.records.len(), "Stream batch received");

            let records = change_records(payload);
            match context.run(STREAM_ENTRY_POINT, records).await {
                Ok(_) => Ok(BatchItemFailures::default()),
                Err(e) => {
                    LambdaErrorHandler::log_error(
                        &e,
                        Some(LambdaErrorHandler::error_context(
                            STREAM_ENTRY_POINT,
                            &lambda_context.request_id,
                        )),
                    );
                    Err(LambdaErrorHandler::to_lambda_error(&e))
                }
            }
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
