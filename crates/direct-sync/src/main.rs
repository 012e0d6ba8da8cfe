use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use pipeline::adapters::{direct, DIRECT_ENTRY_POINT};
use pipeline::{BatchReport, PipelineContext};
use serde_json::Value;
use shared::{init_tracing, trace_lambda_handler, Config, LambdaErrorHandler};
use tracing::info;

/// 直接呼び出し（バックフィル・再送）用のエントリーポイント
///
/// 入力は `{"records": [...]}`。全件失敗時はエラーを返す。
async fn function_handler(
    event: LambdaEvent<Value>,
    context: &PipelineContext,
) -> Result<BatchReport, Error> {
    let (payload, lambda_context) = event.into_parts();

    trace_lambda_handler!(
        "direct-sync",
        payload,
        lambda_context,
        |payload: Value, lambda_context: lambda_runtime::Context| async move {
            let result = match direct::parse_value(payload) {
                Ok(records) => {
                    info!(records = records.len(), "Direct batch received");
                    context.run(DIRECT_ENTRY_POINT, records).await
                }
                Err(e) => Err(e),
            };

            result.map_err(|e| {
                LambdaErrorHandler::log_error(
                    &e,
                    Some(LambdaErrorHandler::error_context(
                        DIRECT_ENTRY_POINT,
                        &lambda_context.request_id,
                    )),
                );
                LambdaErrorHandler::to_lambda_error(&e)
            })
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
