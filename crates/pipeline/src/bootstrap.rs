use domain::ChangeRecord;
use infrastructure::{
    build_dead_letter_sink, load_aws_config, CachedToken, TokenProvider, WebhookClient,
    WebhookSettings,
};
use shared::{send_metrics, Config, MetricsClient, SyncError, SyncMetrics};
use std::sync::Arc;
use tracing::info;

use crate::coordinator::{BatchCoordinator, BatchReport};

/// 1つの Lambda 実行環境で使い回すクライアント一式
pub struct PipelineContext {
    pub config: Config,
    pub coordinator: BatchCoordinator,
    pub metrics: MetricsClient,
}

impl PipelineContext {
    /// 設定から各クライアントを一度だけ生成する
    pub async fn from_config(config: Config) -> Result<Self, SyncError> {
        let aws_config = load_aws_config(&config).await;

        let token = Arc::new(CachedToken::new(
            TokenProvider::from_auth(&config.webhook_auth, &aws_config),
            config.credential_cache_ttl,
        ));
        let sender = WebhookClient::new(WebhookSettings::from_config(&config), token)?;
        let dead_letter = build_dead_letter_sink(&config.dead_letter, &aws_config);

        let coordinator = BatchCoordinator::new(Box::new(sender), dead_letter)
            .with_batch_size(config.batch_size);

        let metrics = MetricsClient::new(
            aws_sdk_cloudwatch::Client::new(&aws_config),
            config.metrics_namespace.clone(),
            config.environment.clone(),
        );

        info!(
            pipeline = %config.pipeline_name,
            environment = %config.environment,
            dead_letter = ?config.dead_letter,
            max_retries = config.max_retries,
            batch_size = config.batch_size,
            batching_window_secs = config.batching_window.as_secs(),
            "Pipeline initialized"
        );

        Ok(Self {
            config,
            coordinator,
            metrics,
        })
    }

    /// バッチを処理してメトリクスを送信する
    pub async fn run(
        &self,
        entry_point: &str,
        records: Vec<ChangeRecord>,
    ) -> Result<BatchReport, SyncError> {
        let report = self.coordinator.run_batch(records).await;

        send_metrics!(
            self.metrics,
            SyncMetrics::batch(
                &self.config.pipeline_name,
                entry_point,
                report.counts(),
                report.duration_ms as f64,
            )
        );

        report.into_result()
    }
}
