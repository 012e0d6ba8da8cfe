use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit};
use aws_sdk_cloudwatch::Client as CloudWatchClient;
use aws_smithy_types::DateTime as AwsDateTime;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{error, info, instrument};

/// CloudWatch カスタムメトリクス送信クライアント
#[derive(Clone)]
pub struct MetricsClient {
    client: CloudWatchClient,
    namespace: String,
    default_dimensions: Vec<Dimension>,
}

impl MetricsClient {
    /// 新しいメトリクスクライアントを作成
    pub fn new(client: CloudWatchClient, namespace: String, environment: String) -> Self {
        let default_dimensions = vec![Dimension::builder()
            .name("Environment")
            .value(environment)
            .build()];

        Self {
            client,
            namespace,
            default_dimensions,
        }
    }

    /// バッチでメトリクスを送信（最大20個まで）
    #[instrument(skip(self, metrics))]
    pub async fn put_metrics_batch(
        &self,
        metrics: Vec<CustomMetric>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if metrics.is_empty() {
            return Ok(());
        }

        // CloudWatch API の制限により、一度に最大20個のメトリクスまで送信可能
        const BATCH_SIZE: usize = 20;

        for chunk in metrics.chunks(BATCH_SIZE) {
            let metric_data: Vec<MetricDatum> = chunk
                .iter()
                .map(|metric| {
                    let mut metric_dimensions = self.default_dimensions.clone();
                    for (key, value) in &metric.dimensions {
                        metric_dimensions.push(Dimension::builder().name(key).value(value).build());
                    }

                    MetricDatum::builder()
                        .metric_name(&metric.name)
                        .value(metric.value)
                        .unit(metric.unit.clone())
                        .timestamp(AwsDateTime::from_secs(metric.timestamp.timestamp()))
                        .set_dimensions(Some(metric_dimensions))
                        .build()
                })
                .collect();

            let result = self
                .client
                .put_metric_data()
                .namespace(&self.namespace)
                .set_metric_data(Some(metric_data))
                .send()
                .await;

            if let Err(e) = result {
                error!(
                    batch_size = chunk.len(),
                    error = %e,
                    "Failed to send metrics batch"
                );
                return Err(Box::new(e));
            }
            info!(batch_size = chunk.len(), "Metrics batch sent successfully");
        }

        Ok(())
    }
}

/// カスタムメトリクス定義
#[derive(Debug, Clone)]
pub struct CustomMetric {
    pub name: String,
    pub value: f64,
    pub unit: StandardUnit,
    pub dimensions: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl CustomMetric {
    pub fn new(
        name: String,
        value: f64,
        unit: StandardUnit,
        dimensions: HashMap<String, String>,
    ) -> Self {
        Self {
            name,
            value,
            unit,
            dimensions,
            timestamp: Utc::now(),
        }
    }

    /// カウンターメトリクスを作成
    pub fn count(name: String, value: f64, dimensions: HashMap<String, String>) -> Self {
        Self::new(name, value, StandardUnit::Count, dimensions)
    }

    /// 時間メトリクス（ミリ秒）を作成
    pub fn duration_ms(
        name: String,
        duration_ms: f64,
        dimensions: HashMap<String, String>,
    ) -> Self {
        Self::new(name, duration_ms, StandardUnit::Milliseconds, dimensions)
    }
}

/// バッチ処理結果の集計値
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub delivered: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub unmapped: usize,
}

/// 同期パイプラインのメトリクス
pub struct SyncMetrics;

impl SyncMetrics {
    fn pipeline_dimensions(pipeline: &str, entry_point: &str) -> HashMap<String, String> {
        let mut dimensions = HashMap::new();
        dimensions.insert("Pipeline".to_string(), pipeline.to_string());
        dimensions.insert("EntryPoint".to_string(), entry_point.to_string());
        dimensions
    }

    /// 1バッチ分のメトリクス一式
    pub fn batch(
        pipeline: &str,
        entry_point: &str,
        counts: BatchCounts,
        duration_ms: f64,
    ) -> Vec<CustomMetric> {
        let dimensions = Self::pipeline_dimensions(pipeline, entry_point);

        vec![
            CustomMetric::count(
                "RecordsDelivered".to_string(),
                counts.delivered as f64,
                dimensions.clone(),
            ),
            CustomMetric::count(
                "RecordsFailed".to_string(),
                counts.failed as f64,
                dimensions.clone(),
            ),
            CustomMetric::count(
                "RecordsDeadLettered".to_string(),
                counts.dead_lettered as f64,
                dimensions.clone(),
            ),
            CustomMetric::count(
                "UnmappedSourceTable".to_string(),
                counts.unmapped as f64,
                dimensions.clone(),
            ),
            CustomMetric::duration_ms("BatchDuration".to_string(), duration_ms, dimensions),
        ]
    }
}

/// 複数メトリクス送信のマクロ
///
/// 送信失敗はログに残すだけで呼び出し元には返さない。
#[macro_export]
macro_rules! send_metrics {
    ($metrics_client:expr, $metrics:expr) => {{
        if let Err(e) = $metrics_client.put_metrics_batch($metrics).await {
            tracing::error!(error = %e, "Failed to send metrics batch");
        }
    }};
}
