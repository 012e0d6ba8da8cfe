use chrono::Utc;
use domain::{
    normalize, ChangeRecord, DeliveryOutcome, DeliveryStatus, DomainError, RoutingDecision,
    TableRouter, TransformRegistry,
};
use infrastructure::{DeadLetterMessage, DeadLetterSink, FailureDetail, FailureStage, PayloadSender};
use serde::Serialize;
use shared::{BatchCounts, SyncError};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// 1レコード分の処理結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub event_id: String,
    pub source_table: String,
    pub destination_table: String,
    pub mapped: bool,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
    pub dead_lettered: bool,
}

/// バッチ処理の集計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub unmapped: usize,
    pub partial_success: bool,
    pub duration_ms: u64,
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    fn push(&mut self, outcome: RecordOutcome) {
        self.total += 1;
        if outcome.outcome.is_delivered() {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
        if outcome.dead_lettered {
            self.dead_lettered += 1;
        }
        if !outcome.mapped {
            self.unmapped += 1;
        }
        self.partial_success = self.delivered > 0 && self.failed > 0;
        self.outcomes.push(outcome);
    }

    /// 空でないバッチが全件失敗したか
    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.delivered == 0
    }

    pub fn counts(&self) -> BatchCounts {
        BatchCounts {
            delivered: self.delivered,
            failed: self.failed,
            dead_lettered: self.dead_lettered,
            unmapped: self.unmapped,
        }
    }

    /// 全件失敗ならバッチ失敗として上流の再送に委ねる
    pub fn into_result(self) -> Result<BatchReport, SyncError> {
        if self.all_failed() {
            Err(SyncError::BatchFailed { total: self.total })
        } else {
            Ok(self)
        }
    }
}

/// 正規化 → ルーティング → 整形 → 配信 を順に実行する
pub struct BatchCoordinator {
    router: TableRouter,
    registry: TransformRegistry,
    sender: Box<dyn PayloadSender>,
    dead_letter: Box<dyn DeadLetterSink>,
    batch_size: usize,
}

impl BatchCoordinator {
    pub fn new(sender: Box<dyn PayloadSender>, dead_letter: Box<dyn DeadLetterSink>) -> Self {
        Self {
            router: TableRouter::new(),
            registry: TransformRegistry::new(),
            sender,
            dead_letter,
            batch_size: 10,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// バッチを処理し、全件失敗なら `BatchFailed` を返す
    pub async fn process_batch(
        &self,
        records: Vec<ChangeRecord>,
    ) -> Result<BatchReport, SyncError> {
        self.run_batch(records).await.into_result()
    }

    /// バッチを処理して集計を返す（失敗判定はしない）
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn run_batch(&self, records: Vec<ChangeRecord>) -> BatchReport {
        let started = Instant::now();

        if records.len() > self.batch_size {
            warn!(
                records = records.len(),
                batch_size = self.batch_size,
                "Batch is larger than the configured batch size"
            );
        }

        let mut report = BatchReport::default();
        for record in &records {
            let outcome = self.process_record(record).await;

            info!(
                event_id = %outcome.event_id,
                source_table = %outcome.source_table,
                destination_table = %outcome.destination_table,
                status = ?outcome.outcome.status,
                attempts = outcome.outcome.attempts,
                dead_lettered = outcome.dead_lettered,
                "Record processed"
            );
            report.push(outcome);
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        if report.all_failed() {
            error!(total = report.total, "Every record in the batch failed");
        } else {
            info!(
                total = report.total,
                delivered = report.delivered,
                failed = report.failed,
                dead_lettered = report.dead_lettered,
                unmapped = report.unmapped,
                duration_ms = report.duration_ms,
                "Batch processed"
            );
        }

        report
    }

    async fn process_record(&self, record: &ChangeRecord) -> RecordOutcome {
        let decision = self.router.route(&record.source_table);
        if !decision.mapped {
            warn!(
                source_table = %record.source_table,
                destination_table = %decision.destination_table,
                "Source table is not mapped, using derived destination name"
            );
        }

        let (outcome, stage) = match self.transform_and_deliver(record, &decision).await {
            Ok(outcome) => (outcome, FailureStage::Deliver),
            Err((stage, e)) => (
                DeliveryOutcome::terminal(0, e.code(), e.to_string()),
                stage,
            ),
        };

        let dead_lettered = if outcome.status == DeliveryStatus::FailedTerminal {
            self.send_to_dead_letter(record, &outcome, stage).await
        } else {
            false
        };

        RecordOutcome {
            event_id: record.event_id.clone(),
            source_table: record.source_table.clone(),
            destination_table: decision.destination_table,
            mapped: decision.mapped,
            outcome,
            dead_lettered,
        }
    }

    async fn transform_and_deliver(
        &self,
        record: &ChangeRecord,
        decision: &RoutingDecision,
    ) -> Result<DeliveryOutcome, (FailureStage, DomainError)> {
        let normalized = normalize(record).map_err(|e| (FailureStage::Normalize, e))?;
        let payload = self
            .registry
            .transform(decision, &normalized, record.event_kind)
            .map_err(|e| (FailureStage::Transform, e))?;

        Ok(self.sender.deliver(&payload, record).await)
    }

    /// 元レコードをデッドレターへ送る（失敗してもバッチは止めない）
    async fn send_to_dead_letter(
        &self,
        record: &ChangeRecord,
        outcome: &DeliveryOutcome,
        stage: FailureStage,
    ) -> bool {
        let (code, message) = outcome
            .last_error
            .as_ref()
            .map(|e| (e.code.clone(), e.message.clone()))
            .unwrap_or_default();

        let message = DeadLetterMessage::new(
            record.clone(),
            FailureDetail {
                stage,
                code,
                message,
                attempts: outcome.attempts,
                timestamp: Utc::now(),
            },
        );

        match self.dead_letter.send(&message).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    event_id = %record.event_id,
                    error = %e,
                    "Failed to write record to dead-letter sink"
                );
                false
            }
        }
    }
}
