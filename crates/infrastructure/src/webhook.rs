use async_trait::async_trait;
use domain::{ChangeRecord, DeliveryOutcome, TransformedPayload};
use serde_json::{json, Value};
use shared::{RetryExecutor, RetryResult, RetryStrategy, SyncError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::credentials::{CachedToken, TokenProvider, TokenSource};

/// 整形済みペイロードの送信口
#[async_trait]
pub trait PayloadSender: Send + Sync {
    /// 1レコードを配信し、リトライを含めた最終結果を返す
    async fn deliver(&self, payload: &TransformedPayload, record: &ChangeRecord)
        -> DeliveryOutcome;
}

/// 送信先 HTTP エンドポイントの設定
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub url: String,
    pub pipeline_name: String,
    pub request_timeout: Duration,
    pub retry: RetryStrategy,
}

impl WebhookSettings {
    pub fn from_config(config: &shared::Config) -> Self {
        Self {
            url: config.webhook_url.clone(),
            pipeline_name: config.pipeline_name.clone(),
            request_timeout: config.request_timeout,
            retry: config.retry_strategy(),
        }
    }
}

/// 送信先 Webhook へ POST する配信クライアント
pub struct WebhookClient<S = TokenProvider> {
    http: reqwest::Client,
    settings: WebhookSettings,
    token: Arc<CachedToken<S>>,
    retry: RetryExecutor,
}

impl<S: TokenSource> WebhookClient<S> {
    pub fn new(settings: WebhookSettings, token: Arc<CachedToken<S>>) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            retry: RetryExecutor::new(settings.retry.clone()),
            settings,
            token,
        })
    }

    /// 1回分の POST
    async fn send_once(&self, body: &Value) -> Result<(), SyncError> {
        let token = self.token.get().await?;

        let response = self
            .http
            .post(&self.settings.url)
            .bearer_auth(token)
            .header("X-Source", &self.settings.pipeline_name)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::TransientDelivery(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
            {
                self.token.invalidate().await;
            }
            return Err(SyncError::ValidationDelivery {
                status: status.as_u16(),
                body: text,
            });
        }

        Err(SyncError::TransientDelivery(format!(
            "Webhook responded with {}: {}",
            status.as_u16(),
            text
        )))
    }
}

/// 送信ボディを組み立てる
pub fn request_body(payload: &TransformedPayload, record: &ChangeRecord) -> Value {
    json!({
        "table": payload.table,
        "action": payload.action,
        "data": payload.data,
        "metadata": {
            "eventId": record.event_id,
            "sequenceNumber": record.sequence_token,
            "approximateCreationDateTime": record.approximate_creation_time.map(|t| t.timestamp()),
            "sourceTableName": record.source_table,
        }
    })
}

#[async_trait]
impl<S: TokenSource> PayloadSender for WebhookClient<S> {
    #[instrument(skip_all, fields(event_id = %record.event_id, table = %payload.table))]
    async fn deliver(
        &self,
        payload: &TransformedPayload,
        record: &ChangeRecord,
    ) -> DeliveryOutcome {
        let body = request_body(payload, record);

        let result = self
            .retry
            .execute(|attempt| {
                debug!(attempt, "Posting payload to webhook");
                self.send_once(&body)
            })
            .await;

        match result {
            RetryResult::Success { attempts, .. } => {
                info!(attempts, "Payload delivered");
                DeliveryOutcome::delivered(attempts)
            }
            RetryResult::MaxAttemptsReached { error, attempts }
            | RetryResult::NonRetryable { error, attempts } => {
                warn!(attempts, error = %error, "Payload delivery failed");
                DeliveryOutcome::terminal(attempts, error.metadata().code, error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Action, DeliveryStatus, EventKind};
    use serde_json::Map;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WebhookClient {
        let settings = WebhookSettings {
            url: format!("{}/functions/v1/dynamodb-webhook", server.uri()),
            pipeline_name: "mmp-toledo-sync".to_string(),
            request_timeout: Duration::from_secs(5),
            retry: RetryStrategy::linear(3, Duration::from_millis(1)),
        };
        let token = Arc::new(CachedToken::new(
            TokenProvider::Static("test-token".to_string()),
            Duration::from_secs(300),
        ));
        WebhookClient::new(settings, token).unwrap()
    }

    fn sample() -> (TransformedPayload, ChangeRecord) {
        let mut data = Map::new();
        data.insert("lead_id".to_string(), json!("L1"));
        let payload = TransformedPayload {
            table: "mmp_toledo_leads".to_string(),
            action: Action::Upsert,
            data,
        };
        let record = ChangeRecord {
            event_id: "evt-1".to_string(),
            event_kind: EventKind::Created,
            source_table: "Lead-sqiqbtbugvfabolqwdt4rz3dla-NONE".to_string(),
            sequence_token: "100".to_string(),
            new_state: None,
            old_state: None,
            keys: None,
            approximate_creation_time: None,
        };
        (payload, record)
    }

    #[tokio::test]
    async fn test_delivered_on_2xx_with_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/dynamodb-webhook"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("X-Source", "mmp-toledo-sync"))
            .and(body_partial_json(json!({
                "table": "mmp_toledo_leads",
                "action": "UPSERT",
                "data": {"lead_id": "L1"},
                "metadata": {"eventId": "evt-1", "sequenceNumber": "100"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let (payload, record) = sample();
        let outcome = client_for(&server).deliver(&payload, &record).await;

        assert_eq!(outcome, DeliveryOutcome::delivered(1));
    }

    #[tokio::test]
    async fn test_sustained_5xx_makes_exactly_three_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let (payload, record) = sample();
        let outcome = client_for(&server).deliver(&payload, &record).await;

        assert_eq!(outcome.status, DeliveryStatus::FailedTerminal);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(
            outcome.last_error.map(|e| e.code),
            Some("TRANSIENT_DELIVERY".to_string())
        );
    }

    #[tokio::test]
    async fn test_4xx_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid payload"))
            .expect(1)
            .mount(&server)
            .await;

        let (payload, record) = sample();
        let outcome = client_for(&server).deliver(&payload, &record).await;

        assert_eq!(outcome.status, DeliveryStatus::FailedTerminal);
        assert_eq!(outcome.attempts, 1);
        let error = outcome.last_error.unwrap();
        assert_eq!(error.code, "VALIDATION_DELIVERY");
        assert!(error.message.contains("invalid payload"));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (payload, record) = sample();
        let outcome = client_for(&server).deliver(&payload, &record).await;

        assert_eq!(outcome, DeliveryOutcome::delivered(2));
    }

    #[test]
    fn test_delete_body_uses_delete_action() {
        let (mut payload, record) = sample();
        payload.action = Action::Delete;

        let body = request_body(&payload, &record);
        assert_eq!(body["action"], "DELETE");
        assert_eq!(body["metadata"]["sourceTableName"], record.source_table);
        assert!(body["metadata"]["approximateCreationDateTime"].is_null());
    }
}
