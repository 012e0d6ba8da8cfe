use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::SyncError;
use crate::retry::RetryStrategy;

/// 配信先の認証情報の取得元
#[derive(Clone, PartialEq, Eq)]
pub enum WebhookAuth {
    /// 環境変数で直接渡されたトークン
    Token(String),
    /// Secrets Manager のシークレットID
    SecretId(String),
}

impl fmt::Debug for WebhookAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookAuth::Token(_) => f.write_str("Token(<redacted>)"),
            WebhookAuth::SecretId(id) => f.debug_tuple("SecretId").field(id).finish(),
        }
    }
}

/// デッドレター出力先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterTarget {
    Queue(String),
    Table(String),
    /// 出力先未設定時はログのみ
    LogOnly,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub webhook_url: String,
    pub webhook_auth: WebhookAuth,
    pub pipeline_name: String,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub request_timeout: Duration,
    pub batch_size: usize,
    /// イベントソース側のバッチ待機時間（起動時にログ出力）
    pub batching_window: Duration,
    pub credential_cache_ttl: Duration,
    pub dead_letter: DeadLetterTarget,
    pub metrics_namespace: String,
    pub environment: String,
    pub aws_region: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー検索関数から設定を構築
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let webhook_url = get("WEBHOOK_URL")
            .ok_or_else(|| SyncError::Configuration("WEBHOOK_URL is required".to_string()))?;

        let webhook_auth = match (get("WEBHOOK_AUTH_TOKEN"), get("WEBHOOK_AUTH_SECRET_ID")) {
            (Some(token), _) => WebhookAuth::Token(token),
            (None, Some(secret_id)) => WebhookAuth::SecretId(secret_id),
            (None, None) => {
                return Err(SyncError::Configuration(
                    "WEBHOOK_AUTH_TOKEN or WEBHOOK_AUTH_SECRET_ID is required".to_string(),
                ))
            }
        };

        // キューを優先
        let dead_letter = match (get("DEAD_LETTER_QUEUE_URL"), get("DEAD_LETTER_TABLE")) {
            (Some(url), _) => DeadLetterTarget::Queue(url),
            (None, Some(table)) => DeadLetterTarget::Table(table),
            (None, None) => DeadLetterTarget::LogOnly,
        };

        let environment = get("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let default_level = if environment == "production" || environment == "prod" {
            "info"
        } else {
            "debug"
        };

        Ok(Config {
            webhook_url,
            webhook_auth,
            pipeline_name: get("PIPELINE_NAME").unwrap_or_else(|| "mmp-toledo-sync".to_string()),
            max_retries: parse_or(&get, "MAX_RETRIES", 3)?,
            retry_base_delay: Duration::from_millis(parse_or(&get, "RETRY_BASE_DELAY_MS", 1000)?),
            request_timeout: Duration::from_millis(parse_or(&get, "REQUEST_TIMEOUT_MS", 30_000)?),
            batch_size: parse_or(&get, "BATCH_SIZE", 10)?,
            batching_window: Duration::from_secs(parse_or(&get, "BATCHING_WINDOW_SECONDS", 5)?),
            credential_cache_ttl: Duration::from_secs(parse_or(
                &get,
                "CREDENTIAL_CACHE_TTL_SECONDS",
                300,
            )?),
            dead_letter,
            metrics_namespace: get("METRICS_NAMESPACE")
                .unwrap_or_else(|| "MmpToledoSync".to_string()),
            aws_region: get("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| default_level.to_string()),
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production" || self.environment == "prod"
    }

    /// 配信リトライ戦略
    pub fn retry_strategy(&self) -> RetryStrategy {
        RetryStrategy::linear(self.max_retries, self.retry_base_delay)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, SyncError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            SyncError::Configuration(format!("{} must be a non-negative integer, got {:?}", key, raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("WEBHOOK_URL", "https://example.test/functions/v1/dynamodb-webhook"),
            ("WEBHOOK_AUTH_TOKEN", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.pipeline_name, "mmp-toledo-sync");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(1000));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batching_window, Duration::from_secs(5));
        assert_eq!(config.credential_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.dead_letter, DeadLetterTarget::LogOnly);
        assert_eq!(config.metrics_namespace, "MmpToledoSync");
        assert_eq!(config.environment, "dev");
        assert_eq!(config.aws_region, "us-east-1");
        assert_eq!(config.log_level, "debug");
        assert!(!config.is_production());
        assert_eq!(config.retry_strategy().max_attempts, 3);
    }

    #[test]
    fn test_missing_webhook_url() {
        let err = Config::from_lookup(lookup(&[("WEBHOOK_AUTH_TOKEN", "secret")])).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
    }

    #[test]
    fn test_missing_credentials_source() {
        let err = Config::from_lookup(lookup(&[("WEBHOOK_URL", "https://example.test")]))
            .unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
    }

    #[test]
    fn test_secret_id_and_dead_letter_table() {
        let config = Config::from_lookup(lookup(&[
            ("WEBHOOK_URL", "https://example.test"),
            ("WEBHOOK_AUTH_SECRET_ID", "mmp-toledo/webhook"),
            ("DEAD_LETTER_TABLE", "sync-dead-letters"),
            ("ENVIRONMENT", "production"),
        ]))
        .unwrap();

        assert_eq!(
            config.webhook_auth,
            WebhookAuth::SecretId("mmp-toledo/webhook".to_string())
        );
        assert_eq!(
            config.dead_letter,
            DeadLetterTarget::Table("sync-dead-letters".to_string())
        );
        assert!(config.is_production());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_batch_settings_override() {
        let config = Config::from_lookup(lookup(&[
            ("WEBHOOK_URL", "https://example.test/functions/v1/dynamodb-webhook"),
            ("WEBHOOK_AUTH_TOKEN", "secret"),
            ("BATCH_SIZE", "25"),
            ("BATCHING_WINDOW_SECONDS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.batch_size, 25);
        assert_eq!(config.batching_window, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_lookup(lookup(&[
            ("WEBHOOK_URL", "https://example.test"),
            ("WEBHOOK_AUTH_TOKEN", "secret"),
            ("MAX_RETRIES", "three"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAX_RETRIES"));
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let rendered = format!("{:?}", WebhookAuth::Token("super-secret".to_string()));
        assert!(!rendered.contains("super-secret"));
    }
}
