use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use shared::{SyncError, WebhookAuth};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 配信先トークンの取得元
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<String, SyncError>;
}

/// 静的トークンまたは Secrets Manager のシークレット
pub enum TokenProvider {
    Static(String),
    SecretsManager {
        client: SecretsManagerClient,
        secret_id: String,
    },
}

impl TokenProvider {
    pub fn from_auth(auth: &WebhookAuth, aws_config: &SdkConfig) -> Self {
        match auth {
            WebhookAuth::Token(token) => TokenProvider::Static(token.clone()),
            WebhookAuth::SecretId(secret_id) => TokenProvider::SecretsManager {
                client: SecretsManagerClient::new(aws_config),
                secret_id: secret_id.clone(),
            },
        }
    }
}

#[async_trait]
impl TokenSource for TokenProvider {
    async fn fetch(&self) -> Result<String, SyncError> {
        match self {
            TokenProvider::Static(token) => Ok(token.clone()),
            TokenProvider::SecretsManager { client, secret_id } => {
                let secret = client
                    .get_secret_value()
                    .secret_id(secret_id)
                    .send()
                    .await
                    .map_err(|e| {
                        SyncError::Credentials(format!(
                            "Failed to retrieve secret {}: {}",
                            secret_id, e
                        ))
                    })?;

                let raw = secret.secret_string().ok_or_else(|| {
                    SyncError::Credentials(format!("Secret {} has no string value", secret_id))
                })?;

                info!(secret_id = %secret_id, "Webhook token loaded from Secrets Manager");
                parse_secret(raw)
            }
        }
    }
}

/// シークレット文字列からトークンを取り出す
///
/// 平文、または `{"token": "..."}` 形式の JSON を受け付ける。
pub fn parse_secret(raw: &str) -> Result<String, SyncError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SyncError::Credentials("Secret value is empty".to_string()));
    }

    if trimmed.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| SyncError::Credentials(format!("Failed to parse secret JSON: {}", e)))?;
        return value["token"]
            .as_str()
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SyncError::Credentials("Token not found in secret".to_string()));
    }

    Ok(trimmed.to_string())
}

/// 有効期限付きでトークンを保持するキャッシュ
///
/// 期限切れ時の再取得は冪等で、同時に更新された場合は後勝ち。
pub struct CachedToken<S = TokenProvider> {
    source: S,
    ttl: Duration,
    cached: RwLock<Option<(String, Instant)>>,
}

impl<S: TokenSource> CachedToken<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Result<String, SyncError> {
        if let Some((token, fetched_at)) = self.cached.read().await.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(token.clone());
            }
        }

        debug!("Refreshing webhook token");
        let token = self.source.fetch().await?;
        *self.cached.write().await = Some((token.clone(), Instant::now()));
        Ok(token)
    }

    /// 認証エラー時に次回の取得で再読み込みさせる
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch(&self) -> Result<String, SyncError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{}", n))
        }
    }

    #[test]
    fn test_parse_plain_secret() {
        assert_eq!(parse_secret("  abc123\n").unwrap(), "abc123");
    }

    #[test]
    fn test_parse_json_secret() {
        assert_eq!(parse_secret(r#"{"token":"abc123"}"#).unwrap(), "abc123");
        assert!(parse_secret(r#"{"password":"x"}"#).is_err());
        assert!(parse_secret("").is_err());
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = TokenProvider::Static("static-token".to_string());
        assert_eq!(provider.fetch().await.unwrap(), "static-token");
    }

    #[tokio::test]
    async fn test_cache_reuses_token_within_ttl() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = CachedToken::new(
            CountingSource {
                calls: calls.clone(),
            },
            Duration::from_secs(300),
        );

        assert_eq!(cache.get().await.unwrap(), "token-1");
        assert_eq!(cache.get().await.unwrap(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_refreshes_after_expiry_and_invalidate() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = CachedToken::new(
            CountingSource {
                calls: calls.clone(),
            },
            Duration::ZERO,
        );

        assert_eq!(cache.get().await.unwrap(), "token-1");
        assert_eq!(cache.get().await.unwrap(), "token-2");

        let cache = CachedToken::new(
            CountingSource {
                calls: calls.clone(),
            },
            Duration::from_secs(300),
        );
        assert_eq!(cache.get().await.unwrap(), "token-3");
        cache.invalidate().await;
        assert_eq!(cache.get().await.unwrap(), "token-4");
    }
}
