use aws_config::{BehaviorVersion, Region, SdkConfig};
use shared::Config;

/// 共通の AWS 設定を読み込む
///
/// 各クライアントはこの設定から一度だけ生成して使い回す。
pub async fn load_aws_config(config: &Config) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .load()
        .await
}
