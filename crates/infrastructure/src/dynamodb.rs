use aws_config::SdkConfig;
use aws_sdk_dynamodb::Client;

/// テーブル名を束ねた DynamoDB クライアント
#[derive(Clone)]
pub struct DynamoDbClient {
    client: Client,
    table_name: String,
}

impl DynamoDbClient {
    pub fn new(aws_config: &SdkConfig, table_name: impl Into<String>) -> Self {
        Self::from_client(Client::new(aws_config), table_name)
    }

    pub fn from_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}
