use std::collections::HashMap;

/// ルーティング結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub destination_table: String,
    /// 静的テーブルに一致した場合は true、フォールバック変換の場合は false
    pub mapped: bool,
    /// ソーステーブルのキー構成（宣言が無ければ None）
    pub key_schema: Option<KeySchema>,
}

/// ソーステーブルのキー構成
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySchema {
    pub partition: &'static str,
    pub sort: Option<&'static str>,
}

impl KeySchema {
    pub const fn partition(name: &'static str) -> Self {
        Self {
            partition: name,
            sort: None,
        }
    }

    pub const fn composite(partition: &'static str, sort: &'static str) -> Self {
        Self {
            partition,
            sort: Some(sort),
        }
    }
}

/// 既知のソーステーブル → 送信先テーブル
///
/// 同じ論理テーブルの歴代の名前はすべて同じ送信先にまとめる。
const TABLE_MAPPINGS: &[(&str, &str)] = &[
    // Firespring
    ("firespring-backdoor-actions-dev", "firespring_actions"),
    ("firespring-backdoor-extraction-jobs-dev", "firespring_extraction_jobs"),
    ("firespring-backdoor-network-state-dev", "firespring_network_state"),
    ("firespring-backdoor-searches-dev", "firespring_searches"),
    ("firespring-backdoor-segments-dev", "firespring_segments"),
    ("firespring-backdoor-traffic-sources-dev", "firespring_traffic_sources"),
    ("firespring-backdoor-visitors-dev", "firespring_visitors"),
    // Lead（過去のデプロイで生成された名前を含む）
    ("Lead-sqiqbtbugvfabolqwdt4rz3dla-NONE", "mmp_toledo_leads"),
    ("Lead-h6a66mxndnhc7h3o4kldil67oa-NONE", "mmp_toledo_leads"),
    ("Lead-sfyatimxznhd3nybi6mcbg5ipq-NONE", "mmp_toledo_leads"),
    ("Lead-x5u6a7nejrcfbjj6qld46eamai-NONE", "mmp_toledo_leads"),
    ("Lead-xllvnlnajffmznanpuyhq3pl6i-NONE", "mmp_toledo_leads"),
    // Toledo
    ("toledo-consulting-dashboard-data", "toledo_dashboard"),
    ("toledo-otp-codes", "mmp_toledo_otp_codes"),
];

const LEAD_KEYS: KeySchema = KeySchema::partition("id");

/// ソーステーブル → キー構成
///
/// ここに無いテーブルはキー属性名から推測する。
const KEY_SCHEMAS: &[(&str, KeySchema)] = &[
    ("firespring-backdoor-actions-dev", KeySchema::composite("visitor_id", "timestamp")),
    ("firespring-backdoor-searches-dev", KeySchema::partition("search_id")),
    ("firespring-backdoor-visitors-dev", KeySchema::partition("visitor_id")),
    ("Lead-sqiqbtbugvfabolqwdt4rz3dla-NONE", LEAD_KEYS),
    ("Lead-h6a66mxndnhc7h3o4kldil67oa-NONE", LEAD_KEYS),
    ("Lead-sfyatimxznhd3nybi6mcbg5ipq-NONE", LEAD_KEYS),
    ("Lead-x5u6a7nejrcfbjj6qld46eamai-NONE", LEAD_KEYS),
    ("Lead-xllvnlnajffmznanpuyhq3pl6i-NONE", LEAD_KEYS),
    ("toledo-consulting-dashboard-data", KeySchema::composite("PK", "SK")),
    ("toledo-otp-codes", KeySchema::partition("email")),
];

/// ソーステーブル名から送信先テーブル名を解決する
///
/// 起動時に一度だけ構築し、以降は読み取り専用で共有する。
#[derive(Debug, Clone)]
pub struct TableRouter {
    mappings: HashMap<&'static str, &'static str>,
    key_schemas: HashMap<&'static str, KeySchema>,
}

impl Default for TableRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRouter {
    pub fn new() -> Self {
        Self {
            mappings: TABLE_MAPPINGS.iter().copied().collect(),
            key_schemas: KEY_SCHEMAS.iter().copied().collect(),
        }
    }

    /// 送信先を解決する（失敗しない）
    ///
    /// 未知の名前は `-` を `_` に置換して小文字化した名前へ送る。
    pub fn route(&self, source_table: &str) -> RoutingDecision {
        let key_schema = self.key_schemas.get(source_table).copied();
        match self.mappings.get(source_table) {
            Some(destination) => RoutingDecision {
                destination_table: (*destination).to_string(),
                mapped: true,
                key_schema,
            },
            None => RoutingDecision {
                destination_table: fallback_table_name(source_table),
                mapped: false,
                key_schema,
            },
        }
    }

    /// 静的テーブルに登録されているソーステーブル名
    pub fn known_sources(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.mappings.keys().copied()
    }
}

fn fallback_table_name(source_table: &str) -> String {
    source_table.replace('-', "_").to_lowercase()
}
