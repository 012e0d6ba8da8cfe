//! フィールド整形の共通ヘルパー

use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

/// 一括インポート時に付与されるメタデータ列（送信先には送らない）
pub const IMPORT_METADATA_FIELDS: &[&str] = &["_source_table", "_import_timestamp"];

/// 来歴フィールド名
pub const PROVENANCE_PK: &str = "dynamodb_pk";
pub const PROVENANCE_SK: &str = "dynamodb_sk";

/// これ以上の値はミリ秒、未満は秒とみなす
const MILLIS_THRESHOLD: f64 = 1e11;

/// 別名リストのうち最初に見つかった非 null の値
pub fn pick<'a>(data: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| data.get(*alias))
        .find(|value| !value.is_null())
}

/// 文字列として取得（数値・真偽値は文字列化、空文字は無視）
fn scalar_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// 実際に採用した別名を記録しながら値を取り出す
///
/// 採用されなかった別名は `remaining` に残り、呼び出し側で畳み込める。
#[derive(Debug)]
pub struct AliasPicker<'a> {
    data: &'a Map<String, Value>,
    consumed: Vec<&'a str>,
}

impl<'a> AliasPicker<'a> {
    pub fn new(data: &'a Map<String, Value>) -> Self {
        Self {
            data,
            consumed: Vec::new(),
        }
    }

    /// 最初の非 null の別名を採用する
    ///
    /// それより前にある null の別名も採用済みとして扱う。
    pub fn pick(&mut self, aliases: &[&str]) -> Option<&'a Value> {
        for alias in aliases {
            if let Some((name, value)) = self.data.get_key_value(*alias) {
                self.consumed.push(name.as_str());
                if !value.is_null() {
                    return Some(value);
                }
            }
        }
        None
    }

    pub fn pick_string(&mut self, aliases: &[&str]) -> Option<String> {
        self.pick(aliases).and_then(scalar_string)
    }

    /// 値を取り出さずに採用済みとする
    pub fn reserve(&mut self, name: &'a str) {
        self.consumed.push(name);
    }

    /// 採用されなかった列（来歴・インポート用の列は除く）
    pub fn remaining(&self) -> Map<String, Value> {
        self.data
            .iter()
            .filter(|(name, _)| {
                !self.consumed.contains(&name.as_str()) && !is_reserved(name, &[])
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// 数値または数値文字列をカウンタとして解釈
pub fn parse_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

/// 真偽値または "true"/"false" 文字列
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

/// エポック時刻として扱うフィールド名か
pub fn is_timestamp_field(name: &str) -> bool {
    matches!(name, "timestamp" | "last_visit" | "last_seen" | "first_seen")
        || name.ends_with("_at")
        || name.ends_with("_time")
}

/// エポック数値を ISO-8601 文字列へ（桁数で秒/ミリ秒を判定）
pub fn epoch_to_iso(value: &Value) -> Option<String> {
    let n = value.as_f64().filter(|n| n.is_finite())?;
    let millis = if n.abs() >= MILLIS_THRESHOLD { n } else { n * 1000.0 };

    Utc.timestamp_millis_opt(millis.round() as i64)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// 数値なら ISO-8601 文字列に変換し、それ以外はそのまま返す
pub fn coerce_timestamp(value: &Value) -> Value {
    match value {
        Value::Number(_) => epoch_to_iso(value)
            .map(Value::String)
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// マップ直下のタイムスタンプ列をすべて変換
pub fn coerce_timestamps(data: &mut Map<String, Value>) {
    for (name, value) in data.iter_mut() {
        if is_timestamp_field(name) {
            *value = coerce_timestamp(value);
        }
    }
}

/// `source` がオブジェクトなら `target` に展開する
pub fn merge_object(target: &mut Map<String, Value>, source: &Value) {
    if let Value::Object(entries) = source {
        for (name, value) in entries {
            target.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// いずれかの別名リストに含まれるか、来歴・インポート用の列か
pub fn is_reserved(name: &str, alias_groups: &[&[&str]]) -> bool {
    name == PROVENANCE_PK
        || name == PROVENANCE_SK
        || IMPORT_METADATA_FIELDS.contains(&name)
        || alias_groups.iter().any(|group| group.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_epoch_seconds_and_millis_detected_by_magnitude() {
        assert_eq!(
            epoch_to_iso(&json!(1_700_000_000)).as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
        assert_eq!(
            epoch_to_iso(&json!(1_700_000_000_123_i64)).as_deref(),
            Some("2023-11-14T22:13:20.123Z")
        );
        assert_eq!(epoch_to_iso(&json!("1700000000")), None);
    }

    #[test]
    fn test_timestamp_field_names() {
        assert!(is_timestamp_field("created_at"));
        assert!(is_timestamp_field("start_time"));
        assert!(is_timestamp_field("timestamp"));
        assert!(is_timestamp_field("last_visit"));
        assert!(!is_timestamp_field("ttl"));
        assert!(!is_timestamp_field("page_views"));
    }

    #[test]
    fn test_coerce_timestamps_leaves_strings_alone() {
        let mut data = json!({
            "created_at": 1_700_000_000,
            "updated_at": "2024-01-01T00:00:00Z",
            "count": 5
        })
        .as_object()
        .cloned()
        .unwrap();

        coerce_timestamps(&mut data);
        assert_eq!(data["created_at"], json!("2023-11-14T22:13:20.000Z"));
        assert_eq!(data["updated_at"], json!("2024-01-01T00:00:00Z"));
        assert_eq!(data["count"], json!(5));
    }

    #[test]
    fn test_parse_count_variants() {
        assert_eq!(parse_count(&json!(3)), Some(3));
        assert_eq!(parse_count(&json!("4")), Some(4));
        assert_eq!(parse_count(&json!(" 2.0 ")), Some(2));
        assert_eq!(parse_count(&json!("many")), None);
    }

    #[test]
    fn test_alias_picker_leaves_unused_aliases() {
        let data = json!({
            "last_visit": 1_700_000_000,
            "last_seen": 1_710_000_000,
            "leadId": null,
            "id": "L9",
            "dynamodb_pk": "L9",
            "_import_timestamp": "2024-01-01T00:00:00Z"
        })
        .as_object()
        .cloned()
        .unwrap();

        let mut picker = AliasPicker::new(&data);
        assert_eq!(picker.pick(&["last_visit", "last_seen"]), Some(&json!(1_700_000_000)));
        assert_eq!(picker.pick_string(&["lead_id", "leadId", "id"]).as_deref(), Some("L9"));

        let remaining = picker.remaining();
        assert_eq!(Value::Object(remaining), json!({ "last_seen": 1_710_000_000 }));
    }

    #[test]
    fn test_pick_skips_null_aliases() {
        let data = json!({ "leadId": null, "id": "L9" }).as_object().cloned().unwrap();
        assert_eq!(pick(&data, &["lead_id", "leadId", "id"]), Some(&json!("L9")));
        assert_eq!(AliasPicker::new(&data).pick_string(&["missing"]), None);
    }
}
