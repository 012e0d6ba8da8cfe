use serde_json::{Map, Number, Value};

use crate::errors::DomainError;
use crate::record::{ChangeRecord, EventKind, TypedItem};

/// 型タグを取り除いたプレーンなレコード
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub source_table: String,
    /// `new_state`（削除時は `old_state`）から得たフラットなマップ
    pub data: Map<String, Value>,
    /// キー属性（ストリームに含まれていない場合は空）
    pub keys: Map<String, Value>,
}

impl NormalizedRecord {
    /// 変換済みデータから再構築する（再変換や再照合に使用）
    pub fn from_plain(source_table: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            source_table: source_table.into(),
            data,
            keys: Map::new(),
        }
    }
}

/// `ChangeRecord` をプレーンな値へ正規化する
///
/// 削除イベントは `old_state` を、それ以外は `new_state` を優先し、
/// 優先側が無ければもう一方を使う。どちらも無ければ `MalformedRecord`。
pub fn normalize(record: &ChangeRecord) -> Result<NormalizedRecord, DomainError> {
    let state = match record.event_kind {
        EventKind::Deleted => record.old_state.as_ref().or(record.new_state.as_ref()),
        EventKind::Created | EventKind::Updated => {
            record.new_state.as_ref().or(record.old_state.as_ref())
        }
    }
    .ok_or_else(|| {
        DomainError::MalformedRecord(format!(
            "record {} carries neither new_state nor old_state",
            record.event_id
        ))
    })?;

    let data = normalize_item(state)?;
    let keys = match &record.keys {
        Some(keys) => normalize_item(keys)?,
        None => Map::new(),
    };

    Ok(NormalizedRecord {
        source_table: record.source_table.clone(),
        data,
        keys,
    })
}

/// 型タグ付きマップをプレーンなマップへ変換
pub fn normalize_item(item: &TypedItem) -> Result<Map<String, Value>, DomainError> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), normalize_value(name, value)?)))
        .collect()
}

/// 単一の型タグ付き値を変換（M / L は再帰）
fn normalize_value(path: &str, value: &Value) -> Result<Value, DomainError> {
    let malformed = |detail: &str| DomainError::MalformedRecord(format!("{path}: {detail}"));

    let (tag, inner) = match value.as_object() {
        Some(tagged) if tagged.len() == 1 => match tagged.iter().next() {
            Some(entry) => entry,
            None => return Err(malformed("empty attribute value")),
        },
        _ => return Err(malformed("expected a single-tag attribute value")),
    };

    match tag.as_str() {
        "S" | "B" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed("string payload expected")),
        "N" => parse_number(inner)
            .map(number_value)
            .ok_or_else(|| malformed("unparsable number")),
        "BOOL" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| malformed("boolean payload expected")),
        "NULL" => Ok(Value::Null),
        "SS" | "BS" => inner
            .as_array()
            .ok_or_else(|| malformed("set payload expected"))?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| Value::String(s.to_string()))
                    .ok_or_else(|| malformed("string set member expected"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "NS" => inner
            .as_array()
            .ok_or_else(|| malformed("set payload expected"))?
            .iter()
            .map(|v| {
                parse_number(v)
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| malformed("unparsable number set member"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "M" => {
            let nested = inner.as_object().ok_or_else(|| malformed("map payload expected"))?;
            nested
                .iter()
                .map(|(name, v)| Ok((name.clone(), normalize_value(&format!("{path}.{name}"), v)?)))
                .collect::<Result<Map<_, _>, DomainError>>()
                .map(Value::Object)
        }
        "L" => inner
            .as_array()
            .ok_or_else(|| malformed("list payload expected"))?
            .iter()
            .enumerate()
            .map(|(i, v)| normalize_value(&format!("{path}[{i}]"), v))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(malformed(&format!("unrecognized type tag `{other}`"))),
    }
}

/// 数値は文字列表現が正だが、変換済みの数値も受け付ける
fn parse_number(raw: &Value) -> Option<f64> {
    let parsed = match raw {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// 浮動小数点値を JSON 数値にする（整数値は整数として出力）
pub fn number_value(n: f64) -> Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
