use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

/// 型タグ付きの属性マップ（`{"name": {"S": "..."}}` 形式）
pub type TypedItem = Map<String, Value>;

/// 変更イベントの種類
///
/// ワイヤ上の語彙は変更ストリームに合わせて INSERT / MODIFY / REMOVE。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "INSERT", alias = "CREATED")]
    Created,
    #[serde(rename = "MODIFY", alias = "UPDATED")]
    Updated,
    #[serde(rename = "REMOVE", alias = "DELETED")]
    Deleted,
}

impl EventKind {
    /// ストリーム側の表記
    pub fn as_wire(&self) -> &'static str {
        match self {
            EventKind::Created => "INSERT",
            EventKind::Updated => "MODIFY",
            EventKind::Deleted => "REMOVE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for EventKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" | "CREATED" => Ok(EventKind::Created),
            "MODIFY" | "UPDATED" => Ok(EventKind::Updated),
            "REMOVE" | "DELETED" => Ok(EventKind::Deleted),
            other => Err(DomainError::UnknownEventKind(other.to_string())),
        }
    }
}

/// 変更ストリームから届いた1件のミューテーション
///
/// 生成後は変更しない。配信のリトライでも同じ値を使い回し、
/// 最終的に失敗した場合はこの値そのものをデッドレターへ送る。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub event_id: String,
    pub event_kind: EventKind,
    pub source_table: String,
    #[serde(default)]
    pub sequence_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<TypedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_state: Option<TypedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<TypedItem>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub approximate_creation_time: Option<DateTime<Utc>>,
}

/// ソース識別子からテーブル名を取り出す
///
/// `arn:aws:dynamodb:...:table/<name>/stream/...` のような識別子は `<name>` を返し、
/// `table/` セグメントを含まない場合はそのまま返す。
pub fn source_table_from_identifier(identifier: &str) -> String {
    match identifier.split_once("table/") {
        Some((_, rest)) => rest.split('/').next().unwrap_or(rest).to_string(),
        None => identifier.to_string(),
    }
}
