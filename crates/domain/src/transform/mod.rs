//! 送信先テーブルごとのフィールド整形
//!
//! 送信先テーブル名 → 整形関数の明示的なレジストリと、
//! 未登録テーブル用の汎用整形を持つ。

pub mod dashboard;
pub mod fields;
pub mod generic;
pub mod leads;
pub mod otp;
pub mod visitors;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::errors::DomainError;
use crate::normalizer::NormalizedRecord;
use crate::record::EventKind;
use crate::router::{KeySchema, RoutingDecision};
use fields::{PROVENANCE_PK, PROVENANCE_SK};

/// 送信先での操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Upsert,
    Delete,
}

impl From<EventKind> for Action {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Created | EventKind::Updated => Action::Upsert,
            EventKind::Deleted => Action::Delete,
        }
    }
}

/// 送信先スキーマに合わせて整形済みのペイロード
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformedPayload {
    pub table: String,
    pub action: Action,
    pub data: Map<String, Value>,
}

/// 元レコードのキー情報（再照合・追跡用）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    pub pk: Option<Value>,
    pub sk: Option<Value>,
}

impl Provenance {
    /// キー属性から来歴を決定する
    ///
    /// キー構成が宣言されていればその属性名を使う。
    /// キー属性が無い場合は、整形済みデータの来歴列や PK/SK 列を使う。
    pub fn resolve(record: &NormalizedRecord, schema: Option<&KeySchema>) -> Self {
        if !record.keys.is_empty() {
            if let Some(declared) = schema.and_then(|schema| Self::from_schema(&record.keys, schema)) {
                return declared;
            }
            return Self::from_keys(&record.source_table, &record.keys);
        }

        let pk = fields::pick(&record.data, &[PROVENANCE_PK, "PK", "pk"]).cloned();
        if pk.is_none() {
            if let Some(declared) = schema.and_then(|schema| Self::from_schema(&record.data, schema)) {
                return declared;
            }
        }

        Self {
            pk,
            sk: fields::pick(&record.data, &[PROVENANCE_SK, "SK", "sk"]).cloned(),
        }
    }

    fn from_schema(attributes: &Map<String, Value>, schema: &KeySchema) -> Option<Self> {
        let pk = attributes.get(schema.partition).filter(|v| !v.is_null())?;
        let sk = schema
            .sort
            .and_then(|name| attributes.get(name))
            .filter(|v| !v.is_null());

        Some(Self {
            pk: Some(pk.clone()),
            sk: sk.cloned(),
        })
    }

    fn from_keys(source_table: &str, keys: &Map<String, Value>) -> Self {
        let pk = fields::pick(keys, &["PK", "pk"]).cloned();
        let sk = fields::pick(keys, &["SK", "sk"]).cloned();
        if pk.is_some() {
            return Self { pk, sk };
        }

        // 名前で判別できない場合は属性名順で パーティション → ソート とみなす
        let mut names: Vec<&String> = keys.keys().collect();
        names.sort();
        if names.len() > 1 {
            warn!(
                source_table,
                key_attributes = ?names,
                "No key schema declared; guessing partition and sort keys by attribute name"
            );
        }
        let mut values = names
            .into_iter()
            .filter_map(|name| keys.get(name))
            .filter(|value| !value.is_null())
            .cloned();

        Self {
            pk: values.next(),
            sk: values.next(),
        }
    }

    fn apply(&self, data: &mut Map<String, Value>) {
        if let Some(pk) = &self.pk {
            data.entry(PROVENANCE_PK.to_string())
                .or_insert_with(|| pk.clone());
        }
        if let Some(sk) = &self.sk {
            data.entry(PROVENANCE_SK.to_string())
                .or_insert_with(|| sk.clone());
        }
    }
}

/// 整形関数に渡す付帯情報
#[derive(Debug, Clone)]
pub struct ShapeContext {
    pub provenance: Provenance,
    pub now: DateTime<Utc>,
}

/// テーブル固有の整形関数
pub type ShapeFn = fn(&Map<String, Value>, &ShapeContext) -> Map<String, Value>;

/// 送信先テーブルの整形定義
#[derive(Clone, Copy)]
pub struct TableTransform {
    /// 一意キー列（すべて非 null であること）
    pub unique_keys: &'static [&'static str],
    pub shape: ShapeFn,
}

/// 送信先テーブル → 整形定義のレジストリ
///
/// 起動時に一度だけ構築し、以降は読み取り専用で共有する。
#[derive(Clone)]
pub struct TransformRegistry {
    tables: HashMap<&'static str, TableTransform>,
    default: TableTransform,
}

impl fmt::Debug for TableTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableTransform")
            .field("unique_keys", &self.unique_keys)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformRegistry {
    pub fn new() -> Self {
        let tables = HashMap::from([
            (leads::TABLE, leads::TRANSFORM),
            (otp::TABLE, otp::TRANSFORM),
            (dashboard::TABLE, dashboard::TRANSFORM),
            (visitors::TABLE, visitors::TRANSFORM),
            (generic::SEARCHES_TABLE, generic::SEARCHES_TRANSFORM),
        ]);

        Self {
            tables,
            default: generic::TRANSFORM,
        }
    }

    /// 専用整形が登録されている送信先テーブル
    pub fn destinations(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.keys().copied()
    }

    /// 送信先テーブルの整形定義（未登録なら汎用整形）
    pub fn table(&self, destination_table: &str) -> &TableTransform {
        self.tables.get(destination_table).unwrap_or(&self.default)
    }

    pub fn transform(
        &self,
        decision: &RoutingDecision,
        record: &NormalizedRecord,
        kind: EventKind,
    ) -> Result<TransformedPayload, DomainError> {
        self.transform_at(decision, record, kind, Utc::now())
    }

    /// 基準時刻を指定して整形する
    pub fn transform_at(
        &self,
        decision: &RoutingDecision,
        record: &NormalizedRecord,
        kind: EventKind,
        now: DateTime<Utc>,
    ) -> Result<TransformedPayload, DomainError> {
        let table = self.table(&decision.destination_table);
        let context = ShapeContext {
            provenance: Provenance::resolve(record, decision.key_schema.as_ref()),
            now,
        };

        let mut data = (table.shape)(&record.data, &context);
        context.provenance.apply(&mut data);

        for field in table.unique_keys {
            let present = match data.get(*field) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(DomainError::MissingKey {
                    table: decision.destination_table.clone(),
                    field: (*field).to_string(),
                });
            }
        }

        Ok(TransformedPayload {
            table: decision.destination_table.clone(),
            action: Action::from(kind),
            data,
        })
    }
}
