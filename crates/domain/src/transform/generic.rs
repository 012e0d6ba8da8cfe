//! 汎用整形（専用整形が無いテーブル）

use serde_json::{Map, Value};

use super::fields::{coerce_timestamps, IMPORT_METADATA_FIELDS, PROVENANCE_PK};
use super::{ShapeContext, TableTransform};

pub const TRANSFORM: TableTransform = TableTransform {
    unique_keys: &[PROVENANCE_PK],
    shape: shape_passthrough,
};

pub const SEARCHES_TABLE: &str = "firespring_searches";

pub const SEARCHES_TRANSFORM: TableTransform = TableTransform {
    unique_keys: &["search_id"],
    shape: shape_passthrough,
};

/// インポート用メタデータ列を除き、エポック時刻を ISO-8601 に変換する以外はそのまま渡す
pub fn shape_passthrough(data: &Map<String, Value>, _context: &ShapeContext) -> Map<String, Value> {
    let mut shaped: Map<String, Value> = data
        .iter()
        .filter(|(name, _)| !IMPORT_METADATA_FIELDS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    coerce_timestamps(&mut shaped);
    shaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Provenance;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_strips_import_metadata_and_coerces_timestamps() {
        let data = json!({
            "search_id": "S1",
            "search_query": "rust",
            "timestamp": 1_700_000_000_000_i64,
            "_source_table": "firespring-backdoor-searches-dev",
            "_import_timestamp": "2024-01-01T00:00:00Z",
            "search_metadata": { "time_pretty": "yesterday" }
        });
        let context = ShapeContext {
            provenance: Provenance::default(),
            now: Utc::now(),
        };

        let shaped = shape_passthrough(data.as_object().unwrap(), &context);
        assert_eq!(
            Value::Object(shaped),
            json!({
                "search_id": "S1",
                "search_query": "rust",
                "timestamp": "2023-11-14T22:13:20.000Z",
                "search_metadata": { "time_pretty": "yesterday" }
            })
        );
    }
}
