//! ダッシュボード集計レコード（パーティション + ソートの複合キー）

use serde_json::{Map, Value};

use super::fields::{is_reserved, merge_object, PROVENANCE_PK, PROVENANCE_SK};
use super::{ShapeContext, TableTransform};

pub const TABLE: &str = "toledo_dashboard";

pub const TRANSFORM: TableTransform = TableTransform {
    unique_keys: &[PROVENANCE_PK, PROVENANCE_SK],
    shape: shape_dashboard,
};

const KEY_FIELDS: &[&str] = &["PK", "SK", "pk", "sk"];
const METRICS: &[&str] = &["metrics"];

/// キー以外の列はすべて `metrics` オブジェクトにまとめる
pub fn shape_dashboard(data: &Map<String, Value>, context: &ShapeContext) -> Map<String, Value> {
    let mut shaped = Map::new();

    if let Some(pk) = &context.provenance.pk {
        shaped.insert(PROVENANCE_PK.to_string(), pk.clone());
    }
    if let Some(sk) = &context.provenance.sk {
        shaped.insert(PROVENANCE_SK.to_string(), sk.clone());
    }

    let mut metrics = Map::new();
    if let Some(existing) = data.get("metrics") {
        merge_object(&mut metrics, existing);
    }
    for (name, value) in data {
        if !is_reserved(name, &[KEY_FIELDS, METRICS]) {
            metrics.insert(name.clone(), value.clone());
        }
    }
    shaped.insert("metrics".to_string(), Value::Object(metrics));

    shaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Provenance;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_folds_non_key_fields_into_metrics() {
        let data = json!({
            "PK": "CLIENT#42",
            "SK": "MONTH#2024-05",
            "revenue": 1200.5,
            "leads": 17,
            "_source_table": "toledo-consulting-dashboard-data"
        });
        let context = ShapeContext {
            provenance: Provenance {
                pk: Some(json!("CLIENT#42")),
                sk: Some(json!("MONTH#2024-05")),
            },
            now: Utc::now(),
        };

        let shaped = shape_dashboard(data.as_object().unwrap(), &context);
        assert_eq!(
            Value::Object(shaped),
            json!({
                "dynamodb_pk": "CLIENT#42",
                "dynamodb_sk": "MONTH#2024-05",
                "metrics": { "revenue": 1200.5, "leads": 17 }
            })
        );
    }
}
