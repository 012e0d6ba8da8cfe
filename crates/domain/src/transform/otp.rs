//! ワンタイムコードのレコード

use chrono::{Duration, SecondsFormat};
use serde_json::{Map, Value};

use super::fields::{coerce_timestamp, coerce_timestamps, parse_bool, parse_count, AliasPicker};
use super::{ShapeContext, TableTransform};

pub const TABLE: &str = "mmp_toledo_otp_codes";

pub const TRANSFORM: TableTransform = TableTransform {
    unique_keys: &["email"],
    shape: shape_otp,
};

/// 有効期限が無い場合の既定値（分）
const DEFAULT_EXPIRY_MINUTES: i64 = 5;

const EMAIL: &[&str] = &["email", "email_address", "emailAddress"];
const CODE: &[&str] = &["code", "otp", "otp_code", "otpCode"];
const EXPIRES_AT: &[&str] = &["expires_at", "expiresAt", "expiry", "ttl"];
const ATTEMPTS: &[&str] = &["attempts", "attempt_count", "attemptCount"];
const MAX_ATTEMPTS: &[&str] = &["max_attempts", "maxAttempts"];
const VERIFIED: &[&str] = &["verified", "is_verified", "isVerified"];

pub fn shape_otp(data: &Map<String, Value>, context: &ShapeContext) -> Map<String, Value> {
    let mut picker = AliasPicker::new(data);

    let email = picker.pick_string(EMAIL);
    let code = picker.pick_string(CODE);
    let expires_at = match picker.pick(EXPIRES_AT) {
        Some(value) => coerce_timestamp(value),
        None => Value::String(
            (context.now + Duration::minutes(DEFAULT_EXPIRY_MINUTES))
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    };
    let attempts = picker.pick(ATTEMPTS).and_then(parse_count).unwrap_or(0);
    let max_attempts = picker.pick(MAX_ATTEMPTS).and_then(parse_count);
    let verified = picker.pick(VERIFIED).and_then(parse_bool).unwrap_or(false);

    // 採用しなかった列はそのまま渡す
    let mut shaped = picker.remaining();
    coerce_timestamps(&mut shaped);

    if let Some(email) = email {
        shaped.insert("email".to_string(), Value::String(email.to_lowercase()));
    }
    if let Some(code) = code {
        shaped.insert("code".to_string(), Value::String(code));
    }
    shaped.insert("expires_at".to_string(), expires_at);
    shaped.insert("attempts".to_string(), Value::from(attempts));
    if let Some(max_attempts) = max_attempts {
        shaped.insert("max_attempts".to_string(), Value::from(max_attempts));
    }
    shaped.insert("verified".to_string(), Value::Bool(verified));

    shaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Provenance;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn shape(data: Value) -> Value {
        let context = ShapeContext {
            provenance: Provenance::default(),
            now: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        Value::Object(shape_otp(data.as_object().unwrap(), &context))
    }

    #[test]
    fn test_defaults_expiry_five_minutes_out() {
        let shaped = shape(json!({ "email": "A@B.com", "code": "123456" }));
        assert_eq!(shaped["expires_at"], json!("2024-05-01T12:05:00.000Z"));
        assert_eq!(shaped["attempts"], json!(0));
        assert_eq!(shaped["verified"], json!(false));
        assert_eq!(shaped["email"], json!("a@b.com"));
    }

    #[test]
    fn test_parses_numeric_attempt_counters() {
        let shaped = shape(json!({
            "email": "a@b.com",
            "attempts": "3",
            "maxAttempts": 5,
            "ttl": 1_700_000_000
        }));
        assert_eq!(shaped["attempts"], json!(3));
        assert_eq!(shaped["max_attempts"], json!(5));
        assert_eq!(shaped["expires_at"], json!("2023-11-14T22:13:20.000Z"));
        assert!(shaped.get("ttl").is_none());
    }

    #[test]
    fn test_unused_aliases_pass_through() {
        let shaped = shape(json!({
            "email": "a@b.com",
            "code": "111111",
            "otp": "222222",
            "expires_at": 1_700_000_000,
            "ttl": 1_700_000_600
        }));
        assert_eq!(shaped["code"], json!("111111"));
        assert_eq!(shaped["otp"], json!("222222"));
        assert_eq!(shaped["expires_at"], json!("2023-11-14T22:13:20.000Z"));
        assert_eq!(shaped["ttl"], json!(1_700_000_600));
    }
}
