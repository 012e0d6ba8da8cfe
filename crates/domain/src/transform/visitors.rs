//! 訪問者・セッションレコード

use serde_json::{Map, Value};

use super::fields::{coerce_timestamp, coerce_timestamps, merge_object, parse_count, AliasPicker};
use super::{ShapeContext, TableTransform};

pub const TABLE: &str = "firespring_visitors";

pub const TRANSFORM: TableTransform = TableTransform {
    unique_keys: &["visitor_id"],
    shape: shape_visitor,
};

const VISITOR_ID: &[&str] = &["visitor_id", "visitorId", "id"];
const SESSION_ID: &[&str] = &["session_id", "sessionId"];
const PAGE_VIEWS: &[&str] = &["page_views", "pageViews", "page_view_count"];
const LAST_VISIT: &[&str] = &["last_visit", "lastVisit", "last_seen", "lastSeen"];
const SESSION_DATA: &str = "session_data";

/// 索引に使う少数の列だけを最上位に残し、残り（geo, device, referrer 等）は
/// `session_data` にまとめる
pub fn shape_visitor(data: &Map<String, Value>, _context: &ShapeContext) -> Map<String, Value> {
    let mut shaped = Map::new();
    let mut picker = AliasPicker::new(data);

    if let Some(visitor_id) = picker.pick(VISITOR_ID) {
        shaped.insert("visitor_id".to_string(), visitor_id.clone());
    }
    if let Some(session_id) = picker.pick_string(SESSION_ID) {
        shaped.insert("session_id".to_string(), Value::String(session_id));
    }
    if let Some(page_views) = picker.pick(PAGE_VIEWS).and_then(parse_count) {
        shaped.insert("page_views".to_string(), Value::from(page_views));
    }
    if let Some(last_visit) = picker.pick(LAST_VISIT) {
        shaped.insert("last_visit".to_string(), coerce_timestamp(last_visit));
    }

    let mut session_data = Map::new();
    if let Some(existing) = data.get(SESSION_DATA) {
        merge_object(&mut session_data, existing);
    }
    picker.reserve(SESSION_DATA);
    session_data.extend(picker.remaining());
    coerce_timestamps(&mut session_data);
    shaped.insert(SESSION_DATA.to_string(), Value::Object(session_data));

    shaped
}
