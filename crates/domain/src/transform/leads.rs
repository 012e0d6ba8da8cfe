//! リード（問い合わせ）レコード

use serde_json::{Map, Value};

use super::fields::{coerce_timestamp, coerce_timestamps, merge_object, AliasPicker};
use super::{ShapeContext, TableTransform};

pub const TABLE: &str = "mmp_toledo_leads";

pub const TRANSFORM: TableTransform = TableTransform {
    unique_keys: &["lead_id"],
    shape: shape_lead,
};

const DEFAULT_STATUS: &str = "new";

const LEAD_ID: &[&str] = &["lead_id", "leadId", "id"];
const NAME: &[&str] = &["name", "full_name", "fullName"];
const FIRST_NAME: &[&str] = &["first_name", "firstName"];
const LAST_NAME: &[&str] = &["last_name", "lastName"];
const EMAIL: &[&str] = &["email", "email_address", "emailAddress"];
const PHONE: &[&str] = &["phone", "phone_number", "phoneNumber"];
const COMPANY: &[&str] = &["company", "company_name", "companyName", "organization"];
const STATUS: &[&str] = &["status", "lead_status", "leadStatus"];
const CREATED_AT: &[&str] = &["created_at", "createdAt"];
const UPDATED_AT: &[&str] = &["updated_at", "updatedAt"];
const EXTRA_FIELDS: &str = "extra_fields";

pub fn shape_lead(data: &Map<String, Value>, _context: &ShapeContext) -> Map<String, Value> {
    let mut shaped = Map::new();
    let mut picker = AliasPicker::new(data);

    if let Some(lead_id) = picker.pick(LEAD_ID) {
        shaped.insert("lead_id".to_string(), lead_id.clone());
    }

    let name = match picker.pick_string(NAME) {
        Some(name) => Some(name),
        None => {
            let parts: Vec<String> = [FIRST_NAME, LAST_NAME]
                .iter()
                .filter_map(|aliases| picker.pick_string(aliases))
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
    };
    if let Some(name) = name {
        shaped.insert("name".to_string(), Value::String(name));
    }

    if let Some(email) = picker.pick_string(EMAIL) {
        shaped.insert("email".to_string(), Value::String(email.to_lowercase()));
    }
    if let Some(phone) = picker.pick_string(PHONE) {
        shaped.insert("phone".to_string(), Value::String(phone));
    }
    if let Some(company) = picker.pick_string(COMPANY) {
        shaped.insert("company".to_string(), Value::String(company));
    }

    let status = picker
        .pick_string(STATUS)
        .unwrap_or_else(|| DEFAULT_STATUS.to_string());
    shaped.insert("status".to_string(), Value::String(status));

    for (column, aliases) in [("created_at", CREATED_AT), ("updated_at", UPDATED_AT)] {
        if let Some(value) = picker.pick(aliases) {
            shaped.insert(column.to_string(), coerce_timestamp(value));
        }
    }

    // 採用しなかった列は extra_fields にまとめる
    let mut extra = Map::new();
    if let Some(existing) = data.get(EXTRA_FIELDS) {
        merge_object(&mut extra, existing);
    }
    picker.reserve(EXTRA_FIELDS);
    extra.extend(picker.remaining());
    coerce_timestamps(&mut extra);
    if !extra.is_empty() {
        shaped.insert(EXTRA_FIELDS.to_string(), Value::Object(extra));
    }

    shaped
}
